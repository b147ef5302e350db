use anyhow::Result;
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;
use versewright_core::{EventEnvelope, SessionEvent, runtime_dir};

/// Append-only session log under the runtime directory.
pub struct Observer {
    log_path: PathBuf,
    session_id: Uuid,
    seq_no: AtomicU64,
    verbose: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            log_path: dir.join("observe.log"),
            session_id: Uuid::now_v7(),
            seq_no: AtomicU64::new(0),
            verbose: false,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn record(&self, kind: SessionEvent) -> Result<()> {
        let envelope = EventEnvelope {
            seq_no: self.seq_no.fetch_add(1, Ordering::SeqCst) + 1,
            at: Utc::now(),
            session_id: self.session_id,
            kind,
        };
        self.verbose_log(&format!(
            "event #{} {}",
            envelope.seq_no,
            envelope.kind.category()
        ));
        self.append_log_line(&format!(
            "{} EVENT {}",
            envelope.at.to_rfc3339(),
            serde_json::to_string(&envelope)?
        ))
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Log a message to stderr with `[versewright]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose {
            eprintln!("[versewright] {msg}");
        }
    }

    /// Log a warning: always written to the log file, and to stderr.
    pub fn warn_log(&self, msg: &str) {
        eprintln!("[versewright WARN] {msg}");
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}
