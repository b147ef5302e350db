use anyhow::Result;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use versewright_core::Console;

pub const SAVE_PROMPT: &str = "\nEnter File Name::";
const DEFAULT_EXTENSION: &str = "txt";

/// Why a typed file name was refused. The message is shown before re-prompting.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    #[error("file name must not be empty")]
    Empty,
    #[error("file name may contain at most one '.'")]
    ExtraSeparator,
    #[error("file name may only use letters, digits, '-' and '_'")]
    InvalidCharacters,
    #[error("{0} already exists")]
    AlreadyExists(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SaveError {
    #[error(transparent)]
    Filename(#[from] FilenameError),
    #[error("failed to write document: {0}")]
    Io(#[from] io::Error),
}

/// Validates a bare file name and appends `.txt` when it has no extension.
///
/// `poem` and `poem.` become `poem.txt`; `poem.md` is kept as is.
pub fn resolve_filename(raw: &str) -> Result<String, FilenameError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }
    if !name.chars().all(|ch| ch == '.' || is_name_char(ch)) {
        return Err(FilenameError::InvalidCharacters);
    }
    let mut parts = name.split('.');
    let base = parts.next().unwrap_or_default();
    let extension = parts.next();
    if parts.next().is_some() {
        return Err(FilenameError::ExtraSeparator);
    }
    if base.is_empty() || !base.chars().all(is_name_char) {
        return Err(FilenameError::InvalidCharacters);
    }
    match extension {
        Some(ext) if !ext.is_empty() => {
            if !ext.chars().all(char::is_alphanumeric) {
                return Err(FilenameError::InvalidCharacters);
            }
            Ok(format!("{base}.{ext}"))
        }
        _ => Ok(format!("{base}.{DEFAULT_EXTENSION}")),
    }
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_'
}

/// Writes documents into one output directory, never overwriting.
pub struct SaveGateway {
    dir: PathBuf,
}

impl SaveGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Target path for `raw`, refused if something already lives there.
    pub fn resolve(&self, raw: &str) -> Result<PathBuf, FilenameError> {
        let file_name = resolve_filename(raw)?;
        let path = self.dir.join(&file_name);
        if path.exists() {
            return Err(FilenameError::AlreadyExists(file_name));
        }
        Ok(path)
    }

    /// Write `document` under `raw` in one step: the bytes go to a temporary
    /// file in the output directory which is then linked into place without
    /// replacing an existing file.
    pub fn write_document(&self, raw: &str, document: &str) -> Result<PathBuf, SaveError> {
        let path = self.resolve(raw)?;
        fs::create_dir_all(&self.dir)?;
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(document.as_bytes())?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => Ok(path),
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Err(FilenameError::AlreadyExists(name).into())
            }
            Err(err) => Err(SaveError::Io(err.error)),
        }
    }

    /// Prompt for file names until `document` is written once.
    ///
    /// A refused name re-prompts with the reason. A write failure is shown as
    /// a notice and yields `None` so the session carries on with its document.
    pub fn save(&self, console: &mut dyn Console, document: &str) -> Result<Option<PathBuf>> {
        let mut prompt = SAVE_PROMPT.to_string();
        loop {
            console.prompt_text(document, &prompt)?;
            let raw = console.read_line()?;
            match self.write_document(&raw, document) {
                Ok(path) => {
                    console.notice(&format!("saved {}", path.display()))?;
                    return Ok(Some(path));
                }
                Err(SaveError::Filename(reason)) => {
                    prompt = format!("{reason}{SAVE_PROMPT}");
                }
                Err(err @ SaveError::Io(_)) => {
                    console.notice(&format!("{err}; document not saved"))?;
                    return Ok(None);
                }
            }
        }
    }
}
