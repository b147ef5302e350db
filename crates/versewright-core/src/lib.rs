use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub type Result<T> = anyhow::Result<T>;

/// Reserved boundary marker. Every context starts with its encoding.
pub const EOT_MARKER: &str = "<|endoftext|>";
pub const DEFAULT_MODEL_NAME: &str = "117M";
pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_BATCH_SIZE: usize = 6;
pub const DEFAULT_LENGTH: usize = 1;

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".versewright")
}

/// A single keystroke, independent of the terminal backend that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Backspace,
    Delete,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Char(char),
    /// A character pressed together with Control, lowercased.
    Ctrl(char),
    Other,
}

impl Key {
    pub fn is_arrow(&self) -> bool {
        matches!(self, Key::Up | Key::Down | Key::Left | Key::Right)
    }
}

/// The structured outcome of one human decision about a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Action {
    Accept(String),
    Reject,
    CustomText(String),
    DeleteChunk(usize),
    ResetPrompt,
    /// Persist the visible document it carries.
    Save(String),
    Quit,
}

impl Action {
    /// Whether applying this action ends the current sampling round.
    #[must_use]
    pub fn ends_round(&self) -> bool {
        !matches!(self, Action::Reject)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::Accept(_) => "accept",
            Action::Reject => "reject",
            Action::CustomText(_) => "custom_text",
            Action::DeleteChunk(_) => "delete_chunk",
            Action::ResetPrompt => "reset_prompt",
            Action::Save(_) => "save",
            Action::Quit => "quit",
        }
    }
}

/// One token's decoded text, indexed by distance from the end (0 = newest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    Sampling,
    Presenting,
    Applying,
    Resample,
    Reset,
    Saving,
    Quit,
}

impl SessionState {
    /// State entered from `Presenting` once the human settles on `action`.
    pub fn for_action(action: &Action) -> Self {
        match action {
            Action::Reject => SessionState::Presenting,
            Action::Accept(_) | Action::CustomText(_) | Action::DeleteChunk(_) => {
                SessionState::Applying
            }
            Action::ResetPrompt => SessionState::Reset,
            Action::Save(_) => SessionState::Saving,
            Action::Quit => SessionState::Quit,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Quit)
    }
}

pub fn is_valid_state_transition(from: SessionState, to: SessionState) -> bool {
    match from {
        SessionState::Sampling => matches!(to, SessionState::Presenting),
        SessionState::Presenting => matches!(
            to,
            SessionState::Presenting
                | SessionState::Applying
                | SessionState::Resample
                | SessionState::Reset
                | SessionState::Saving
                | SessionState::Quit
        ),
        SessionState::Applying
        | SessionState::Resample
        | SessionState::Reset
        | SessionState::Saving => matches!(to, SessionState::Sampling),
        SessionState::Quit => false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub seq_no: u64,
    pub at: DateTime<Utc>,
    pub session_id: Uuid,
    pub kind: SessionEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    SessionStartedV1 {
        model: String,
        prompt_tokens: usize,
    },
    BatchSampledV1 {
        round: u64,
        candidates: usize,
        context_tokens: usize,
    },
    CandidateRejectedV1 {
        round: u64,
        candidate: usize,
    },
    ContinuationAcceptedV1 {
        round: u64,
        tokens: usize,
        custom: bool,
    },
    ChunksDeletedV1 {
        requested: usize,
        removed: usize,
    },
    PromptResetV1 {
        discarded_tokens: usize,
    },
    DocumentSavedV1 {
        path: String,
        bytes: usize,
    },
    SessionEndedV1 {
        rounds: u64,
        document_tokens: usize,
    },
}

impl SessionEvent {
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionStartedV1 { .. } | Self::SessionEndedV1 { .. } => "session",
            Self::BatchSampledV1 { .. } => "sampling",
            Self::CandidateRejectedV1 { .. }
            | Self::ContinuationAcceptedV1 { .. }
            | Self::ChunksDeletedV1 { .. }
            | Self::PromptResetV1 { .. } => "edit",
            Self::DocumentSavedV1 { .. } => "persistence",
        }
    }
}

/// Blocking human input.
pub trait InputReader {
    /// Read one keystroke without echo or line buffering.
    fn read_key(&mut self) -> Result<Key>;
    /// Read one echoed line, without its trailing newline.
    fn read_line(&mut self) -> Result<String>;
}

/// Everything the interactive loop draws. Each call redraws from its
/// arguments alone.
pub trait Screen {
    /// Clear the screen and show `visible` followed by the pending `candidate`.
    fn present(&mut self, visible: &str, candidate: &str) -> Result<()>;
    fn show_help(&mut self, legend: &[&str]) -> Result<()>;
    /// Clear the screen and list chunks with their reverse indices.
    fn show_chunks(&mut self, chunks: &[Chunk]) -> Result<()>;
    /// Clear the screen and show `text` as the lead-in for a line read.
    fn prompt_text(&mut self, text: &str, prompt: &str) -> Result<()>;
    fn notice(&mut self, message: &str) -> Result<()>;
}

pub trait Console: InputReader + Screen {}

impl<T: InputReader + Screen + ?Sized> Console for T {}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("model name must not be empty")]
    EmptyModelName,
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
    #[error("sample length must be at least 1 token")]
    ZeroLength,
    #[error("temperature must be a finite, non-negative number (got {0})")]
    InvalidTemperature(f32),
    #[error("top_p must lie within [0, 1] (got {0})")]
    InvalidTopP(f32),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub model: ModelConfig,
    pub sampling: SamplingConfig,
    pub output: OutputConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        let home = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())?;
        Some(Path::new(&home).join(".versewright/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let legacy = Self::legacy_toml_path(workspace);
        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));

        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(path)?;
            let value: serde_json::Value = serde_json::from_str(&raw)?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub models_dir: String,
    /// Directory holding the weights. Defaults to `<models_dir>/<name>`.
    pub checkpoint: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            models_dir: DEFAULT_MODELS_DIR.to_string(),
            checkpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub batch_size: usize,
    /// Tokens per candidate. `None` means half the model window.
    pub length: Option<usize>,
    pub temperature: f32,
    /// 0 disables top-k filtering.
    pub top_k: usize,
    /// Nucleus threshold. Overrides `top_k` when greater than 0.
    pub top_p: f32,
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            length: Some(DEFAULT_LENGTH),
            temperature: 1.0,
            top_k: 0,
            top_p: 0.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    pub color: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Immutable settings for one interactive session, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    pub workspace: PathBuf,
    pub model_name: String,
    pub models_dir: PathBuf,
    pub checkpoint_dir: PathBuf,
    pub batch_size: usize,
    pub length: Option<usize>,
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
    pub color: bool,
}

impl SessionConfig {
    pub fn from_app_config(workspace: &Path, cfg: &AppConfig) -> Self {
        let models_dir = resolve_path(workspace, &cfg.model.models_dir);
        let checkpoint_dir = match cfg.model.checkpoint.as_deref() {
            Some(dir) if !dir.trim().is_empty() => resolve_path(workspace, dir),
            _ => models_dir.join(&cfg.model.name),
        };
        Self {
            workspace: workspace.to_path_buf(),
            model_name: cfg.model.name.clone(),
            models_dir,
            checkpoint_dir,
            batch_size: cfg.sampling.batch_size,
            length: cfg.sampling.length,
            temperature: cfg.sampling.temperature,
            top_k: cfg.sampling.top_k,
            top_p: cfg.sampling.top_p,
            seed: cfg.sampling.seed,
            output_dir: resolve_path(workspace, &cfg.output.directory),
            color: cfg.ui.color,
        }
    }

    /// Directory holding `hparams.json` and `tokenizer.json`.
    pub fn model_dir(&self) -> PathBuf {
        self.models_dir.join(&self.model_name)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.model_name.trim().is_empty() {
            return Err(ConfigError::EmptyModelName);
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.length == Some(0) {
            return Err(ConfigError::ZeroLength);
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::InvalidTopP(self.top_p));
        }
        Ok(())
    }
}

fn resolve_path(workspace: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}
