use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Model hyperparameters read from `hparams.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hparams {
    pub n_ctx: usize,
    pub n_vocab: usize,
    pub n_embd: usize,
    pub n_head: usize,
    pub n_layer: usize,
}

impl Default for Hparams {
    fn default() -> Self {
        Self {
            n_ctx: 1024,
            n_vocab: 50257,
            n_embd: 768,
            n_head: 12,
            n_layer: 12,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CheckpointError {
    #[error("hparams.json not found in {0}")]
    MissingHparams(PathBuf),
    #[error("invalid hparams in {path}: {reason}")]
    InvalidHparams { path: PathBuf, reason: String },
    #[error("can't get samples longer than window size: {n_ctx} (requested {length})")]
    WindowExceeded { length: usize, n_ctx: usize },
    #[error("tokenizer.json not found in {0}")]
    MissingTokenizer(PathBuf),
    #[error("no checkpoint weights (*.gguf) found in {0}")]
    MissingWeights(PathBuf),
    #[error("failed to read model files: {0}")]
    Io(#[from] std::io::Error),
}

/// Files that make up a loadable model, checked before anything is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointLayout {
    pub model_dir: PathBuf,
    pub hparams: Hparams,
    pub tokenizer_path: PathBuf,
    pub weights_path: PathBuf,
    /// Tokens per candidate after resolving "half the window" defaults.
    pub length: usize,
}

impl CheckpointLayout {
    /// Validates a model directory and checkpoint directory.
    ///
    /// `requested_length` of `None` resolves to `n_ctx / 2`. Checks run in
    /// order: hyperparameters, window size, tokenizer, weights.
    pub fn resolve(
        model_dir: &Path,
        checkpoint_dir: &Path,
        requested_length: Option<usize>,
    ) -> Result<Self, CheckpointError> {
        let hparams = read_hparams(model_dir)?;

        let length = requested_length.unwrap_or(hparams.n_ctx / 2);
        if length > hparams.n_ctx {
            return Err(CheckpointError::WindowExceeded {
                length,
                n_ctx: hparams.n_ctx,
            });
        }

        let tokenizer_path = model_dir.join("tokenizer.json");
        if !tokenizer_path.is_file() {
            return Err(CheckpointError::MissingTokenizer(model_dir.to_path_buf()));
        }

        let weights_path = latest_weights(checkpoint_dir)?
            .ok_or_else(|| CheckpointError::MissingWeights(checkpoint_dir.to_path_buf()))?;

        Ok(Self {
            model_dir: model_dir.to_path_buf(),
            hparams,
            tokenizer_path,
            weights_path,
            length,
        })
    }
}

fn read_hparams(model_dir: &Path) -> Result<Hparams, CheckpointError> {
    let path = model_dir.join("hparams.json");
    if !path.is_file() {
        return Err(CheckpointError::MissingHparams(model_dir.to_path_buf()));
    }
    let raw = fs::read_to_string(&path)?;
    let hparams: Hparams =
        serde_json::from_str(&raw).map_err(|e| CheckpointError::InvalidHparams {
            path: path.clone(),
            reason: e.to_string(),
        })?;
    if hparams.n_ctx == 0 {
        return Err(CheckpointError::InvalidHparams {
            path,
            reason: "n_ctx must be positive".to_string(),
        });
    }
    Ok(hparams)
}

/// Most recently modified `*.gguf` file, ties broken by file name.
fn latest_weights(checkpoint_dir: &Path) -> Result<Option<PathBuf>, CheckpointError> {
    if !checkpoint_dir.is_dir() {
        return Ok(None);
    }
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(checkpoint_dir)? {
        let path = entry?.path();
        let is_gguf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gguf"));
        if !is_gguf || !path.is_file() {
            continue;
        }
        let modified = fs::metadata(&path)?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let replace = match &newest {
            None => true,
            Some((best_time, best_path)) => {
                modified > *best_time || (modified == *best_time && path > *best_path)
            }
        };
        if replace {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
