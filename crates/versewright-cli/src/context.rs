use anyhow::Result;
use std::path::Path;
use versewright_core::{AppConfig, SessionConfig};

use crate::SessionArgs;

/// Layered settings with command-line overrides applied last.
pub(crate) fn load_app_config(cwd: &Path, args: &SessionArgs) -> Result<AppConfig> {
    let mut cfg = AppConfig::load(cwd)?;
    if let Some(model) = &args.model {
        cfg.model.name = model.clone();
    }
    if let Some(dir) = &args.models_dir {
        cfg.model.models_dir = dir.clone();
    }
    if let Some(dir) = &args.checkpoint {
        cfg.model.checkpoint = Some(dir.clone());
    }
    if let Some(batch_size) = args.batch_size {
        cfg.sampling.batch_size = batch_size;
    }
    if let Some(length) = args.length {
        cfg.sampling.length = Some(length);
    }
    if let Some(temperature) = args.temperature {
        cfg.sampling.temperature = temperature;
    }
    if let Some(top_k) = args.top_k {
        cfg.sampling.top_k = top_k;
    }
    if let Some(top_p) = args.top_p {
        cfg.sampling.top_p = top_p;
    }
    if args.seed.is_some() {
        cfg.sampling.seed = args.seed;
    }
    if let Some(dir) = &args.output_dir {
        cfg.output.directory = dir.clone();
    }
    if args.no_color {
        cfg.ui.color = false;
    }
    Ok(cfg)
}

pub(crate) fn load_session_config(cwd: &Path, args: &SessionArgs) -> Result<SessionConfig> {
    let cfg = load_app_config(cwd, args)?;
    Ok(SessionConfig::from_app_config(cwd, &cfg))
}
