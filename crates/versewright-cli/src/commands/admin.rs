use anyhow::Result;
use serde_json::json;
use std::path::Path;
use versewright_core::{AppConfig, SessionConfig};
use versewright_local_ml::CheckpointLayout;

use crate::SessionArgs;
use crate::context::load_app_config;
use crate::output::print_json;

pub(crate) fn config_payload(cwd: &Path, args: &SessionArgs) -> Result<serde_json::Value> {
    let cfg = load_app_config(cwd, args)?;
    let session = SessionConfig::from_app_config(cwd, &cfg);
    let validation = session.validate();
    Ok(json!({
        "config": cfg,
        "session": session,
        "valid": validation.is_ok(),
        "error": validation.err().map(|e| e.to_string()),
        "sources": {
            "legacy": AppConfig::legacy_toml_path(cwd),
            "user": AppConfig::user_settings_path(),
            "project": AppConfig::project_settings_path(cwd),
            "local": AppConfig::project_local_settings_path(cwd),
        },
    }))
}

pub(crate) fn run_config(cwd: &Path, args: &SessionArgs, json_mode: bool) -> Result<()> {
    let payload = config_payload(cwd, args)?;
    if json_mode {
        print_json(&payload)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&payload["config"])?);
        if let Some(error) = payload["error"].as_str() {
            println!("invalid: {error}");
        }
    }
    Ok(())
}

pub(crate) fn run_doctor(cfg: &SessionConfig, json_mode: bool) -> Result<()> {
    let model_dir = cfg.model_dir();
    let resolved = CheckpointLayout::resolve(&model_dir, &cfg.checkpoint_dir, cfg.length);
    let payload = match &resolved {
        Ok(layout) => json!({
            "ok": true,
            "model_dir": model_dir,
            "checkpoint_dir": cfg.checkpoint_dir,
            "n_ctx": layout.hparams.n_ctx,
            "length": layout.length,
            "tokenizer": layout.tokenizer_path,
            "weights": layout.weights_path,
            "local_ml": cfg!(feature = "local-ml"),
        }),
        Err(err) => json!({
            "ok": false,
            "model_dir": model_dir,
            "checkpoint_dir": cfg.checkpoint_dir,
            "error": err.to_string(),
            "local_ml": cfg!(feature = "local-ml"),
        }),
    };

    if json_mode {
        print_json(&payload)?;
    } else if let Ok(layout) = &resolved {
        println!(
            "model: {} (n_ctx={}, length={})",
            model_dir.display(),
            layout.hparams.n_ctx,
            layout.length
        );
        println!("weights: {}", layout.weights_path.display());
        println!("tokenizer: {}", layout.tokenizer_path.display());
    }

    resolved?;
    Ok(())
}
