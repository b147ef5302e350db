use anyhow::Result;
use std::path::Path;
use versewright_core::SessionConfig;
use versewright_local_ml::CheckpointLayout;
use versewright_observe::Observer;
use versewright_ui::TerminalConsole;

use crate::WriteArgs;
use crate::output::print_json;

pub(crate) fn run_write(
    cwd: &Path,
    cfg: &SessionConfig,
    args: WriteArgs,
    json_mode: bool,
    verbose: bool,
) -> Result<()> {
    let layout = CheckpointLayout::resolve(&cfg.model_dir(), &cfg.checkpoint_dir, cfg.length)?;
    if !TerminalConsole::is_interactive() {
        return Err(versewright_errors::errors::not_a_terminal().into_error());
    }

    let mut observer = Observer::new(cwd)?;
    observer.set_verbose(verbose);
    observer.verbose_log(&format!(
        "model {} (n_ctx={}, length={}) weights {}",
        cfg.model_name,
        layout.hparams.n_ctx,
        layout.length,
        layout.weights_path.display()
    ));

    let prompt = args.prompt.unwrap_or_default();
    let outcome = run_local_session(cfg, &layout, &observer, &prompt)?;

    if json_mode {
        print_json(&outcome)?;
    } else {
        println!("\n{}", outcome.document);
    }
    Ok(())
}

#[cfg(feature = "local-ml")]
fn run_local_session(
    cfg: &SessionConfig,
    layout: &CheckpointLayout,
    observer: &Observer,
    prompt: &str,
) -> Result<versewright_agent::SessionOutcome> {
    use versewright_agent::{EditingController, sample_request};
    use versewright_store::SaveGateway;

    let (codec, mut sampler) = versewright_local_ml::load_local_model(layout, cfg.seed)?;
    let mut console = TerminalConsole::new(cfg.color);
    let gateway = SaveGateway::new(&cfg.output_dir);
    EditingController::new(
        &codec,
        &mut sampler,
        &mut console,
        &gateway,
        sample_request(cfg, layout.length),
    )
    .with_observer(observer)
    .run(prompt)
}

#[cfg(not(feature = "local-ml"))]
fn run_local_session(
    _cfg: &SessionConfig,
    _layout: &CheckpointLayout,
    _observer: &Observer,
    _prompt: &str,
) -> Result<versewright_agent::SessionOutcome> {
    Err(versewright_errors::errors::local_ml_disabled().into_error())
}
