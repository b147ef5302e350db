use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use versewright_errors::ErrorHandler;

mod commands;
mod context;
mod output;

use commands::admin::{run_config, run_doctor};
use commands::write::run_write;
use context::load_session_config;

#[derive(Parser)]
#[command(name = "versewright")]
#[command(about = "Curate model-written text one continuation at a time", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Echo session events to stderr.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Overrides applied on top of the layered settings files.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct SessionArgs {
    /// Model name under the models directory.
    #[arg(long, global = true)]
    model: Option<String>,

    #[arg(long, global = true)]
    models_dir: Option<String>,

    /// Directory holding the *.gguf weights.
    #[arg(long, global = true)]
    checkpoint: Option<String>,

    /// Candidates per sampling round.
    #[arg(long, global = true)]
    batch_size: Option<usize>,

    /// Tokens per candidate.
    #[arg(long, global = true)]
    length: Option<usize>,

    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Keep only the k most likely tokens (0 disables).
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Nucleus threshold; overrides --top-k when above 0.
    #[arg(long, global = true)]
    top_p: Option<f32>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Directory saved documents are written to.
    #[arg(long, global = true)]
    output_dir: Option<String>,

    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive writing session (default).
    Write(WriteArgs),
    /// Print the effective configuration.
    Config,
    /// Check the model files and window size without starting a session.
    Doctor,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct WriteArgs {
    /// Seed text the document starts from.
    prompt: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    let json_mode = cli.json;
    if let Err(err) = run(cli) {
        let handler = ErrorHandler::new().verbose(verbose);
        if json_mode {
            eprintln!("{}", handler.enhance(&err).to_json());
        } else {
            eprint!("{}", handler.handle(&err));
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir()?;
    match cli.command.unwrap_or(Commands::Write(WriteArgs::default())) {
        Commands::Write(args) => {
            let cfg = load_session_config(&cwd, &cli.session)?;
            cfg.validate()?;
            run_write(&cwd, &cfg, args, cli.json, cli.verbose)
        }
        Commands::Config => run_config(&cwd, &cli.session, cli.json),
        Commands::Doctor => {
            let cfg = load_session_config(&cwd, &cli.session)?;
            cfg.validate()?;
            run_doctor(&cfg, cli.json)
        }
    }
}
