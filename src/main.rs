use anyhow::Result;
use argh::FromArgs;
use pipesh::{Interpreter, ShellConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(FromArgs)]
/// A small shell with pipelines, redirection and suffix globs.
struct Args {
    #[argh(switch, short = 'd')]
    /// print RUNNING/ENDED lines for every stage.
    debug: bool,

    #[argh(option)]
    /// history file (default: .history in the start directory).
    history: Option<PathBuf>,

    #[argh(positional)]
    /// script to run instead of prompting.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Respects RUST_LOG; stdout belongs to the commands being run.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run(argh::from_env()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pipesh: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = ShellConfig::from_env().with_debug(args.debug);
    if let Some(history) = args.history {
        config = config.with_history_file(history);
    }
    tracing::debug!(prefixes = ?config.path_table.prefixes(), "starting");

    let mut shell = Interpreter::new(config)?;
    match args.script {
        Some(script) => shell.run_script(&script),
        None => shell.repl(),
    }
}
