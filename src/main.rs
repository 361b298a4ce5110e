// Entrypoint for the tst CLI.
// Keeps `main` small: initialize logging, parse arguments, dispatch the
// subcommand, and turn any error into a diagnostic plus a non-zero exit.

use std::path::PathBuf;
use std::thread;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tst::api::{ApiClient, Transport};
use tst::cli::{Cli, Command};
use tst::config::ConfigStore;
use tst::error::TstError;
use tst::ui::TermPrompter;
use tst::{checkout, commit, login};

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Some(line) = cli.command.one_line_help() {
        println!("{line}");
        return;
    }
    if let Err(err) = run(cli) {
        eprintln!("tst: {err}");
        std::process::exit(1);
    }
}

/// Dev diagnostics via `RUST_LOG`, stderr only; product output stays on
/// stdout untouched.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), TstError> {
    let store = ConfigStore::new()?;
    let dir = std::env::current_dir()?;
    match cli.command {
        Command::Checkout { key, .. } => {
            let config = store.load()?;
            let client = ApiClient::new(&config)?;
            checkout::run(&config, &client, &mut TermPrompter, &dir, key.as_deref())
        }
        Command::Commit { filename, .. } => {
            let config = store.load()?;
            let client = ApiClient::new(&config)?;
            commit::run(
                &config,
                &client,
                &dir,
                filename.as_deref(),
                &mut |delay| thread::sleep(delay),
            )
        }
        Command::Login { token, .. } => {
            let config = store.load_or_bootstrap();
            let curlrc = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".curlrc");
            login::run(
                &store,
                config,
                token.as_deref(),
                &mut TermPrompter,
                &|token: &str| -> Result<Box<dyn Transport>, TstError> {
                    Ok(Box::new(ApiClient::with_token(token)?))
                },
                &curlrc,
            )
        }
    }
}
