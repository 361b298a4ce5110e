//! Login flow: obtain a token, validate it against the service, persist it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::api::Transport;
use crate::config::{ConfigState, ConfigStore};
use crate::error::TstError;
use crate::ui::{self, Prompter};

/// First line of a successful validation response.
const VALID_SENTINEL: &str = "Valid token.";

/// Builds a transport authenticated with a candidate token. Login is the
/// one flow whose bearer token is not the stored one.
pub type TransportFactory<'a> = &'a dyn Fn(&str) -> Result<Box<dyn Transport>, TstError>;

pub fn run(
    store: &ConfigStore,
    mut config: ConfigState,
    token_arg: Option<&str>,
    prompter: &mut dyn Prompter,
    make_transport: TransportFactory<'_>,
    curlrc: &Path,
) -> Result<(), TstError> {
    let token = match token_arg {
        Some(token) => token.trim().to_string(),
        None => {
            let page = format!("{}/token/get", config.url);
            if webbrowser::open(&page).is_err() {
                println!("Couldn't open a browser; visit {page}");
            }
            prompter.input("Paste your token here")?
        }
    };
    let email = prompter.input("Your email")?;

    println!("Validating token with TST Online.");
    let transport = make_transport(&token)?;
    let url = format!("{}/token/validate/{}", config.url, email);
    let spinner = ui::spinner("Validating...");
    let response = transport.get(&url);
    spinner.finish_and_clear();
    check_validation(&response?.body)?;

    config.access_token = token.clone();
    config.email = email.clone();
    store.save(&config)?;
    append_curlrc(curlrc, &token)?;

    println!("Token validated.");
    println!("You are logged in to tst-online as '{email}'.");
    Ok(())
}

/// A validation response is accepted only when its first line is exactly
/// the sentinel; anything else is surfaced to the user verbatim.
fn check_validation(body: &str) -> Result<(), TstError> {
    match body.lines().next() {
        Some(line) if line == VALID_SENTINEL => Ok(()),
        _ => Err(TstError::TokenRejected(body.trim().to_string())),
    }
}

/// Convenience for manual requests: append the bearer header to the user's
/// curl configuration. Append-only, the file is never rewritten.
fn append_curlrc(path: &Path, token: &str) -> Result<(), TstError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "-H \"Authorization: Bearer {token}\"")?;
    Ok(())
}
