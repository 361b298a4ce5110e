//! Checkout flow: download an assignment's files into the working directory
//! and initialize the workspace state.
//!
//! Re-running a checkout is safe: any file that already exists locally is
//! only overwritten after an interactive confirmation.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::Transport;
use crate::config::ConfigState;
use crate::error::TstError;
use crate::key::AssignmentKey;
use crate::ui::Prompter;
use crate::workspace::WorkspaceState;

/// Body of `GET /api/assignment/{id}?checkout=true`.
#[derive(Debug, Deserialize)]
struct CheckoutPayload {
    activity_revision: Option<String>,
    #[serde(default)]
    files: Vec<FileRecord>,
    #[serde(rename = "__code")]
    code: Option<CodeRecord>,
    tests: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FileRecord {
    name: String,
    data: String,
}

/// The embedded primary-submission record, when the assignment has one.
#[derive(Debug, Deserialize)]
struct CodeRecord {
    #[serde(rename = "__filename")]
    filename: String,
    #[serde(rename = "__code")]
    code: String,
}

fn checkout_url(base: &str, key: AssignmentKey) -> String {
    format!("{}/api/assignment/{}?checkout=true", base, key.decimal())
}

/// Key to check out: command line first, then the workspace's own key.
fn resolve_key(arg: Option<&str>, workspace: &WorkspaceState) -> Result<AssignmentKey, TstError> {
    if let Some(hex) = arg {
        return AssignmentKey::from_hex(hex);
    }
    match &workspace.key {
        Some(hex) => AssignmentKey::from_hex(hex),
        None => Err(TstError::MissingKey),
    }
}

pub fn run(
    config: &ConfigState,
    transport: &dyn Transport,
    prompter: &mut dyn Prompter,
    dir: &Path,
    key_arg: Option<&str>,
) -> Result<(), TstError> {
    let mut workspace = WorkspaceState::load_or_default(dir);
    let key = resolve_key(key_arg, &workspace)?;

    println!("Downloading files.");
    let response = transport.get(&checkout_url(&config.url, key))?;
    if (400..500).contains(&response.status) {
        return Err(TstError::ServerRejected {
            status: response.status,
            message: response.first_message(),
        });
    }
    if response.status != 200 {
        return Err(TstError::Unauthorized(response.status));
    }

    let payload: CheckoutPayload = serde_json::from_str(&response.body)
        .map_err(|_| TstError::BadResponse("malformed checkout payload".into()))?;
    debug!(files = payload.files.len(), has_code = payload.code.is_some(), "checkout payload");

    if let Some(revision) = &payload.activity_revision {
        println!("Revision {revision} of the activity has been checked out.");
    }
    println!("Saving downloaded files.");

    let fixture_names: Vec<String> = payload.files.iter().map(|f| f.name.clone()).collect();

    // The embedded code record, when present, is the primary submission;
    // otherwise the last downloaded file takes that role. Appending the
    // code record last makes `downloads.last()` the primary either way.
    let mut downloads: Vec<(String, String)> = payload
        .files
        .into_iter()
        .map(|f| (f.name, f.data))
        .collect();
    if let Some(code) = payload.code {
        downloads.push((code.filename, code.code));
    }
    let primary = downloads.last().map(|(name, _)| name.clone());

    for (name, data) in &downloads {
        let target = dir.join(name);
        if target.exists() {
            let overwrite = prompter.confirm(&format!("tst: overwrite '{name}'?"), true)?;
            if !overwrite {
                continue;
            }
        }
        fs::write(&target, data.as_bytes())?;
        println!("- {} ({} bytes)", name, data.len());
    }

    // tst.json bookkeeping: fixtures are every downloaded name except the
    // primary submission. The primary is recorded even when its overwrite
    // was declined; the local copy is still the submission file.
    workspace.key = Some(key.to_string());
    workspace.activity_revision = payload.activity_revision;
    workspace.tests = payload.tests;
    workspace.tst_files = fixture_names
        .into_iter()
        .filter(|name| primary.as_deref() != Some(name.as_str()))
        .collect();
    if primary.is_some() {
        workspace.filename = primary;
    }
    workspace.save(dir)?;
    println!("- tst.json");
    Ok(())
}
