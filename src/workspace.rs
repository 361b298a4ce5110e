//! Per-directory workspace state, persisted as `tst.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TstError;

pub const STATE_FILE: &str = "tst.json";

/// One upload's server-side bookkeeping, keyed by the submission's content
/// hash. `timestamp` correlates the upload with its grading job; `summary`
/// and `feedback` arrive later, once the worker has graded it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommitRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// State of one checked-out assignment.
///
/// The per-commit records sit at the top level of the file keyed by content
/// hash, next to the named fields; `flatten` keeps that flat on-disk shape.
/// Entries only accumulate, they are never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkspaceState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_revision: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tst_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<Value>,
    #[serde(flatten)]
    pub commits: BTreeMap<String, CommitRecord>,
}

impl WorkspaceState {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(STATE_FILE)
    }

    pub fn load(dir: &Path) -> Result<Self, TstError> {
        let raw =
            fs::read_to_string(Self::path_in(dir)).map_err(|_| TstError::WorkspaceMissing)?;
        serde_json::from_str(&raw).map_err(|_| TstError::WorkspaceMissing)
    }

    /// Checkout bootstraps a workspace, so a missing file starts empty.
    pub fn load_or_default(dir: &Path) -> Self {
        Self::load(dir).unwrap_or_default()
    }

    /// Write the full record back, temp file then rename. The struct holds
    /// every accumulated commit entry, so a save never drops older results.
    pub fn save(&self, dir: &Path) -> Result<(), TstError> {
        let mut payload = serde_json::to_string_pretty(self)?;
        payload.push('\n');
        let path = Self::path_in(dir);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Record a fresh upload: the hash becomes the last commit and its entry
    /// is reset to the new grading job's timestamp. A fresh timestamp means
    /// a fresh job, so any stale summary/feedback under this hash is cleared.
    pub fn record_upload(&mut self, hash: &str, timestamp: String) {
        self.last_commit = Some(hash.to_string());
        self.commits.insert(
            hash.to_string(),
            CommitRecord {
                timestamp: Some(timestamp),
                summary: None,
                feedback: None,
            },
        );
    }

    /// Attach a grading result to a previously recorded upload.
    pub fn record_result(&mut self, hash: &str, summary: String, feedback: String) {
        let entry = self.commits.entry(hash.to_string()).or_default();
        entry.summary = Some(summary);
        entry.feedback = Some(feedback);
    }
}
