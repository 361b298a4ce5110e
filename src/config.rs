//! Global configuration: service URL, access token, user email.
//!
//! Loaded once per invocation and treated as read-only everywhere except the
//! login flow, which is the only writer.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::TstError;

/// Service base used on a first login when `TST_URL` is not set.
const DEFAULT_URL: &str = "http://tst-online.appspot.com";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigState {
    pub url: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub email: String,
}

impl ConfigState {
    /// Starting config for a first login: base URL from `TST_URL` or the
    /// built-in default, no credentials yet.
    pub fn bootstrap() -> Self {
        let url = std::env::var("TST_URL").unwrap_or_else(|_| DEFAULT_URL.into());
        ConfigState {
            url,
            access_token: String::new(),
            email: String::new(),
        }
    }
}

/// Owns the path of the persisted config record (`~/.tst/config.json`).
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at the standard per-user location.
    pub fn new() -> Result<Self, TstError> {
        let home = dirs::home_dir().ok_or(TstError::ConfigMissing)?;
        Ok(ConfigStore {
            path: home.join(".tst").join("config.json"),
        })
    }

    /// Store at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    /// A missing or malformed file both read as "not logged in"; this store
    /// never repairs, the caller terminates with the diagnostic.
    pub fn load(&self) -> Result<ConfigState, TstError> {
        let raw = fs::read_to_string(&self.path).map_err(|_| TstError::ConfigMissing)?;
        serde_json::from_str(&raw).map_err(|_| TstError::ConfigMissing)
    }

    /// Saved config, or a bootstrap one when none exists yet (login only).
    pub fn load_or_bootstrap(&self) -> ConfigState {
        self.load().unwrap_or_else(|_| ConfigState::bootstrap())
    }

    /// Write the record through a temp file and rename, so a crash mid-write
    /// leaves the previous file intact.
    pub fn save(&self, config: &ConfigState) -> Result<(), TstError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut payload = serde_json::to_string_pretty(config)?;
        payload.push('\n');
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
