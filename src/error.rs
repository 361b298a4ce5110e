//! Error kinds surfaced by the CLI.
//!
//! Every variant is terminal for the current invocation: the binary's
//! dispatcher prints the message to stderr as `tst: {message}` and exits
//! non-zero. The only in-process recovery anywhere is the commit engine's
//! unchanged-content shortcut and its bounded poll retries.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TstError {
    /// `~/.tst/config.json` is missing or unreadable.
    #[error("couldn't read the config file; run 'tst login' first")]
    ConfigMissing,

    /// No readable `tst.json` in the working directory.
    #[error("couldn't read tst.json; run 'tst checkout' first")]
    WorkspaceMissing,

    /// A key given on the command line is not valid hexadecimal.
    #[error("invalid key '{0}'")]
    InvalidKey(String),

    /// Checkout was invoked with no key argument and no workspace to read one from.
    #[error("what key should be used?")]
    MissingKey,

    /// The workspace exists but its `key` field is absent or malformed.
    #[error("couldn't read key from tst.json")]
    WorkspaceKeyMissing,

    /// Commit was invoked with no filename argument and no workspace default.
    #[error("syntax: tst commit [filename]")]
    MissingFilename,

    /// The submission file to commit does not exist.
    #[error("no file named '{0}' found")]
    SubmissionMissing(String),

    /// A request never reached the service (no connectivity, timeout).
    #[error("sorry, no internet connection?")]
    NetworkUnavailable(#[source] reqwest::Error),

    /// The service rejected the request with a message payload (4xx).
    #[error("{message} (status code {status})")]
    ServerRejected { status: u16, message: String },

    /// Non-2xx response without a structured message.
    #[error("are you logged in? (status code {0})")]
    Unauthorized(u16),

    /// 412 on commit, typically a stale activity revision.
    #[error("{message} (status code 412)")]
    PreconditionFailed { message: String },

    /// The poll retry budget ran out without a grading result appearing.
    #[error("the test worker seems to be down, please try again later")]
    PollTimeout,

    /// Token validation failed; carries the server's response verbatim.
    #[error("invalid token: '{0}'")]
    TokenRejected(String),

    /// A 200 response whose body did not have the expected shape.
    #[error("unexpected server response: {0}")]
    BadResponse(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
