// Library root
// -----------
// The binary (`main.rs`) wires these modules together:
//
// - `cli`: clap definitions for the checkout/commit/login subcommands.
// - `config` / `workspace`: the two persisted records — global login data
//   under ~/.tst, per-directory assignment state in tst.json.
// - `api`: blocking HTTP transport with bearer auth, behind a trait.
// - `checkout`, `commit`, `login`: the three user-facing flows; `commit`
//   holds the upload-once-then-poll engine.
// - `ui`: interactive prompts and progress feedback.
// - `error`: the error kinds the top-level dispatcher maps to exit codes.

pub mod api;
pub mod checkout;
pub mod cli;
pub mod commit;
pub mod config;
pub mod error;
pub mod key;
pub mod login;
pub mod ui;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_support;
