//! Command-line surface: three subcommands, each with the legacy
//! `--one-line-help` flag that prints a single description line and exits.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "tst", version, about = "TST-Online command line client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download the files of an assignment into the current directory.
    Checkout {
        /// Assignment key in hexadecimal (defaults to the one in tst.json).
        key: Option<String>,
        /// Print a one-line description and exit.
        #[arg(long)]
        one_line_help: bool,
    },
    /// Send a solution to the server and wait for grading results.
    Commit {
        /// Submission file (defaults to the filename in tst.json).
        filename: Option<String>,
        /// Print a one-line description and exit.
        #[arg(long)]
        one_line_help: bool,
    },
    /// Validate an access token and store it for later use.
    Login {
        /// Access token (prompted for when omitted).
        token: Option<String>,
        /// Print a one-line description and exit.
        #[arg(long)]
        one_line_help: bool,
    },
}

impl Command {
    /// The description line for `--one-line-help`, when the flag was given.
    pub fn one_line_help(&self) -> Option<&'static str> {
        match self {
            Command::Checkout {
                one_line_help: true,
                ..
            } => Some("download assignment files"),
            Command::Commit {
                one_line_help: true,
                ..
            } => Some("send solution to server"),
            Command::Login {
                one_line_help: true,
                ..
            } => Some("log into TST Server"),
            _ => None,
        }
    }
}
