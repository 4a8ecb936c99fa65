//! CLI module for versadoc
//!
//! Provides command-line interface for:
//! - check: Validate a config file and print derived resource settings
//! - replay: Run JSON-lines operations against an in-memory store

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{check, replay, run, run_command, OpKind, ReplayRequest, Replayer};
pub use errors::{CliError, CliResult};
pub use io::{read_lines, write_error, write_response};
