//! CLI module for docquery
//!
//! Provides command-line interface for:
//! - search: Run a request against a JSON document file
//! - explain: Show the rewritten form of a request

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build_store, explain, explain_request, run, run_command, search, search_documents};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json_file, read_request, write_error, write_response};
