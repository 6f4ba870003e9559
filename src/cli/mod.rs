//! CLI module for bucketql
//!
//! Provides command-line interface for:
//! - explain: print the compiled pipeline for a find request
//! - find: compile and run a find request against in-memory data

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, QuerySource};
pub use commands::{explain, find, run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{read_json_file, read_request, write_response};
