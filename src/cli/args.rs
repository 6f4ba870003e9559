//! CLI argument definitions using clap
//!
//! Commands:
//! - bucketql explain --schemas <path> --bucket <id> [--request <path>]
//! - bucketql find --schemas <path> --bucket <id> --data <path> [--request <path>]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// bucketql - access-controlled query compiler for document buckets
#[derive(Parser, Debug)]
#[command(name = "bucketql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Inputs shared by every command
#[derive(Args, Debug, Clone)]
pub struct QuerySource {
    /// Path to compiler configuration file (defaults apply when omitted)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON file holding an array of bucket schemas
    #[arg(long)]
    pub schemas: PathBuf,

    /// Bucket to query
    #[arg(long)]
    pub bucket: String,

    /// Find request as JSON; read from stdin when omitted
    #[arg(long)]
    pub request: Option<PathBuf>,

    /// Caller identity as JSON
    #[arg(long)]
    pub auth: Option<PathBuf>,

    /// Bucket whose schema describes the caller identity
    #[arg(long)]
    pub identity_bucket: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the compiled aggregation pipeline without running it
    Explain {
        #[command(flatten)]
        source: QuerySource,
    },

    /// Compile and run a find request against in-memory data
    Find {
        #[command(flatten)]
        source: QuerySource,

        /// JSON object mapping collection names to document arrays
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
