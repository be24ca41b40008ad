//! CLI argument definitions using clap
//!
//! Commands:
//! - docquery search --docs <path> [--request <path>] [--config <path>]
//! - docquery explain [--request <path>]
//!
//! Without `--request` the request is read from stdin.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// docquery - Query and aggregate JSON documents
#[derive(Parser, Debug)]
#[command(name = "docquery")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a search request against a JSON array of documents
    Search {
        /// Path to a JSON array of documents
        #[arg(long)]
        docs: PathBuf,

        /// Path to the search request (stdin when omitted)
        #[arg(long)]
        request: Option<PathBuf>,

        /// Path to the engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print a request after simplification and negation push-down
    Explain {
        /// Path to the search request (stdin when omitted)
        #[arg(long)]
        request: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "docquery", "search", "--docs", "docs.json", "--request", "req.json",
        ])
        .unwrap();
        match cli.command {
            Command::Search {
                docs,
                request,
                config,
            } => {
                assert_eq!(docs, PathBuf::from("docs.json"));
                assert_eq!(request, Some(PathBuf::from("req.json")));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_docs() {
        assert!(Cli::try_parse_from(["docquery", "search"]).is_err());
    }
}
