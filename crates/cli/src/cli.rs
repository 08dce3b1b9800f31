//! Command-line definitions for the `gleaner` binary.
//!
//! Storage and HTTP settings come from the layered configuration
//! (`GLEANER_CONFIG_FILE`, `GLEANER_*` environment variables), not from flags.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Register a crawl source described by a TOML file
    AddSource { file: PathBuf },

    /// List registered sources with their crawl statistics
    Sources {
        /// Include inactive sources
        #[arg(long)]
        all: bool,
    },

    /// Create a job for a source and run it to completion
    Crawl { source_id: i64 },

    /// Print a job with its log as JSON
    Job { job_id: i64 },

    /// Cancel a pending or running job
    Cancel { job_id: i64 },

    /// Add an item to the published corpus from a TOML file
    Publish { file: PathBuf },

    /// Delete finished jobs older than the retention window
    PurgeJobs {
        /// Retention in days (defaults to `job_retention_days`)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl() {
        let cli = Cli::parse_from(["gleaner", "crawl", "3"]);
        assert_eq!(cli.command, Command::Crawl { source_id: 3 });
    }

    #[test]
    fn test_parse_add_source() {
        let cli = Cli::parse_from(["gleaner", "add-source", "blog.toml"]);
        assert_eq!(cli.command, Command::AddSource { file: PathBuf::from("blog.toml") });
    }

    #[test]
    fn test_parse_purge_jobs() {
        let cli = Cli::parse_from(["gleaner", "purge-jobs"]);
        assert_eq!(cli.command, Command::PurgeJobs { days: None });

        let cli = Cli::parse_from(["gleaner", "purge-jobs", "--days", "7"]);
        assert_eq!(cli.command, Command::PurgeJobs { days: Some(7) });
    }

    #[test]
    fn test_parse_sources_flag() {
        let cli = Cli::parse_from(["gleaner", "sources", "--all"]);
        assert_eq!(cli.command, Command::Sources { all: true });
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["gleaner", "job", "abc"]).is_err());
    }
}
