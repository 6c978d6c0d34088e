//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fwset")]
#[command(author, version, about = "Materialize allow-rule sets as firewalld services")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "/etc/fwset/config.yaml", global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Optimize the configured rule sets and print the resulting
    /// services without touching the system
    Plan,

    /// Commit the configured rule sets to the firewall
    Apply,

    /// Show the currently committed set for a service
    Show {
        /// Template service name
        service: String,
    },

    /// Show version
    Version,
}
