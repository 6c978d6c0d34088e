//! fwset - firewalld service set manager.
//!
//! Declares allow-rules as targets and materializes them as minimal
//! firewalld service definitions.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use fwset::cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Plan => fwset::commands::plan::run(&cli.config),
        Commands::Apply => fwset::commands::apply::run(&cli.config),
        Commands::Show { service } => fwset::commands::show::run(&cli.config, &service),
        Commands::Version => {
            println!("fwset {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
