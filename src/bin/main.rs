//! busbind binary.
//!
//! Inspects interface descriptors and type signatures.

use anyhow::Result;
use busbind_core::{
    cli::{handle_inspect, handle_signature, Cli, Commands},
    config::BusbindConfig,
    logging,
};
use clap::Parser;
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BusbindConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    logging::init(&config.logging)?;
    debug!(?config, "configuration loaded");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Inspect { descriptor, json } => handle_inspect(&descriptor, json, &mut out),
        Commands::Signature { signature } => handle_signature(&signature, &mut out),
    }
}
