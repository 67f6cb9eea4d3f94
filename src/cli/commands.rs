use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "BUSBIND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (overrides the configured one)
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate an interface descriptor and print its signature table
    Inspect {
        /// JSON interface descriptor
        descriptor: PathBuf,

        /// Print the normalized descriptor as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Parse a type signature and print its complete types
    Signature {
        /// Signature string, e.g. "a{sv}as"
        signature: String,
    },
}
