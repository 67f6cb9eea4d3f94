//! Command-line interface module.
//!
//! This module provides the CLI functionality for:
//! - Inspecting interface descriptors
//! - Parsing type signatures

pub mod commands;
pub mod handlers;

pub use commands::{Cli, Commands};
pub use handlers::{handle_inspect, handle_signature};
