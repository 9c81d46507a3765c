//! CLI layer for director-rs.
//!
//! Provides the command-line interface using clap, with commands for
//! initializing the store, chatting with the hierarchy, and inspecting
//! routing decisions.

pub mod commands;
pub mod output;
pub mod parser;
pub mod repl;

pub use commands::{build_from_cli, execute};
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
