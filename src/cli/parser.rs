//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use crate::config::{
    CompletionConfig, DEFAULT_AREA, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, FanOut, MemoryLimits,
    Settings,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// director-rs: a hierarchical conversational router.
///
/// Routes each message through a director, domain managers and
/// specialists backed by a local `SQLite` store.
#[derive(Parser, Debug)]
#[command(name = "director-rs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the database file.
    ///
    /// Defaults to `.director/director.db` in the current directory.
    #[arg(short, long, env = "DIRECTOR_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// Routing table JSON file (defaults to the built-in table).
    #[arg(long, env = "DIRECTOR_ROUTING_TABLE", global = true)]
    pub routing_table: Option<PathBuf>,

    /// Directory of prompt overrides.
    ///
    /// Falls back to `DIRECTOR_PROMPT_DIR`, then `~/.config/director-rs/prompts`.
    #[arg(long, global = true)]
    pub prompt_dir: Option<PathBuf>,

    /// API key for the completion service.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible service.
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Model name.
    #[arg(long, env = "DIRECTOR_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Per-call completion timeout in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout: u64,

    /// Answer without a language model.
    #[arg(long, global = true)]
    pub offline: bool,

    /// Consult domains of a multi-domain request in parallel.
    #[arg(long, global = true)]
    pub parallel: bool,

    /// Area that equipment groups and goals are scoped to.
    #[arg(long, default_value = DEFAULT_AREA, global = true)]
    pub area: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database.
    ///
    /// Creates the database file and schema, then seeds default equipment
    /// groups and meal types.
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Show store and hierarchy status.
    Status,

    /// Reset all data.
    Reset {
        /// Skip confirmation prompt.
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Send one message through the hierarchy.
    Chat {
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },

    /// Interactive session.
    Repl,

    /// Show the executive dashboard.
    Dashboard,

    /// Ask for a cross-domain strategic overview.
    Strategy,

    /// Show how a message would be routed, without answering it.
    Classify {
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show the routing table.
    Routes,

    /// Write the default prompt templates for editing.
    Prompts {
        /// Target directory (defaults to `~/.config/director-rs/prompts`).
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// List rows of a store table.
    Rows {
        /// Table name.
        table: String,

        /// Maximum number of rows.
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }

    /// Builds settings from the global flags.
    #[must_use]
    pub fn settings(&self) -> Settings {
        Settings {
            memory: MemoryLimits::default(),
            area: self.area.trim().to_string(),
            fan_out: if self.parallel {
                FanOut::Parallel
            } else {
                FanOut::Sequential
            },
            completion: CompletionConfig {
                api_key: self.api_key.clone(),
                base_url: self.base_url.clone(),
                model: self.model.clone(),
                timeout: Duration::from_secs(self.timeout),
                offline: self.offline,
                ..CompletionConfig::default()
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn test_cli(db_path: Option<PathBuf>, command: Commands) -> Cli {
    Cli {
        db_path,
        verbose: false,
        format: "text".to_string(),
        routing_table: None,
        prompt_dir: None,
        api_key: None,
        base_url: None,
        model: DEFAULT_MODEL.to_string(),
        timeout: DEFAULT_TIMEOUT_SECS,
        offline: true,
        parallel: false,
        area: DEFAULT_AREA.to_string(),
        command,
    }
}
