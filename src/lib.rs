//! # director-rs
//!
//! Hierarchical conversational router.
//!
//! A [`Director`] receives every message, classifies it against a keyword
//! routing table, and answers directly, forwards it to one
//! [`DomainManager`], or consults several and merges their replies. Domain
//! managers in turn hand messages to specialists that read and write a
//! local `SQLite` store.
//!
//! ## Features
//!
//! - **Keyword routing**: Deterministic, priority-ordered classification with
//!   bridge phrases for cross-domain requests
//! - **Bounded memory**: Per-node conversation context with FIFO eviction
//! - **Validated writes**: Extracted fields are checked before any row is stored
//! - **Pluggable completion**: `OpenAI`-compatible service or a deterministic
//!   offline backend

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod agents;
pub mod cli;
pub mod completion;
pub mod config;
pub mod core;
pub mod error;
pub mod routing;
pub mod storage;

// Re-export commonly used types at crate root
pub use error::{Error, Result};

// Re-export core domain types
pub use core::{ConversationContext, Message, Metadata, ResponseEnvelope, Role, Turn};

// Re-export hierarchy types
pub use agents::{
    Director, DomainManager, EquipmentSpecialist, NutritionSpecialist, PromptSet, Services,
    Specialist, SpecialistReply, build_director,
};

// Re-export routing types
pub use routing::{Granularity, RoutePlan, RoutingDecision, RoutingTable, classify};

// Re-export storage types
pub use storage::{DEFAULT_DB_PATH, Filter, Record, SqliteStore, Store};

// Re-export completion types
pub use completion::{Completion, OfflineCompletion, Prompt, SharedCompletion, create_completion};

// Re-export configuration types
pub use config::{CompletionConfig, FanOut, MemoryLimits, Settings};

// Re-export CLI types
pub use cli::{Cli, Commands, OutputFormat};
