//! Core conversation models.
//!
//! Messages, turns, bounded per-node memory, and reply envelopes. These are
//! pure value types with no I/O dependencies.

pub mod context;
pub mod envelope;
pub mod message;

pub use context::{ConversationContext, truncate_graphemes};
pub use envelope::{Metadata, ResponseEnvelope, keys};
pub use message::{Message, Role, Turn};
