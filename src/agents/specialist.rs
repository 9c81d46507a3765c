//! Leaf handlers.
//!
//! A specialist answers one kind of request, optionally reading or writing
//! the store first. Failures never escape [`Specialist::handle`]: external
//! errors become an apology with `error: true`, rejected writes become a
//! clarifying question.

use crate::core::{ConversationContext, Message, Metadata, keys};
use crate::error::{Error, Result, ValidationError};
use serde_json::Value;
use tracing::warn;

/// Reply given when an external call fails.
pub const APOLOGY: &str = "I'm unable to complete that right now. Please try again in a moment.";

/// A specialist's reply plus its flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecialistReply {
    /// Reply text.
    pub reply: String,
    /// Flags such as `equipment_added` or `needs_clarification`.
    pub flags: Metadata,
}

impl SpecialistReply {
    /// A reply with no flags.
    #[must_use]
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            flags: Metadata::new(),
        }
    }

    /// Sets a flag.
    #[must_use]
    pub fn flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.flags.insert(key.to_string(), value.into());
        self
    }

    /// A clarifying question; nothing was written.
    #[must_use]
    pub fn clarify(question: impl Into<String>) -> Self {
        Self::new(question).flag(keys::NEEDS_CLARIFICATION, true)
    }
}

/// Trait for leaf handlers.
///
/// `handle` is the only entry point callers use; implementors provide
/// `try_handle` and may return any error from it.
pub trait Specialist: Send + Sync {
    /// Label this specialist is registered under.
    fn label(&self) -> &str;

    /// One-line description for status output.
    fn description(&self) -> &str;

    /// Write flag this specialist always reports, if any.
    fn write_flag(&self) -> Option<&'static str> {
        None
    }

    /// Handles a message, propagating failures.
    ///
    /// # Errors
    ///
    /// Returns store, completion, or validation errors.
    fn try_handle(&mut self, message: &Message, context: &ConversationContext)
    -> Result<SpecialistReply>;

    /// Drops any in-progress state (such as a pending write).
    fn reset(&mut self) {}

    /// Whether `text` answers a question this specialist is waiting on.
    ///
    /// Routing sends such a message here even when no keyword matches.
    fn expects_follow_up(&self, _text: &str) -> bool {
        false
    }

    /// Handles a message; never fails.
    fn handle(&mut self, message: &Message, context: &ConversationContext) -> SpecialistReply {
        let mut reply = match self.try_handle(message, context) {
            Ok(reply) => reply,
            Err(Error::Validation(e)) => {
                warn!(specialist = self.label(), error = %e, "write rejected");
                SpecialistReply::clarify(clarifying_question(&e))
            }
            Err(e) => {
                warn!(specialist = self.label(), error = %e, "specialist failed");
                SpecialistReply::new(APOLOGY).flag(keys::ERROR, true)
            }
        };
        if let Some(flag) = self.write_flag() {
            reply.flags.entry(flag.to_string()).or_insert(Value::Bool(false));
        }
        reply
    }
}

/// Turns a rejected write into a question for the user.
#[must_use]
pub fn clarifying_question(error: &ValidationError) -> String {
    match error {
        ValidationError::MissingField { field, .. } => {
            format!("Could you tell me the {}?", field.replace('_', " "))
        }
        ValidationError::UnresolvedReference { field, value, .. } => format!(
            "I couldn't find a {} matching \"{value}\". Which one did you mean?",
            field.replace('_', " ")
        ),
        ValidationError::UnknownField { .. }
        | ValidationError::WrongType { .. }
        | ValidationError::Extraction { .. } => {
            "I didn't quite catch the details. Could you rephrase that?".to_string()
        }
    }
}
