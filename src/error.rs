//! Error types for director operations.
//!
//! This module provides the error hierarchy using `thiserror` for storage,
//! completion calls, write validation, routing tables, and CLI commands.

use thiserror::Error;

/// Result type alias for director operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Completion service errors.
    #[error("completion error: {0}")]
    Completion(#[from] CompletionError),

    /// A write or extraction was rejected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Routing table errors.
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Returns true when the error came from an external call (store or
    /// completion service) rather than from the caller's input.
    #[must_use]
    pub const fn is_external(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Completion(_))
    }
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized (init command not run).
    #[error("director not initialized. Run: director-rs init")]
    NotInitialized,

    /// Table name not known to the store.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// Requested table name.
        name: String,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by the completion service.
#[derive(Error, Debug)]
pub enum CompletionError {
    /// The call did not finish within the configured timeout.
    #[error("completion timed out after {seconds}s")]
    Timeout {
        /// Timeout in seconds.
        seconds: u64,
    },

    /// Network or runtime failure before a response arrived.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The service answered with an error.
    #[error("service error: {0}")]
    Api(String),

    /// The service answered with no content.
    #[error("empty response from {backend}")]
    EmptyResponse {
        /// Backend name.
        backend: String,
    },

    /// A scripted test double ran out of replies.
    #[error("no scripted reply left")]
    Exhausted,
}

impl CompletionError {
    /// Returns true if a single retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport(_) => true,
            Self::Api(message) => {
                let lower = message.to_lowercase();
                lower.contains("429")
                    || lower.contains("rate limit")
                    || lower.contains("500")
                    || lower.contains("502")
                    || lower.contains("503")
                    || lower.contains("504")
                    || lower.contains("server error")
                    || lower.contains("service unavailable")
            }
            Self::EmptyResponse { .. } | Self::Exhausted => false,
        }
    }
}

/// A write was rejected, or structured fields could not be extracted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is absent or blank.
    #[error("{table}: missing required field '{field}'")]
    MissingField {
        /// Target table.
        table: String,
        /// Field name.
        field: String,
    },

    /// A foreign-key value does not match any row.
    #[error("{table}: '{field}' references unknown row {value}")]
    UnresolvedReference {
        /// Target table.
        table: String,
        /// Field name.
        field: String,
        /// Offending value.
        value: String,
    },

    /// A field the table does not declare.
    #[error("{table}: unknown field '{field}'")]
    UnknownField {
        /// Target table.
        table: String,
        /// Field name.
        field: String,
    },

    /// A field value has the wrong type.
    #[error("{table}: field '{field}' expects {expected}")]
    WrongType {
        /// Target table.
        table: String,
        /// Field name.
        field: String,
        /// Expected type name.
        expected: String,
    },

    /// Extraction produced no usable record.
    #[error("could not extract fields: {reason}")]
    Extraction {
        /// Why extraction failed.
        reason: String,
    },
}

impl ValidationError {
    /// Name of the field at fault, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field, .. }
            | Self::UnresolvedReference { field, .. }
            | Self::UnknownField { field, .. }
            | Self::WrongType { field, .. } => Some(field),
            Self::Extraction { .. } => None,
        }
    }
}

/// Routing table errors.
#[derive(Error, Debug)]
pub enum RoutingError {
    /// The same label declared twice in one rule set.
    #[error("duplicate label '{label}' in {scope}")]
    DuplicateLabel {
        /// Rule set name.
        scope: String,
        /// Label.
        label: String,
    },

    /// A bridge names a label the rule set does not declare.
    #[error("bridge '{phrase}' in {scope} names unknown label '{label}'")]
    UnknownBridgeLabel {
        /// Rule set name.
        scope: String,
        /// Bridge phrase.
        phrase: String,
        /// Unknown label.
        label: String,
    },

    /// A label with no keywords at all.
    #[error("label '{label}' in {scope} has no keywords")]
    EmptyLabel {
        /// Rule set name.
        scope: String,
        /// Label.
        label: String,
    },

    /// A specialist rule set for a domain that does not exist.
    #[error("specialists declared for unknown domain '{domain}'")]
    UnknownDomain {
        /// Domain label.
        domain: String,
    },

    /// Version field not supported by this build.
    #[error("unsupported routing table version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found.
        found: u32,
        /// Version supported.
        expected: u32,
    },

    /// The table file could not be read or parsed.
    #[error("failed to load routing table {path}: {reason}")]
    Load {
        /// Path to the table file.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Command(CommandError::ExecutionFailed(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");

        let err = Error::Config {
            message: "missing api key".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: missing api key");
    }

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotInitialized;
        assert_eq!(
            err.to_string(),
            "director not initialized. Run: director-rs init"
        );

        let err = StorageError::UnknownTable {
            name: "widgets".to_string(),
        };
        assert_eq!(err.to_string(), "unknown table: widgets");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::MissingField {
            table: "equipment_items".to_string(),
            field: "item_name".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "equipment_items: missing required field 'item_name'"
        );
        assert_eq!(err.field(), Some("item_name"));

        let err = ValidationError::UnresolvedReference {
            table: "equipment_items".to_string(),
            field: "equipment_group".to_string(),
            value: "99".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "equipment_items: 'equipment_group' references unknown row 99"
        );

        let err = ValidationError::Extraction {
            reason: "no JSON object".to_string(),
        };
        assert!(err.field().is_none());
    }

    #[test]
    fn test_routing_error_display() {
        let err = RoutingError::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "unsupported routing table version 9 (expected 1)"
        );
    }

    #[test]
    fn test_completion_retryable() {
        assert!(CompletionError::Timeout { seconds: 30 }.is_retryable());
        assert!(CompletionError::Transport("reset".to_string()).is_retryable());
        assert!(CompletionError::Api("429 Too Many Requests".to_string()).is_retryable());
        assert!(CompletionError::Api("503 Service Unavailable".to_string()).is_retryable());
        assert!(!CompletionError::Api("401 invalid api key".to_string()).is_retryable());
        assert!(
            !CompletionError::EmptyResponse {
                backend: "openai".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_is_external() {
        let err: Error = StorageError::NotInitialized.into();
        assert!(err.is_external());

        let err: Error = CompletionError::Timeout { seconds: 1 }.into();
        assert!(err.is_external());

        let err: Error = ValidationError::Extraction {
            reason: String::new(),
        }
        .into();
        assert!(!err.is_external());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let err: Error = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }
}
