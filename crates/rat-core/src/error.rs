//! # Error Types
//!
//! Validation errors raised while constructing core types. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Error constructing or parsing a core type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A tenant identifier was empty or whitespace-only.
    #[error("tenant id must not be empty")]
    EmptyTenant,

    /// A record identifier was empty or whitespace-only.
    #[error("record id must not be empty")]
    EmptyRecordId,

    /// A required record field was missing or blank.
    #[error("record field {field} is required")]
    MissingField {
        /// The camelCase field name.
        field: &'static str,
    },

    /// A timestamp could not be parsed.
    #[error("invalid timestamp {input:?}: {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        input: String,
        /// Parser diagnostic.
        reason: String,
    },
}
