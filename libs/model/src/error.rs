//! Validation errors for model records.

use thiserror::Error;

/// A record failed validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A required field is empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A lower bound is greater than its upper bound.
    #[error("{field}: minimum {min} exceeds maximum {max}")]
    InvertedBounds {
        field: &'static str,
        min: u64,
        max: u64,
    },

    /// A value is outside its permitted range.
    #[error("{field} out of range: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },
}
