//! Error types for the wire contracts.

use thiserror::Error;

/// Input rejected before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("{field} cannot be empty")]
    BlankField { field: &'static str },
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Convenience result type for validation.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
