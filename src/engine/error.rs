//! Dispatch error types.
//!
//! Both variants are expected client-facing conditions; nothing here is fatal
//! to the engine.

use thiserror::Error;

/// Errors returned by engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No workers to remove")]
    EmptyPool,
}

impl DispatchError {
    /// Returns true if the caller sent something the engine cannot accept.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
