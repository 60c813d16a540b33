//! Errors crossing the engine's public boundary.
//!
//! Only three kinds escape: bad input, a violated precondition, or a missing
//! entity. Downstream failures (push, persistence, directory) never surface
//! here; adapters log and swallow them.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Missing required field, unknown pickup/station id, unsupported command.
    InvalidInput(String),
    /// The request was well-formed but the state refuses it: no plan, seats
    /// exhausted, driver not routed to the station, destination mismatch.
    PreconditionFailed(String),
    /// Unknown rider, driver, or trip id.
    NotFound(String),
}

impl DispatchError {
    pub fn invalid(message: impl Into<String>) -> Self {
        DispatchError::InvalidInput(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        DispatchError::PreconditionFailed(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        DispatchError::NotFound(message.into())
    }

    pub fn message(&self) -> &str {
        match self {
            DispatchError::InvalidInput(m)
            | DispatchError::PreconditionFailed(m)
            | DispatchError::NotFound(m) => m,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Error for DispatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_message() {
        let err = DispatchError::not_found("rider 'r1' not found");
        assert_eq!(err.to_string(), "rider 'r1' not found");
    }
}
