//! Error types for Reshelf
//!
//! Only [`ReshelfError::Config`] (and the I/O errors raised while loading
//! configuration) abort a run. Every other variant is raised for a single
//! item and folded into the report's failure list by the engine.

use std::io;
use thiserror::Error;

/// Reshelf error type
#[derive(Error, Debug)]
pub enum ReshelfError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Pattern error: {0}")]
    Pattern(String),

    #[error("Cannot classify '{item}': {reason}")]
    Classification { item: String, reason: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Destination '{destination}' is occupied by another item")]
    Collision { destination: String },

    #[error("Move '{from}' -> '{to}' failed: {reason}")]
    Move {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Scope not found: {0}")]
    ScopeNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Timed out after {millis} ms waiting on '{item}'")]
    Timeout { item: String, millis: u64 },

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl ReshelfError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error aborts a whole reconciliation run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Classification { .. }
                | Self::InvalidName { .. }
                | Self::Collision { .. }
                | Self::Move { .. }
                | Self::Timeout { .. }
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ReshelfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_run_level_errors_are_fatal() {
        assert!(ReshelfError::config("bad").is_fatal());
        assert!(ReshelfError::ScopeNotFound("/Game".into()).is_fatal());
        assert!(!ReshelfError::Collision {
            destination: "/Game/SM/SM_Rock".into()
        }
        .is_fatal());
        assert!(!ReshelfError::Timeout {
            item: "/Game/rock".into(),
            millis: 10
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_paths() {
        let err = ReshelfError::Move {
            from: "/Game/rock".into(),
            to: "/Game/SM/SM_Rock".into(),
            reason: "locked".into(),
        };
        let text = err.to_string();
        assert!(text.contains("/Game/rock"));
        assert!(text.contains("/Game/SM/SM_Rock"));
        assert!(text.contains("locked"));
    }
}
