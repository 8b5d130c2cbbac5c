// Typed errors with thiserror. Surface meaningful messages to JS.
// Configuration errors are fatal to construction; transition and tick errors are soft signals.

use thiserror::Error;

use crate::types::{Epoch, SessionStatus};

/// Engine error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {field} {reason}")]
    Configuration { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Name of the offending field for configuration errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            EngineError::Configuration { field, .. } => Some(field),
            EngineError::Serialization(_) => None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

/// Control action requested on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Stop,
}

impl std::fmt::Display for SessionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// A control action that is not valid in the current status. The session is left untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} while {status}")]
    Invalid {
        action: SessionAction,
        status: SessionStatus,
    },
}

/// A frame callback that no longer belongs to the live run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("stale tick from epoch {tick_epoch} discarded (current epoch {current_epoch}, {status})")]
pub struct StaleTick {
    pub tick_epoch: Epoch,
    pub current_epoch: Epoch,
    pub status: SessionStatus,
}
