//! This module defines all error types used throughout the crate.

use crate::state_machine::{Kind, ValidationIssue};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A declaration referenced a state that was never declared
    #[error("State '{0}' not defined")]
    UndeclaredState(String),

    /// A runtime lookup named a state the automaton does not know
    #[error("Unknown state: {0}")]
    UnknownState(String),

    /// Aggregate build failure, one entry per validation error
    #[error("Invalid state machine:\n- {}", .messages.join("\n- "))]
    Build {
        messages: Vec<String>,
        issues: Vec<ValidationIssue>,
    },

    /// The runtime found the graph in a shape validation should have ruled out
    #[error("Inconsistent state machine: {0}")]
    Inconsistent(String),

    /// The wrapped operation failed; bookkeeping already ran
    #[error("{kind} '{ident}' failed in state '{state}': {source}")]
    Operation {
        kind: Kind,
        ident: String,
        state: String,
        #[source]
        source: anyhow::Error,
    },

    /// The operation exists but the current state does not offer it
    #[error("{kind} '{ident}' is not allowed in state '{state}'")]
    NotAllowed {
        kind: Kind,
        ident: String,
        state: String,
    },

    /// The operation is allowed by the automaton but missing from its registry
    #[error("{kind} '{ident}' not found")]
    NotRegistered { kind: Kind, ident: String },

    /// Definition file parsing errors
    #[error("Definition parsing error in {file:?}: {message}")]
    Definition { file: PathBuf, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an inconsistency fault
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::Inconsistent(msg.into())
    }

    /// Build the aggregate error from the error-level issues of a validation run
    pub fn build(issues: Vec<ValidationIssue>) -> Self {
        let messages = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.message.clone())
            .collect();
        Self::Build { messages, issues }
    }

    /// Check if error came from the wrapped operation rather than the automaton
    pub fn is_operation(&self) -> bool {
        matches!(self, Error::Operation { .. })
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Definition {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(format!("JSON error: {}", err))
    }
}

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}
