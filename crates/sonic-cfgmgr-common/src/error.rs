//! Error types for cfgmgr operations.
//!
//! This module defines the error types used throughout the cfgmgr crates.
//! All errors implement `std::error::Error` via `thiserror`.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for cfgmgr operations.
pub type CfgMgrResult<T> = Result<T, CfgMgrError>;

/// A structural validation failure reported back to the configuration
/// management layer.
///
/// `path` names the configuration node the operator has to fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Human readable description of the problem.
    pub message: String,
    /// Configuration path of the offending node.
    pub path: String,
}

impl CheckFailure {
    /// Creates a new check failure.
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at {})", self.message, self.path)
    }
}

impl std::error::Error for CheckFailure {}

/// Errors that can occur during cfgmgr operations.
#[derive(Debug, Error)]
pub enum CfgMgrError {
    /// A required configuration value is missing or malformed.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Cross-field validation rejected the configuration.
    #[error("Configuration check failed: {0}")]
    Check(#[from] CheckFailure),

    /// A collaborator broke an API contract. Not recoverable by the operator.
    #[error("Contract violation: {message}")]
    Contract {
        /// Error message.
        message: String,
    },

    /// The command sink rejected a command part way through a pass.
    #[error(
        "Failed to send '{command}': {message}; QoS state may be inconsistent, re-apply configuration"
    )]
    Transport {
        /// The command that could not be delivered.
        command: String,
        /// Error message from the sink.
        message: String,
    },

    /// Persisted state could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File the operation was working on.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Persisted state or a notification payload is not valid JSON.
    #[error("Malformed JSON in {context}: {source}")]
    Json {
        /// Where the JSON came from.
        context: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl CfgMgrError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::Contract {
            message: message.into(),
        }
    }

    /// Creates a transport error for a command the sink refused.
    pub fn transport(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates an I/O error bound to a path.
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON error.
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the operator can fix this by changing configuration
    /// and committing again.
    pub fn is_operator_recoverable(&self) -> bool {
        matches!(
            self,
            CfgMgrError::InvalidConfig { .. }
                | CfgMgrError::Check(_)
                | CfgMgrError::Transport { .. }
        )
    }
}
