//! Error types for the Warden controller
//!
//! Errors are grouped by how the control loop reacts to them. A pass that hits
//! a `NotYetReady` condition is deferred and retried when the host redelivers
//! the trigger. A `Configuration` error blocks until the operator changes the
//! configuration. `Io` errors abort the pass and keep the last applied state.

use thiserror::Error;

use crate::template::TemplateError;

/// Main error type for Warden operations
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition for convergence does not hold yet
    #[error("not ready: {message}")]
    NotYetReady {
        /// What the controller is waiting for
        message: String,
    },

    /// The desired configuration cannot be turned into a workload state
    #[error("configuration error: {message}")]
    Configuration {
        /// Operator-facing description of what is wrong
        message: String,
        /// The offending entry (environment variable name or file path)
        field: Option<String>,
        /// Template failure behind this error, if any
        #[source]
        source: Option<TemplateError>,
    },

    /// The supervisor could not read, write, or drive the workload container
    #[error("io error [{context}]: {message}")]
    Io {
        /// Description of what failed
        message: String,
        /// Operation that failed (e.g., "push", "start", "add_layer")
        context: String,
        /// Path in the workload container, for file operations
        path: Option<String>,
    },

    /// Persisted controller state could not be loaded or saved
    #[error("store error: {message}")]
    Store {
        /// Description of what failed
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The document kind being processed (if known)
        kind: Option<String>,
    },
}

impl Error {
    /// Create a not-ready error with the given message
    pub fn not_yet_ready(msg: impl Into<String>) -> Self {
        Self::NotYetReady {
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: None,
            source: None,
        }
    }

    /// Create a configuration error about a specific entry
    pub fn configuration_for(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: Some(field.into()),
            source: None,
        }
    }

    /// Create a configuration error caused by a template failure
    pub fn render(
        field: impl Into<String>,
        msg: impl Into<String>,
        source: TemplateError,
    ) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: Some(field.into()),
            source: Some(source),
        }
    }

    /// Create an I/O error for a supervisor operation
    pub fn io(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Io {
            message: msg.into(),
            context: context.into(),
            path: None,
        }
    }

    /// Create an I/O error for a file operation in the workload container
    pub fn io_for(
        context: impl Into<String>,
        path: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Io {
            message: msg.into(),
            context: context.into(),
            path: Some(path.into()),
        }
    }

    /// Create a store error with the given message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store {
            message: msg.into(),
        }
    }

    /// Create a serialization error with document kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration and serialization errors need an operator change, so
    /// redelivering the same trigger cannot fix them.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NotYetReady { .. } => true,
            Error::Configuration { .. } => false,
            Error::Io { .. } => true,
            Error::Store { .. } => true,
            Error::Serialization { .. } => false,
        }
    }

    /// Operator-facing message, without the category prefix of `Display`
    pub fn message(&self) -> &str {
        match self {
            Error::NotYetReady { message }
            | Error::Configuration { message, .. }
            | Error::Io { message, .. }
            | Error::Store { message }
            | Error::Serialization { message, .. } => message,
        }
    }

    /// Get the container path if this error is about a specific file
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Io { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}
