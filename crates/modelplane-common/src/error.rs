//! Error types for modelplane
//!
//! One taxonomy is shared by every crate so the HTTP layer can map an error
//! to a stable status code by kind. Kubernetes failures keep the underlying
//! `kube::Error` and the operation that produced it.

use thiserror::Error;

use crate::kube_utils::{is_conflict, is_not_found};

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Invariant violations a caller can trigger by repeating a create
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Conflict {
    /// A training run for the tenant is still active
    TrainingAlreadyRunning,
    /// The tenant already has a serving deployment
    DeploymentAlreadyExists,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Conflict::TrainingAlreadyRunning => write!(f, "TrainingAlreadyRunning"),
            Conflict::DeploymentAlreadyExists => write!(f, "DeploymentAlreadyExists"),
        }
    }
}

/// Main error type for modelplane operations
#[derive(Debug, Error)]
pub enum Error {
    /// The identity header was missing or empty
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// A tenant invariant would be violated by the request
    #[error("conflict: {0}")]
    Conflict(Conflict),

    /// A referenced resource does not exist
    #[error("{kind} {name} not found")]
    NotFound {
        /// Resource kind (e.g. "Job", "Deployment")
        kind: String,
        /// Resource name
        name: String,
    },

    /// The Kubernetes API rejected or failed a call for a reason other than absence
    #[error("platform error [{context}]: {source}")]
    Platform {
        /// Operation that failed (e.g. "create Service serving-abc")
        context: String,
        /// The underlying kube-rs error
        #[source]
        source: kube::Error,
    },

    /// Invalid request parameters
    #[error("validation error: {message}")]
    Validation {
        /// Description of what's invalid
        message: String,
        /// The invalid field (if known)
        field: Option<String>,
    },

    /// Invalid or incomplete process configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred
        context: String,
    },
}

impl From<kube::Error> for Error {
    fn from(source: kube::Error) -> Self {
        Self::Platform {
            context: UNKNOWN_CONTEXT.to_string(),
            source,
        }
    }
}

impl Error {
    /// Create an unauthenticated error
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create a not-found error for a resource
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Wrap a Kubernetes error with the operation that produced it
    pub fn platform(context: impl Into<String>, source: kube::Error) -> Self {
        Self::Platform {
            context: context.into(),
            source,
        }
    }

    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a validation error for a specific field
    pub fn validation_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Prefix the context of a platform error with the step that failed.
    ///
    /// Other variants are returned unchanged.
    pub fn in_step(self, step: &str) -> Self {
        match self {
            Error::Platform { context, source } if context == UNKNOWN_CONTEXT => Error::Platform {
                context: step.to_string(),
                source,
            },
            Error::Platform { context, source } => Error::Platform {
                context: format!("{}: {}", step, context),
                source,
            },
            other => other,
        }
    }

    /// Check if this error is retryable by the caller
    ///
    /// Nothing in modelplane retries; this only informs callers. Kubernetes
    /// errors are retryable unless they are 4xx, except 409 which signals a
    /// generated-name collision.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Platform { source, .. } => {
                is_conflict(source)
                    || !matches!(source, kube::Error::Api(ae) if (400..500).contains(&ae.code))
            }
            Error::Internal { .. } => true,
            Error::Unauthenticated(_)
            | Error::Conflict(_)
            | Error::NotFound { .. }
            | Error::Validation { .. }
            | Error::Config(_) => false,
        }
    }

    /// Whether this error reports a missing resource, either directly or via a Kubernetes 404
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Platform { source, .. } => is_not_found(source),
            _ => false,
        }
    }

    /// Whether this error is a Kubernetes 409 (the object already exists)
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Platform { source, .. } if is_conflict(source))
    }

    /// Get the context if this error has one
    pub fn context(&self) -> Option<&str> {
        match self {
            Error::Platform { context, .. } => Some(context),
            Error::Internal { context, .. } => Some(context),
            _ => None,
        }
    }
}
