//! Scaffdiff error types

use std::sync::Arc;
use std::time::Duration;

/// Message shown to end users when a patch cannot be produced.
const NO_PATCH_AVAILABLE: &str = "no patch available for this version pair";

/// Scaffdiff error types
#[derive(Debug, thiserror::Error)]
pub enum ScaffdiffError {
    // Request validation
    #[error("invalid diff location: {0}")]
    InvalidLocation(String),

    // External process errors
    #[error("command `{program}` failed with exit code {exit_code}: {stderr}")]
    Command {
        program: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },

    #[error("command `{program}` timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("scaffolding version {version} failed: {source}")]
    Scaffold {
        version: String,
        #[source]
        source: Box<ScaffdiffError>,
    },

    #[error("diff generation failed: {0}")]
    DiffGeneration(String),

    // Storage errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("network error: {0}")]
    Network(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Webhook errors
    #[error("webhook signature mismatch")]
    InvalidSignature,

    #[error("invalid webhook event: {0}")]
    InvalidEvent(String),

    /// Failure of a generation awaited by more than one caller.
    #[error(transparent)]
    Shared(Arc<ScaffdiffError>),
}

impl ScaffdiffError {
    /// Whether this is a cache or remote miss rather than a pipeline failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Shared(inner) => inner.is_not_found(),
            _ => false,
        }
    }

    /// Whether an external process failed (non-zero exit, spawn failure or timeout).
    pub fn is_command_failure(&self) -> bool {
        match self {
            Self::Command { .. } | Self::Spawn { .. } | Self::Timeout { .. } => true,
            Self::Scaffold { source, .. } => source.is_command_failure(),
            Self::Shared(inner) => inner.is_command_failure(),
            _ => false,
        }
    }

    /// Text safe to show an end user.
    ///
    /// Request, config and webhook problems are echoed back; everything
    /// else collapses to a generic message so raw command output never
    /// leaks by default.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidLocation(_)
            | Self::Configuration(_)
            | Self::InvalidSignature
            | Self::InvalidEvent(_) => self.to_string(),
            Self::Shared(inner) => inner.user_message(),
            _ => NO_PATCH_AVAILABLE.to_string(),
        }
    }
}

/// Result type alias for Scaffdiff operations
pub type Result<T> = std::result::Result<T, ScaffdiffError>;
