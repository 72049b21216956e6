//! Error taxonomy for the checkpoint hook.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the hook to the checkpoint coordinator.
#[derive(Debug, Error)]
pub enum HookError {
    /// A checkpoint name did not match `<prefix><decimal id>`.
    #[error("invalid checkpoint name '{name}': {reason}")]
    InvalidFormat { name: String, reason: String },

    /// The reader group did not produce a checkpoint before the deadline.
    #[error("checkpoint '{name}' timed out after {}ms", .timeout.as_millis())]
    Timeout { name: String, timeout: Duration },

    /// Error raised by the reader group, passed through unchanged.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),

    /// The hook's timer service was shut down.
    #[error("checkpoint hook is shut down")]
    ShutDown,

    /// Serialized checkpoint data carries a version this build cannot read.
    #[error("unsupported checkpoint serializer version {version}")]
    UnsupportedVersion { version: u32 },

    /// Checkpoint bytes could not be encoded or decoded.
    #[error("checkpoint serialization error: {0}")]
    Serialization(String),

    /// Hook configuration rejected at construction.
    #[error("invalid hook configuration: {0}")]
    InvalidConfig(String),

    /// Async runtime unavailable or a spawned completion task failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl HookError {
    pub(crate) fn invalid_format(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for the deadline-exceeded outcome of a trigger.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias used across the hook.
pub type HookResult<T> = std::result::Result<T, HookError>;
