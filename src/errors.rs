//! Error taxonomy for the staging store.
//!
//! Every failure is local to the operation that raised it and is surfaced to
//! the caller unchanged; nothing is retried internally.

use std::io;
use thiserror::Error;

/// Error type a `before_complete` hook may fail with.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("upload `{0}` not found")]
    SessionNotFound(String),
    #[error("key `{0}` not found")]
    KeyNotFound(String),
    #[error("offset mismatch: upload is at {actual}, request assumed {expected}")]
    OffsetMismatch { actual: u64, expected: u64 },
    #[error("upload `{0}` is locked by another append")]
    UploadLocked(String),
    #[error("stream exceeded the remaining upload length of {limit} bytes")]
    LengthExceeded { limit: u64 },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("before-complete hook failed")]
    Hook(#[source] HookError),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    /// Shortcut for wrapping a hook failure.
    pub fn hook(err: impl Into<HookError>) -> Self {
        Self::Hook(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn hook_message_lives_in_source_only() {
        let err = StoreError::hook("checksum rejected");
        assert_eq!(err.to_string(), "before-complete hook failed");
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "checksum rejected");
    }
}
