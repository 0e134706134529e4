//! Error types for the upload pipeline
//!
//! Provides error handling for:
//! - Transport failures on `init`, chunk upload and `commit`
//! - Invalid upload configuration
//! - Blob materialization from files and readers
//! - In-memory store administration

use crate::types::ProposalId;
use std::path::PathBuf;

/// Failure reported by the remote store or the channel reaching it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The remote store refused the call (illegal path, unknown batch, ...)
    #[error("rejected by remote store: {0}")]
    Rejected(String),

    /// The call never produced a reply (network, actor unreachable)
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Create a rejection error
    #[inline]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Create an unavailability error
    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Whether a fresh upload operation could plausibly succeed
    ///
    /// The pipeline never retries on its own; this is a hint for callers.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Main upload error type
///
/// Every transport failure is tagged with the step that produced it. The
/// original [`TransportError`] stays reachable through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// `init` call failed, including remote rejection of the descriptor
    #[error("init failed: {0}")]
    Init(#[source] TransportError),

    /// A chunk upload failed; the batch is abandoned
    #[error("upload of chunk {order_id} failed: {source}")]
    Chunk {
        order_id: u64,
        #[source]
        source: TransportError,
    },

    /// `commit` call failed
    #[error("commit failed: {0}")]
    Commit(#[source] TransportError),

    /// Receipts collected do not match the planned chunk count
    #[error("chunk count mismatch: expected {expected}, got {actual}")]
    ChunkCountMismatch { expected: usize, actual: usize },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl UploadError {
    /// Underlying transport error, if this failure came from the transport
    #[must_use]
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            Self::Init(e) | Self::Commit(e) | Self::Chunk { source: e, .. } => Some(e),
            Self::ChunkCountMismatch { .. } | Self::Config(_) => None,
        }
    }

    /// Check if a brand-new upload operation may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.transport_error()
            .is_some_and(TransportError::is_retryable)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Chunk size of zero
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// Concurrency window of zero
    #[error("max concurrent uploads must be greater than zero")]
    ZeroConcurrency,

    /// Config file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`crate::UploadConfig`]
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Errors while snapshotting blob content
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// File could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reader failed mid-stream
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
}

/// Errors from administrative calls on the in-memory store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No staged assets exist under this proposal
    #[error("unknown proposal: {0}")]
    UnknownProposal(ProposalId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn transport_error_display() {
        let err = TransportError::rejected("bad path");
        assert_eq!(err.to_string(), "rejected by remote store: bad path");
    }

    #[test]
    fn transport_error_is_retryable() {
        assert!(TransportError::unavailable("timeout").is_retryable());
        assert!(!TransportError::rejected("no").is_retryable());
    }

    #[test]
    fn chunk_error_keeps_source() {
        let err = UploadError::Chunk {
            order_id: 4,
            source: TransportError::unavailable("reset"),
        };
        assert!(err.to_string().contains("chunk 4"));
        assert_eq!(
            err.transport_error(),
            Some(&TransportError::unavailable("reset"))
        );
        assert!(err.source().is_some());
        assert!(err.is_retryable());
    }

    #[test]
    fn mismatch_has_no_transport_error() {
        let err = UploadError::ChunkCountMismatch {
            expected: 3,
            actual: 2,
        };
        assert!(err.transport_error().is_none());
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_error_converts() {
        let err: UploadError = ConfigError::ZeroChunkSize.into();
        assert!(matches!(err, UploadError::Config(ConfigError::ZeroChunkSize)));
    }
}
