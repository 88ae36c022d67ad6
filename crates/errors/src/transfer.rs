//! Chunk- and descriptor-level transfer errors

use std::borrow::Cow;
use std::fmt;

use crate::{AuthError, UserFacingError};
use thiserror::Error;

/// Outcome of a single failed range read against the CAS endpoint.
#[derive(Debug, Clone, Error)]
pub enum ChunkError {
    #[error("{0}")]
    Auth(#[from] AuthError),

    #[error("content not found: {hash}")]
    NotFound { hash: String },

    #[error("integrity check failed: {message}")]
    Integrity { message: String },

    #[error("transient network failure: {message}")]
    Transient { message: String },

    #[error("unexpected response (HTTP {status}): {message}")]
    Protocol { status: u16, message: String },
}

impl ChunkError {
    /// Whether another attempt of the same request could succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Classification of this failure at descriptor level
    #[must_use]
    pub fn kind(&self) -> TransferErrorKind {
        match self {
            Self::Auth(_) => TransferErrorKind::Auth,
            Self::NotFound { .. } => TransferErrorKind::NotFound,
            Self::Integrity { .. } => TransferErrorKind::Integrity,
            Self::Transient { .. } => TransferErrorKind::TransientNetwork,
            Self::Protocol { .. } => TransferErrorKind::Protocol,
        }
    }
}

/// Failure category of one descriptor's transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferErrorKind {
    /// Credential expired, out of scope, or rejected by the backend
    Auth,
    /// The backend has no data for the content hash
    NotFound,
    /// Assembled bytes do not match the descriptor, or the backend reported a checksum mismatch
    Integrity,
    /// Retry ceiling exhausted on timeouts, resets or 5xx replies
    TransientNetwork,
    /// The backend answered with something the protocol does not allow
    Protocol,
    /// The descriptor itself cannot be transferred (unparseable hash)
    InvalidDescriptor,
    /// Local filesystem failure on the staging or final path
    Io,
    /// The transfer was aborted before completion
    Cancelled,
}

impl TransferErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::NotFound => "not_found",
            Self::Integrity => "integrity",
            Self::TransientNetwork => "transient_network",
            Self::Protocol => "protocol",
            Self::InvalidDescriptor => "invalid_descriptor",
            Self::Io => "io",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A descriptor's transfer failed; `index` points into the request's
/// descriptor list.
#[derive(Debug, Clone, Error)]
#[error("descriptor {index} failed ({kind}): {message}")]
pub struct TransferError {
    pub index: usize,
    pub kind: TransferErrorKind,
    pub message: String,
}

impl TransferError {
    pub fn new(index: usize, kind: TransferErrorKind, message: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            message: message.into(),
        }
    }

    /// Lift a chunk failure to the descriptor it belongs to
    #[must_use]
    pub fn from_chunk(index: usize, err: &ChunkError) -> Self {
        Self::new(index, err.kind(), err.to_string())
    }

    /// Same failure reported against another index (shared-hash descriptors)
    #[must_use]
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index,
            ..self.clone()
        }
    }
}

impl UserFacingError for TransferError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self.kind {
            TransferErrorKind::Auth => Some("Obtain a fresh download credential and retry."),
            TransferErrorKind::NotFound => {
                Some("The backend does not hold this content; re-resolve the reference.")
            }
            TransferErrorKind::Integrity => {
                Some("The content does not match its hash; re-resolve the reference.")
            }
            TransferErrorKind::TransientNetwork => Some("Retry later."),
            TransferErrorKind::Io => {
                Some("Check free space and permissions of the destination directory.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransferErrorKind::TransientNetwork | TransferErrorKind::Io
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self.kind {
            TransferErrorKind::Auth => "transfer.auth",
            TransferErrorKind::NotFound => "transfer.not_found",
            TransferErrorKind::Integrity => "transfer.integrity",
            TransferErrorKind::TransientNetwork => "transfer.transient_network",
            TransferErrorKind::Protocol => "transfer.protocol",
            TransferErrorKind::InvalidDescriptor => "transfer.invalid_descriptor",
            TransferErrorKind::Io => "transfer.io",
            TransferErrorKind::Cancelled => "transfer.cancelled",
        };
        Some(code)
    }
}
