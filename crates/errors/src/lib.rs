#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for hubcas
//!
//! This crate provides fine-grained error types organized by domain.
//! All error types implement Clone so they can be fanned out to every
//! descriptor index that shares a failed transfer.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod hub;
pub mod network;
pub mod storage;
pub mod transfer;

// Re-export all error types at the root
pub use config::ConfigError;
pub use hub::{AuthError, ResolutionError};
pub use network::NetworkError;
pub use storage::StorageError;
pub use transfer::{ChunkError, TransferError, TransferErrorKind};

/// Error returned across crate boundaries
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded after {seconds}s")]
    DeadlineExceeded { seconds: u64 },

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// The transfer error carried by this error, if any
    #[must_use]
    pub fn as_transfer(&self) -> Option<&TransferError> {
        match self {
            Self::Transfer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

/// How an error is presented to a person at the CLI or in a failure event
pub trait UserFacingError {
    fn user_message(&self) -> Cow<'_, str>;

    /// What the user can do about it, if anything
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// True when repeating the same call may succeed
    fn is_retryable(&self) -> bool {
        false
    }

    /// Dotted code such as `transfer.not_found`, stable across releases
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Resolution(err) => err.user_message(),
            Error::Auth(err) => err.user_message(),
            Error::Transfer(err) => err.user_message(),
            Error::Network(err) => err.user_message(),
            Error::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Resolution(err) => err.user_hint(),
            Error::Auth(err) => err.user_hint(),
            Error::Transfer(err) => err.user_hint(),
            Error::Network(err) => err.user_hint(),
            Error::Storage(err) => err.user_hint(),
            Error::Config(_) => Some("Check your hubcas configuration file."),
            Error::DeadlineExceeded { .. } => {
                Some("Raise transfer.request_timeout_secs or download fewer files per request.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Error::Resolution(err) => err.is_retryable(),
            Error::Auth(err) => err.is_retryable(),
            Error::Transfer(err) => err.is_retryable(),
            Error::Network(err) => err.is_retryable(),
            Error::Storage(err) => err.is_retryable(),
            Error::Io { .. } | Error::DeadlineExceeded { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Resolution(err) => err.user_code(),
            Error::Auth(err) => err.user_code(),
            Error::Transfer(err) => err.user_code(),
            Error::Network(err) => err.user_code(),
            Error::Storage(err) => err.user_code(),
            Error::Config(err) => err.user_code(),
            Error::Internal(_) => Some("error.internal"),
            Error::Cancelled => Some("error.cancelled"),
            Error::DeadlineExceeded { .. } => Some("error.deadline_exceeded"),
            Error::Io { .. } => Some("error.io"),
        }
    }
}
