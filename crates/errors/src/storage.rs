//! Destination filesystem errors

use std::borrow::Cow;
use std::io;
use std::path::Path;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("no space left writing {path}")]
    DiskFull { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("path not found: {path}")]
    PathNotFound { path: String },

    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Staged bytes failed the size or digest check, or a hash string did not parse
    #[error("corrupted data: {message}")]
    CorruptedData { message: String },

    #[error("could not move staged file into place: {message}")]
    AtomicRenameFailed { message: String },
}

impl StorageError {
    /// Classify an `io::Error` raised while touching `path`
    #[must_use]
    pub fn from_io_with_path(err: &io::Error, path: &Path) -> Self {
        let path_str = || path.display().to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path: path_str() },
            io::ErrorKind::NotFound => Self::PathNotFound { path: path_str() },
            io::ErrorKind::StorageFull => Self::DiskFull { path: path_str() },
            _ => Self::IoError {
                message: format!("{}: {err}", path.display()),
            },
        }
    }

    /// Whether this is a content mismatch rather than a filesystem fault
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::CorruptedData { .. })
    }
}

impl UserFacingError for StorageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::DiskFull { .. } => Some("Free space in the destination directory and retry."),
            Self::PermissionDenied { .. } => {
                Some("Make the destination directory writable for this user.")
            }
            Self::CorruptedData { .. } => {
                Some("The downloaded bytes did not match their hash; report the repository file.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::IoError { .. } | Self::AtomicRenameFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::DiskFull { .. } => "storage.disk_full",
            Self::PermissionDenied { .. } => "storage.permission_denied",
            Self::PathNotFound { .. } => "storage.path_not_found",
            Self::IoError { .. } => "storage.io_error",
            Self::CorruptedData { .. } => "storage.corrupted_data",
            Self::AtomicRenameFailed { .. } => "storage.atomic_rename_failed",
        })
    }
}
