//! Errors raised while talking to the hosting platform: reference
//! resolution and credential issuance.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// Failure to turn a (repo, path, revision) reference into a descriptor.
///
/// "Not CAS-backed" is not represented here; resolution reports it as an
/// absent result instead.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ResolutionError {
    #[error("invalid reference: {message}")]
    InvalidReference { message: String },

    #[error("not found: {repo}/{path}@{revision}")]
    NotFound {
        repo: String,
        path: String,
        revision: String,
    },

    #[error("access denied to {repo} (HTTP {status})")]
    Unauthorized { repo: String, status: u16 },

    #[error("HTTP error {status} resolving {url}")]
    HttpError { status: u16, url: String },

    #[error("malformed pointer metadata: {message}")]
    MalformedMetadata { message: String },

    #[error("request failed: {message}")]
    RequestFailed { message: String },
}

impl UserFacingError for ResolutionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidReference { .. } => {
                Some("Use `owner/name` or `{models|datasets|spaces}/owner/name` with a non-empty path.")
            }
            Self::NotFound { .. } => Some("Check the repository, file path and revision."),
            Self::Unauthorized { .. } => Some("Pass a token with read access to the repository."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed { .. } => true,
            Self::HttpError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidReference { .. } => "resolution.invalid_reference",
            Self::NotFound { .. } => "resolution.not_found",
            Self::Unauthorized { .. } => "resolution.unauthorized",
            Self::HttpError { .. } => "resolution.http_error",
            Self::MalformedMetadata { .. } => "resolution.malformed_metadata",
            Self::RequestFailed { .. } => "resolution.request_failed",
        };
        Some(code)
    }
}

/// Credential denied, expired, out of scope, or otherwise unusable.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("identity required for {repo}")]
    IdentityRequired { repo: String },

    #[error("credential request denied for {repo} (HTTP {status})")]
    Denied { repo: String, status: u16 },

    #[error("scope rejected: {repo}@{revision}")]
    ScopeRejected { repo: String, revision: String },

    #[error("credential expired at {expiry}")]
    Expired { expiry: String },

    #[error("credential scoped for {granted}, operation requires {required}")]
    WrongDirection { granted: String, required: String },

    #[error("CAS rejected credential (HTTP {status})")]
    Rejected { status: u16 },

    #[error("malformed credential response: {message}")]
    MalformedResponse { message: String },

    #[error("credential request failed: {message}")]
    RequestFailed { message: String },
}

impl UserFacingError for AuthError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::IdentityRequired { .. } | Self::Denied { .. } => {
                Some("Provide a valid access token (--token or HF_TOKEN).")
            }
            Self::Expired { .. } => Some("Request a new credential and restart the transfer."),
            Self::WrongDirection { .. } => {
                Some("Request a credential for the direction of the operation.")
            }
            Self::ScopeRejected { .. } => Some("Check the repository and revision."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::IdentityRequired { .. } => "auth.identity_required",
            Self::Denied { .. } => "auth.denied",
            Self::ScopeRejected { .. } => "auth.scope_rejected",
            Self::Expired { .. } => "auth.expired",
            Self::WrongDirection { .. } => "auth.wrong_direction",
            Self::Rejected { .. } => "auth.rejected",
            Self::MalformedResponse { .. } => "auth.malformed_response",
            Self::RequestFailed { .. } => "auth.request_failed",
        };
        Some(code)
    }
}
