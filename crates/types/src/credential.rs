//! Scoped, time-limited CAS credentials

use chrono::{DateTime, Utc};
use hubcas_errors::AuthError;
use serde::{Deserialize, Serialize};

/// Transfer direction a credential is valid for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upload,
    Download,
}

impl Direction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Download => "download",
        }
    }

    /// Path segment used by the Hub token endpoint
    #[must_use]
    pub fn token_kind(self) -> &'static str {
        match self {
            Self::Upload => "write",
            Self::Download => "read",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialScope {
    pub repo: String,
    pub revision: String,
    pub direction: Direction,
}

/// Short-lived bearer token for the CAS endpoint.
///
/// Never refreshed in place: an expired credential is a hard failure and the
/// caller must request a new one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
    pub token: String,
    /// Base URL of the CAS service this token is valid for
    pub endpoint: String,
    pub scope: CredentialScope,
    pub expiry: DateTime<Utc>,
}

impl AccessCredential {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }

    /// Check the credential may be used for `direction` right now.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::WrongDirection` for a credential of the other
    /// direction and `AuthError::Expired` once the expiry has passed.
    pub fn authorize_for(&self, direction: Direction) -> Result<(), AuthError> {
        if self.scope.direction != direction {
            return Err(AuthError::WrongDirection {
                granted: self.scope.direction.to_string(),
                required: direction.to_string(),
            });
        }
        if self.is_expired() {
            return Err(AuthError::Expired {
                expiry: self.expiry.to_rfc3339(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("scope", &self.scope)
            .field("expiry", &self.expiry)
            .finish()
    }
}
