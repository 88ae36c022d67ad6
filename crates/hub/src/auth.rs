//! CAS credential issuance

use chrono::{DateTime, Utc};
use hubcas_errors::{AuthError, Error};
use hubcas_events::{EventEmitter, EventSender, HubEvent};
use hubcas_net::NetClient;
use hubcas_types::{AccessCredential, CredentialScope, Direction, RepoId};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::metadata::header_to_string;

const HEADER_X_XET_CAS_URL: &str = "x-xet-cas-url";
const HEADER_X_XET_ACCESS_TOKEN: &str = "x-xet-access-token";
const HEADER_X_XET_EXPIRATION: &str = "x-xet-token-expiration";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    /// Unix seconds
    exp: i64,
    cas_url: String,
}

/// Exchanges `(repo, revision, direction, identity?)` for an [`AccessCredential`].
///
/// Every call hits the token endpoint; nothing is cached or refreshed.
#[derive(Clone)]
pub struct CasAuthProvider {
    client: NetClient,
    endpoint: String,
    tx: Option<EventSender>,
}

impl EventEmitter for CasAuthProvider {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl CasAuthProvider {
    pub fn new(client: NetClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tx: None,
        }
    }

    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Token endpoint for a scope
    #[must_use]
    pub fn token_url(&self, repo: &RepoId, revision: &str, direction: Direction) -> String {
        format!(
            "{}/api/{}/{}/xet-{}-token/{}",
            self.endpoint,
            repo.repo_type.plural(),
            repo.name,
            direction.token_kind(),
            hubcas_net::encode_segment(revision)
        )
    }

    /// Obtain a fresh credential for the scope
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when identity is required and missing or invalid,
    /// the scope is rejected, the response is malformed, or the issued
    /// credential has already expired.
    pub async fn authorize(
        &self,
        repo: &RepoId,
        revision: &str,
        direction: Direction,
        identity: Option<&str>,
    ) -> Result<AccessCredential, Error> {
        let url = self.token_url(repo, revision, direction);
        let scope = CredentialScope {
            repo: repo.to_string(),
            revision: revision.to_string(),
            direction,
        };
        self.authorize_via(&url, scope, identity).await
    }

    /// Download credential, requested from the token route the Hub
    /// advertised for a file when there is one
    ///
    /// # Errors
    ///
    /// Same as [`CasAuthProvider::authorize`].
    pub async fn authorize_download(
        &self,
        repo: &RepoId,
        revision: &str,
        route: Option<&str>,
        identity: Option<&str>,
    ) -> Result<AccessCredential, Error> {
        let Some(route) = route else {
            return self
                .authorize(repo, revision, Direction::Download, identity)
                .await;
        };
        let scope = CredentialScope {
            repo: repo.to_string(),
            revision: revision.to_string(),
            direction: Direction::Download,
        };
        self.authorize_via(route, scope, identity).await
    }

    /// Obtain a credential from an explicit token route, such as the one a
    /// resolve response advertised
    ///
    /// # Errors
    ///
    /// Same as [`CasAuthProvider::authorize`].
    pub async fn authorize_via(
        &self,
        url: &str,
        scope: CredentialScope,
        identity: Option<&str>,
    ) -> Result<AccessCredential, Error> {
        debug!(%url, direction = %scope.direction, "requesting CAS credential");

        let response = self
            .client
            .get(url, identity)
            .await
            .map_err(|e| AuthError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, &scope, identity.is_some()).into());
        }

        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| AuthError::RequestFailed {
            message: e.to_string(),
        })?;

        let token = match serde_json::from_str::<TokenResponse>(&body) {
            Ok(parsed) => parsed,
            Err(json_err) => TokenResponse {
                access_token: header_to_string(&headers, HEADER_X_XET_ACCESS_TOKEN)
                    .ok_or_else(|| malformed(&json_err))?,
                exp: header_to_string(&headers, HEADER_X_XET_EXPIRATION)
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(|| malformed(&json_err))?,
                cas_url: header_to_string(&headers, HEADER_X_XET_CAS_URL)
                    .ok_or_else(|| malformed(&json_err))?,
            },
        };

        let expiry = DateTime::<Utc>::from_timestamp(token.exp, 0).ok_or_else(|| {
            AuthError::MalformedResponse {
                message: format!("expiry out of range: {}", token.exp),
            }
        })?;
        if expiry <= Utc::now() {
            return Err(AuthError::Expired {
                expiry: expiry.to_rfc3339(),
            }
            .into());
        }

        // Chunk reads go wherever the credential points
        hubcas_net::parse_url(&token.cas_url).map_err(|e| AuthError::MalformedResponse {
            message: format!("casUrl {:?}: {e}", token.cas_url),
        })?;

        let credential = AccessCredential {
            token: token.access_token,
            endpoint: token.cas_url.trim_end_matches('/').to_string(),
            scope,
            expiry,
        };

        self.emit_hub(HubEvent::CredentialIssued {
            repo: credential.scope.repo.clone(),
            revision: credential.scope.revision.clone(),
            direction: credential.scope.direction.to_string(),
            expiry: credential.expiry.to_rfc3339(),
        });

        Ok(credential)
    }
}

fn malformed(err: &serde_json::Error) -> AuthError {
    AuthError::MalformedResponse {
        message: err.to_string(),
    }
}

fn status_error(status: StatusCode, scope: &CredentialScope, has_identity: bool) -> AuthError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if !has_identity => {
            AuthError::IdentityRequired {
                repo: scope.repo.clone(),
            }
        }
        StatusCode::NOT_FOUND => AuthError::ScopeRejected {
            repo: scope.repo.clone(),
            revision: scope.revision.clone(),
        },
        s if s.is_server_error() => AuthError::RequestFailed {
            message: format!("token endpoint returned {s}"),
        },
        s => AuthError::Denied {
            repo: scope.repo.clone(),
            status: s.as_u16(),
        },
    }
}
