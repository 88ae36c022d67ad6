//! Reference resolution

use hubcas_errors::{Error, ResolutionError};
use hubcas_events::{EventEmitter, EventSender, HubEvent};
use hubcas_net::NetClient;
use hubcas_types::{ContentDescriptor, RepoId};
use reqwest::StatusCode;
use tracing::debug;

use crate::metadata::FileMetadata;
use crate::pointer::{parse_pointer, should_try_pointer, MAX_POINTER_SIZE};
use crate::encode_path;

/// Outcome of resolving one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// `None` when the file exists but is not stored in CAS
    pub descriptor: Option<ContentDescriptor>,
    /// Token endpoint the Hub advertised for reading this file
    pub refresh_route: Option<String>,
    /// Commit the revision pointed at
    pub commit: Option<String>,
}

/// Resolves `(repo, path, revision)` to a [`ContentDescriptor`]
#[derive(Clone)]
pub struct ReferenceResolver {
    client: NetClient,
    endpoint: String,
    tx: Option<EventSender>,
}

impl EventEmitter for ReferenceResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl ReferenceResolver {
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

    fn resolve_url(&self, repo: &RepoId, path: &str, revision: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            repo.url_path(),
            hubcas_net::encode_segment(revision),
            encode_path(path)
        )
    }

    /// `/api/{type}s/...` form of the resolve route, tried when the short one 404s
    fn api_resolve_url(&self, repo: &RepoId, path: &str, revision: &str) -> String {
        format!(
            "{}/api/{}/{}/resolve/{}/{}",
            self.endpoint,
            repo.repo_type.plural(),
            repo.name,
            hubcas_net::encode_segment(revision),
            encode_path(path)
        )
    }

    fn raw_url(&self, repo: &RepoId, path: &str, revision: &str) -> String {
        format!(
            "{}/{}/raw/{}/{}",
            self.endpoint,
            repo.url_path(),
            hubcas_net::encode_segment(revision),
            encode_path(path)
        )
    }

    /// Read the resolve headers of a file without following the redirect
    ///
    /// The short resolve route is tried first, then the `/api` one. Each
    /// is read with HEAD, or with a one-byte ranged GET when HEAD fails
    /// below HTTP or the server refuses the method.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` when the request fails, the Hub answers
    /// with an error status, or the headers are malformed.
    pub async fn fetch_metadata(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
        identity: Option<&str>,
    ) -> Result<FileMetadata, Error> {
        let candidates = [
            self.resolve_url(repo, path, revision),
            self.api_resolve_url(repo, path, revision),
        ];
        let mut last_error = None;

        for url in &candidates {
            debug!(%url, "reading resolve headers");
            let response = match self.read_headers(url, identity).await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(request_failed(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() || status.is_redirection() {
                return Ok(FileMetadata::from_headers(response.headers(), &self.endpoint)?);
            }
            let err = status_error(status, repo, path, revision, url);
            if status != StatusCode::NOT_FOUND {
                return Err(err.into());
            }
            last_error = Some(err.into());
        }

        Err(last_error.unwrap_or_else(|| {
            ResolutionError::RequestFailed {
                message: "no resolve route answered".to_string(),
            }
            .into()
        }))
    }

    async fn read_headers(
        &self,
        url: &str,
        identity: Option<&str>,
    ) -> Result<reqwest::Response, Error> {
        match self.client.head_no_redirect(url, identity).await {
            Ok(response)
                if !matches!(
                    response.status(),
                    StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
                ) =>
            {
                return Ok(response);
            }
            Ok(response) => {
                debug!(url, status = %response.status(), "HEAD refused, using ranged GET");
            }
            Err(e) => debug!(url, error = %e, "HEAD failed, using ranged GET"),
        }
        self.client
            .get_range_no_redirect(url, identity, "bytes=0-0")
            .await
    }

    /// Resolve a reference.
    ///
    /// `Ok(None)` means the path exists but is not stored in CAS.
    ///
    /// # Errors
    ///
    /// Network failures, error statuses and malformed metadata are returned
    /// as `ResolutionError`; nothing is defaulted.
    pub async fn resolve(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
        identity: Option<&str>,
    ) -> Result<Option<ContentDescriptor>, Error> {
        Ok(self
            .resolve_file(repo, path, revision, identity)
            .await?
            .descriptor)
    }

    /// [`Self::resolve`], keeping what the Hub said alongside the descriptor
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_file(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
        identity: Option<&str>,
    ) -> Result<Resolution, Error> {
        if path.trim().is_empty() {
            return Err(ResolutionError::InvalidReference {
                message: "file path is empty".to_string(),
            }
            .into());
        }

        self.emit_hub(HubEvent::ResolveStarted {
            repo: repo.to_string(),
            path: path.to_string(),
            revision: revision.to_string(),
        });

        let metadata = self.fetch_metadata(repo, path, revision, identity).await?;

        let descriptor = match (&metadata.hash, metadata.size) {
            (Some(hash), Some(size)) => Some(ContentDescriptor::new(hash.clone(), size)),
            (_, size) => {
                self.resolve_pointer(repo, path, revision, identity, size)
                    .await?
            }
        };

        match &descriptor {
            Some(d) => self.emit_hub(HubEvent::Resolved {
                repo: repo.to_string(),
                path: path.to_string(),
                hash: d.hash.clone(),
                size: d.size,
                commit: metadata.commit.clone(),
                etag: metadata.etag.clone(),
            }),
            None => self.emit_hub(HubEvent::NotCasBacked {
                repo: repo.to_string(),
                path: path.to_string(),
            }),
        }

        Ok(Resolution {
            descriptor,
            refresh_route: metadata.refresh_route,
            commit: metadata.commit,
        })
    }

    /// Fallback for repositories that store pointer files instead of headers
    async fn resolve_pointer(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
        identity: Option<&str>,
        advertised_size: Option<u64>,
    ) -> Result<Option<ContentDescriptor>, Error> {
        if !should_try_pointer(path) || advertised_size.is_some_and(|s| s > MAX_POINTER_SIZE) {
            return Ok(None);
        }

        let url = self.raw_url(repo, path, revision);
        debug!(%url, "checking for pointer file");

        let response = self
            .client
            .get(&url, identity)
            .await
            .map_err(request_failed)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, repo, path, revision, &url).into());
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_POINTER_SIZE)
        {
            return Ok(None);
        }

        let body = response.bytes().await.map_err(|e| ResolutionError::RequestFailed {
            message: e.to_string(),
        })?;
        if body.len() as u64 > MAX_POINTER_SIZE {
            return Ok(None);
        }

        Ok(std::str::from_utf8(&body).ok().and_then(parse_pointer))
    }
}

fn request_failed(err: Error) -> Error {
    ResolutionError::RequestFailed {
        message: err.to_string(),
    }
    .into()
}

fn status_error(
    status: StatusCode,
    repo: &RepoId,
    path: &str,
    revision: &str,
    url: &str,
) -> ResolutionError {
    match status {
        StatusCode::NOT_FOUND => ResolutionError::NotFound {
            repo: repo.to_string(),
            path: path.to_string(),
            revision: revision.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ResolutionError::Unauthorized {
            repo: repo.to_string(),
            status: status.as_u16(),
        },
        _ => ResolutionError::HttpError {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}
