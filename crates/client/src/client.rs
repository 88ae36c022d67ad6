//! Client facade

use hubcas_config::Config;
use hubcas_errors::Error;
use hubcas_events::EventSender;
use hubcas_hub::{CasAuthProvider, ReferenceResolver, Resolution};
use hubcas_net::{ChunkSource, HttpChunkFetcher, NetClient, NetConfig};
use hubcas_transfer::{TransferOptions, TransferOrchestrator, WorkerPool};
use hubcas_types::{
    AccessCredential, ContentDescriptor, Direction, PartialTransferResult, RepoId,
    TransferRequest, TransferResult, DEFAULT_REVISION,
};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Entry point for resolving, authorizing and downloading CAS-backed files.
///
/// The optional identity token is fixed at construction and attached to
/// every Hub call unless a call overrides it. Nothing is cached: each
/// `resolve` and `authorize` goes to the network.
#[derive(Clone)]
pub struct CasClient {
    config: Config,
    identity: Option<String>,
    resolver: ReferenceResolver,
    auth: CasAuthProvider,
    source: Arc<dyn ChunkSource>,
    pool: Option<WorkerPool>,
    tx: Option<EventSender>,
}

impl fmt::Debug for CasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CasClient")
            .field("endpoint", &self.config.hub.endpoint)
            .field("identity", &self.identity.as_ref().map(|_| "<redacted>"))
            .field("shared_pool", &self.pool.as_ref().map(WorkerPool::capacity))
            .finish_non_exhaustive()
    }
}

impl CasClient {
    /// Client with default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(identity: Option<String>) -> Result<Self, Error> {
        Self::with_config(Config::default(), identity)
    }

    /// Client with explicit configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn with_config(config: Config, identity: Option<String>) -> Result<Self, Error> {
        config.validate()?;

        let net = NetClient::new(NetConfig::from_config(&config))?;
        let endpoint = config.hub.endpoint.clone();
        let pool = config
            .transfer
            .share_pool
            .then(|| WorkerPool::new(config.transfer.max_concurrent_fetches));

        debug!(
            endpoint = %endpoint,
            chunk_size = config.transfer.chunk_size,
            shared_pool = pool.is_some(),
            "CAS client configured"
        );

        Ok(Self {
            resolver: ReferenceResolver::new(net.clone(), endpoint.clone()),
            auth: CasAuthProvider::new(net.clone(), endpoint),
            source: Arc::new(HttpChunkFetcher::new(net)),
            identity: identity.filter(|token| !token.trim().is_empty()),
            config,
            pool,
            tx: None,
        })
    }

    /// Send resolution, credential and transfer events to `tx`
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.resolver = self.resolver.with_events(tx.clone());
        self.auth = self.auth.with_events(tx.clone());
        self.tx = Some(tx);
        self
    }

    /// Read chunks from `source` instead of the CAS HTTP endpoint
    #[must_use]
    pub fn with_chunk_source(mut self, source: Arc<dyn ChunkSource>) -> Self {
        self.source = source;
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Pool shared by every download of this client, when configured
    #[must_use]
    pub fn shared_pool(&self) -> Option<&WorkerPool> {
        self.pool.as_ref()
    }

    /// Resolve a repository file to its content descriptor.
    ///
    /// `Ok(None)` means the file exists but is not stored in CAS.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError` for malformed references, missing files,
    /// denied access and network or parse failures.
    pub async fn resolve(
        &self,
        repo: &str,
        path: &str,
        revision: Option<&str>,
    ) -> Result<Option<ContentDescriptor>, Error> {
        self.resolve_as(repo, path, revision, self.identity()).await
    }

    /// [`Self::resolve`] with an explicit identity instead of the client's
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_as(
        &self,
        repo: &str,
        path: &str,
        revision: Option<&str>,
        identity: Option<&str>,
    ) -> Result<Option<ContentDescriptor>, Error> {
        let repo = RepoId::parse(repo)?;
        self.resolver
            .resolve(&repo, path, revision_or_default(revision), identity)
            .await
    }

    /// Resolve a file, keeping the commit and token route the Hub reported
    ///
    /// # Errors
    ///
    /// See [`Self::resolve`].
    pub async fn resolve_file(
        &self,
        repo: &str,
        path: &str,
        revision: Option<&str>,
    ) -> Result<Resolution, Error> {
        let repo = RepoId::parse(repo)?;
        self.resolver
            .resolve_file(&repo, path, revision_or_default(revision), self.identity())
            .await
    }

    /// Download credential for a resolved file
    ///
    /// Uses the token route advertised during resolution when present,
    /// the standard read-token route otherwise.
    ///
    /// # Errors
    ///
    /// See [`Self::authorize`].
    pub async fn authorize_resolved(
        &self,
        repo: &str,
        revision: Option<&str>,
        resolution: &Resolution,
    ) -> Result<AccessCredential, Error> {
        let repo = RepoId::parse(repo)?;
        self.auth
            .authorize_download(
                &repo,
                revision_or_default(revision),
                resolution.refresh_route.as_deref(),
                self.identity(),
            )
            .await
    }

    /// Obtain a fresh scoped credential
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when identity is required but missing or
    /// invalid, or the scope is rejected.
    pub async fn authorize(
        &self,
        repo: &str,
        revision: Option<&str>,
        direction: Direction,
    ) -> Result<AccessCredential, Error> {
        self.authorize_as(repo, revision, direction, self.identity())
            .await
    }

    /// [`Self::authorize`] with an explicit identity instead of the client's
    ///
    /// # Errors
    ///
    /// See [`Self::authorize`].
    pub async fn authorize_as(
        &self,
        repo: &str,
        revision: Option<&str>,
        direction: Direction,
        identity: Option<&str>,
    ) -> Result<AccessCredential, Error> {
        let repo = RepoId::parse(repo)?;
        self.auth
            .authorize(&repo, revision_or_default(revision), direction, identity)
            .await
    }

    /// Download every descriptor of the request or none
    ///
    /// # Errors
    ///
    /// Returns the first descriptor failure as `Error::Transfer`, or
    /// `Error::DeadlineExceeded`.
    pub async fn download(&self, request: TransferRequest) -> Result<TransferResult, Error> {
        self.orchestrator().download(request).await
    }

    /// Download, stopping with `Error::Cancelled` when `cancel` fires
    ///
    /// # Errors
    ///
    /// See [`Self::download`].
    pub async fn download_with_cancel(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<TransferResult, Error> {
        self.orchestrator()
            .download_with_cancel(request, cancel)
            .await
    }

    /// Download with an independent outcome per descriptor
    ///
    /// # Errors
    ///
    /// Returns `Error::DeadlineExceeded` when the request deadline passes.
    pub async fn download_partial(
        &self,
        request: TransferRequest,
    ) -> Result<PartialTransferResult, Error> {
        self.orchestrator().download_partial(request).await
    }

    /// [`Self::download_partial`] that stops when `cancel` fires
    ///
    /// # Errors
    ///
    /// See [`Self::download_partial`].
    pub async fn download_partial_with_cancel(
        &self,
        request: TransferRequest,
        cancel: CancellationToken,
    ) -> Result<PartialTransferResult, Error> {
        self.orchestrator()
            .download_partial_with_cancel(request, cancel)
            .await
    }

    fn orchestrator(&self) -> TransferOrchestrator {
        let mut orchestrator = TransferOrchestrator::new(
            Arc::clone(&self.source),
            TransferOptions::from_config(&self.config),
        );
        if let Some(pool) = &self.pool {
            orchestrator = orchestrator.with_pool(pool.clone());
        }
        if let Some(tx) = &self.tx {
            orchestrator = orchestrator.with_events(tx.clone());
        }
        orchestrator
    }
}

fn revision_or_default(revision: Option<&str>) -> &str {
    revision
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REVISION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_identity_is_dropped() {
        let client = CasClient::new(Some("  ".into())).unwrap();
        assert!(client.identity().is_none());
        let client = CasClient::new(Some("hf_abc".into())).unwrap();
        assert_eq!(client.identity(), Some("hf_abc"));
    }

    #[test]
    fn debug_redacts_identity() {
        let client = CasClient::new(Some("hf_secret".into())).unwrap();
        assert!(!format!("{client:?}").contains("hf_secret"));
    }

    #[test]
    fn shared_pool_follows_config() {
        let mut config = Config::default();
        assert!(CasClient::with_config(config.clone(), None)
            .unwrap()
            .shared_pool()
            .is_none());

        config.transfer.share_pool = true;
        config.transfer.max_concurrent_fetches = 3;
        let client = CasClient::with_config(config, None).unwrap();
        assert_eq!(client.shared_pool().map(WorkerPool::capacity), Some(3));
    }

    #[test]
    fn revision_defaults_to_main() {
        assert_eq!(revision_or_default(None), "main");
        assert_eq!(revision_or_default(Some(" ")), "main");
        assert_eq!(revision_or_default(Some("v1.0")), "v1.0");
    }
}
