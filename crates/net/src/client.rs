//! Pooled HTTP client shared by Hub and CAS requests

use hubcas_config::Config;
use hubcas_errors::{Error, NetworkError};
use reqwest::{header, redirect, Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::debug;

use crate::RetryPolicy;

/// Network client configuration
#[derive(Debug, Clone)]
pub struct NetConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    pub user_agent: String,
    /// Retries of Hub requests that failed below HTTP (connect, timeout, reset)
    pub retry: RetryPolicy,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl NetConfig {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let network = &config.network;
        Self {
            timeout: Duration::from_secs(network.timeout_secs),
            connect_timeout: Duration::from_secs(network.connect_timeout_secs),
            pool_idle_timeout: Duration::from_secs(network.pool_idle_timeout_secs),
            pool_max_idle_per_host: network.pool_max_idle_per_host,
            user_agent: network.user_agent.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }
}

/// HTTP client wrapper with retry logic
///
/// Holds two pooled clients: one following redirects (token, raw file and
/// CAS requests) and one that does not, for reading resolve headers before
/// the Hub redirects to a storage backend.
#[derive(Clone)]
pub struct NetClient {
    client: Client,
    no_redirect: Client,
    config: NetConfig,
}

impl NetClient {
    /// Create a new network client
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: NetConfig) -> Result<Self, Error> {
        let client = Self::builder(&config)
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;
        let no_redirect = Self::builder(&config)
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| NetworkError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            no_redirect,
            config,
        })
    }

    fn builder(config: &NetConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
    }

    /// GET with optional bearer token, retried on transport failures
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails below HTTP after all
    /// attempts. HTTP error statuses are returned as responses.
    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<Response, Error> {
        self.retry_request(url, || with_bearer(self.client.get(url), bearer))
            .await
    }

    /// HEAD without following redirects, retried on transport failures
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails below HTTP after all attempts.
    pub async fn head_no_redirect(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<Response, Error> {
        self.retry_request(url, || with_bearer(self.no_redirect.head(url), bearer))
            .await
    }

    /// Ranged GET without following redirects, retried on transport failures
    ///
    /// Used to read resolve headers where a server refuses HEAD.
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails below HTTP after all attempts.
    pub async fn get_range_no_redirect(
        &self,
        url: &str,
        bearer: Option<&str>,
        range: &str,
    ) -> Result<Response, Error> {
        self.retry_request(url, || {
            with_bearer(self.no_redirect.get(url), bearer).header(header::RANGE, range)
        })
        .await
    }

    /// Single ranged GET with a bearer token
    ///
    /// Not retried here; chunk retries are scheduled by the caller.
    ///
    /// # Errors
    ///
    /// Returns the raw reqwest error so the caller can classify it.
    pub async fn get_range(
        &self,
        url: &str,
        bearer: &str,
        range: &str,
    ) -> Result<Response, reqwest::Error> {
        self.client
            .get(url)
            .bearer_auth(bearer)
            .header(header::RANGE, range)
            .send()
            .await
    }

    /// Execute a request with retries
    async fn retry_request<F>(&self, url: &str, build: F) -> Result<Response, Error>
    where
        F: Fn() -> RequestBuilder,
    {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            match build().send().await {
                Ok(response) => return Ok(response),
                Err(e) if Self::should_retry(&e) && policy.allows_retry_after(attempt) => {
                    let delay = policy.delay_for(attempt);
                    debug!(url, attempt, ?delay, error = %e, "retrying request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(Self::convert_error(url, &e)),
            }
        }
    }

    fn convert_error(url: &str, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            NetworkError::Timeout {
                url: url.to_string(),
            }
            .into()
        } else if e.is_connect() {
            NetworkError::ConnectionRefused(e.to_string()).into()
        } else if e.is_builder() {
            NetworkError::InvalidUrl(e.to_string()).into()
        } else {
            NetworkError::RequestFailed(e.to_string()).into()
        }
    }

    /// Determine if an error should be retried
    fn should_retry(error: &reqwest::Error) -> bool {
        error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
    }
}

fn with_bearer(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}
