#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Network operations for hubcas
//!
//! This crate owns the HTTP client shared by Hub and CAS requests, the
//! backoff policy, and the chunk fetcher that reads one byte range of a
//! content hash from the CAS endpoint.

mod client;
mod fetcher;
mod retry;

pub use client::{NetClient, NetConfig};
pub use fetcher::{cas_file_url, ChunkSource, HttpChunkFetcher};
pub use retry::RetryPolicy;

use hubcas_errors::{Error, NetworkError};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters escaped in a single path segment; RFC 3986 unreserved ones pass through
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode one URL path segment
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Parse and validate an http(s) URL
///
/// # Errors
///
/// Returns an error if the URL string is malformed or uses another scheme.
pub fn parse_url(url: &str) -> Result<Url, Error> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(NetworkError::UnsupportedProtocol {
            protocol: other.to_string(),
        }
        .into()),
    }
}
