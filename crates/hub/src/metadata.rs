//! Pointer metadata carried by resolve response headers

use hubcas_errors::ResolutionError;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_RANGE, ETAG, LINK};

/// Public Hub host; refresh routes pointing here are moved onto a custom endpoint
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";

const HEADER_X_REPO_COMMIT: &str = "x-repo-commit";
const HEADER_X_XET_HASH: &str = "x-xet-hash";
const HEADER_X_XET_REFRESH_ROUTE: &str = "x-xet-refresh-route";
const HEADER_X_LINKED_SIZE: &str = "x-linked-size";
const HEADER_X_LINKED_ETAG: &str = "x-linked-etag";

/// What a resolve request revealed about one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    /// CAS hash, present only for CAS-backed files
    pub hash: Option<String>,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub commit: Option<String>,
    /// Token endpoint advertised for this file
    pub refresh_route: Option<String>,
}

impl FileMetadata {
    /// Read metadata from response headers.
    ///
    /// # Errors
    ///
    /// A CAS hash without any usable size header is malformed metadata.
    pub fn from_headers(headers: &HeaderMap, endpoint: &str) -> Result<Self, ResolutionError> {
        let hash = header_to_string(headers, HEADER_X_XET_HASH).filter(|h| !h.is_empty());
        let size = parse_file_size(headers);

        if hash.is_some() && size.is_none() {
            return Err(ResolutionError::MalformedMetadata {
                message: "CAS hash present but no size header".to_string(),
            });
        }

        let refresh_route = extract_refresh_route(headers, endpoint).or_else(|| {
            header_to_string(headers, HEADER_X_XET_REFRESH_ROUTE)
                .map(|route| rewrite_refresh_route(&route, endpoint))
        });

        Ok(Self {
            hash,
            size,
            etag: header_to_string(headers, HEADER_X_LINKED_ETAG)
                .or_else(|| header_to_string(headers, ETAG.as_str())),
            commit: header_to_string(headers, HEADER_X_REPO_COMMIT),
            refresh_route,
        })
    }
}

/// `<url>; rel="xet-auth"` entry of a `Link` header
fn extract_refresh_route(headers: &HeaderMap, endpoint: &str) -> Option<String> {
    let link_value = headers.get(LINK)?.to_str().ok()?;
    link_value
        .split(',')
        .filter(|fragment| fragment.to_ascii_lowercase().contains("rel=\"xet-auth\""))
        .find_map(|fragment| {
            let start = fragment.find('<')? + 1;
            let len = fragment[start..].find('>')?;
            Some(rewrite_refresh_route(
                fragment[start..start + len].trim(),
                endpoint,
            ))
        })
}

pub(crate) fn rewrite_refresh_route(route: &str, endpoint: &str) -> String {
    match route.strip_prefix(DEFAULT_HUB_ENDPOINT) {
        Some(suffix) if !endpoint.is_empty() => {
            format!("{}{suffix}", endpoint.trim_end_matches('/'))
        }
        _ => route.to_string(),
    }
}

pub(crate) fn header_to_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_matches('"').trim().to_string())
}

/// `X-Linked-Size`, then the total of `Content-Range`, then `Content-Length`
fn parse_file_size(headers: &HeaderMap) -> Option<u64> {
    header_to_string(headers, HEADER_X_LINKED_SIZE)
        .and_then(|v| v.parse().ok())
        .or_else(|| {
            header_to_string(headers, CONTENT_RANGE.as_str())
                .and_then(|v| v.rsplit('/').next()?.parse().ok())
        })
        .or_else(|| header_to_string(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()))
}
