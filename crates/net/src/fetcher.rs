//! Range reads against the CAS endpoint

use async_trait::async_trait;
use bytes::Bytes;
use hubcas_errors::{AuthError, ChunkError};
use hubcas_types::{AccessCredential, ChunkHandle, Direction};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::NetClient;

/// Source of chunk bytes.
///
/// Implementations return exactly `chunk.length` bytes starting at
/// `chunk.offset` of the chunk's content hash, or a classified failure.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn fetch(
        &self,
        chunk: &ChunkHandle,
        credential: &AccessCredential,
    ) -> Result<Bytes, ChunkError>;
}

/// URL of a content hash on a CAS service
#[must_use]
pub fn cas_file_url(endpoint: &str, hash: &str) -> String {
    format!(
        "{}/v1/files/{}",
        endpoint.trim_end_matches('/'),
        crate::encode_segment(hash)
    )
}

/// `ChunkSource` over HTTP range requests
#[derive(Clone)]
pub struct HttpChunkFetcher {
    client: NetClient,
}

/// Structured error body returned by the CAS service
#[derive(Debug, Deserialize)]
struct CasErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl HttpChunkFetcher {
    #[must_use]
    pub fn new(client: NetClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChunkSource for HttpChunkFetcher {
    async fn fetch(
        &self,
        chunk: &ChunkHandle,
        credential: &AccessCredential,
    ) -> Result<Bytes, ChunkError> {
        // Checked before any byte leaves the process
        credential.authorize_for(Direction::Download)?;

        let url = cas_file_url(&credential.endpoint, &chunk.descriptor.hash);
        let range = chunk.range_header();
        debug!(%url, %range, "fetching chunk");

        let response = self
            .client
            .get_range(&url, &credential.token, &range)
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(|e| transport_error(&e))?;
            return slice_body(chunk, status, body);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(%url, error = %e, "could not read CAS error body");
                String::new()
            }
        };
        Err(classify_status(status, &body, &chunk.descriptor.hash))
    }
}

fn transport_error(e: &reqwest::Error) -> ChunkError {
    if e.is_builder() {
        ChunkError::Protocol {
            status: 0,
            message: e.to_string(),
        }
    } else {
        ChunkError::Transient {
            message: e.to_string(),
        }
    }
}

/// Cut the requested range out of a successful response body
fn slice_body(chunk: &ChunkHandle, status: StatusCode, body: Bytes) -> Result<Bytes, ChunkError> {
    let expected = chunk.length as usize;

    if status == StatusCode::PARTIAL_CONTENT {
        return match body.len().cmp(&expected) {
            std::cmp::Ordering::Equal => Ok(body),
            std::cmp::Ordering::Less => Err(ChunkError::Transient {
                message: format!("short range body: {} of {expected} bytes", body.len()),
            }),
            std::cmp::Ordering::Greater => Err(ChunkError::Protocol {
                status: status.as_u16(),
                message: format!("range body too long: {} of {expected} bytes", body.len()),
            }),
        };
    }

    // Range ignored: the whole object came back
    let (Ok(start), Ok(end)) = (usize::try_from(chunk.offset), usize::try_from(chunk.end())) else {
        return Err(ChunkError::Protocol {
            status: status.as_u16(),
            message: "range exceeds addressable memory".to_string(),
        });
    };
    if body.len() < end {
        return Err(ChunkError::Transient {
            message: format!("short body: {} bytes, range ends at {end}", body.len()),
        });
    }
    Ok(body.slice(start..end))
}

/// Map a non-success CAS reply onto the chunk error taxonomy
fn classify_status(status: StatusCode, body: &str, hash: &str) -> ChunkError {
    let parsed: Option<CasErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|b| b.error.clone())
        .unwrap_or_else(|| status.to_string());

    match parsed.as_ref().and_then(|b| b.code.as_deref()) {
        Some("checksum_mismatch") => return ChunkError::Integrity { message },
        Some("not_found") => {
            return ChunkError::NotFound {
                hash: hash.to_string(),
            }
        }
        _ => {}
    }

    match status.as_u16() {
        401 | 403 => ChunkError::Auth(AuthError::Rejected {
            status: status.as_u16(),
        }),
        404 | 410 => ChunkError::NotFound {
            hash: hash.to_string(),
        },
        409 | 416 | 422 => ChunkError::Integrity { message },
        408 | 429 | 500..=599 => ChunkError::Transient { message },
        code => ChunkError::Protocol {
            status: code,
            message,
        },
    }
}
