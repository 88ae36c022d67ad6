//! End-to-end tests of the client against a mock Hub and CAS

use hubcas::{CasClient, Config, Direction, Error, TransferErrorKind, TransferRequest};
use hubcas_errors::ResolutionError;
use hubcas_hash::{ContentHash, HashAlgorithm};
use httpmock::prelude::*;
use httpmock::Method::HEAD;
use serde_json::json;
use tempfile::TempDir;

const CONTENT: &[u8] = b"{\"model_type\": \"widget\", \"layers\": 4}";

fn digest(data: &[u8]) -> String {
    ContentHash::from_data(HashAlgorithm::Sha256, data).to_hex()
}

fn config_for(server: &MockServer, chunk_size: u64) -> Config {
    let mut config = Config::default();
    config.hub.endpoint = server.base_url();
    config.transfer.chunk_size = chunk_size;
    config.retry.max_attempts = 2;
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config
}

async fn mock_token<'a>(
    server: &'a MockServer,
    kind: &str,
    identity: &str,
) -> httpmock::Mock<'a> {
    let exp = chrono::Utc::now().timestamp() + 3600;
    let cas_url = server.base_url();
    let path = format!("/api/models/acme/widget/xet-{kind}-token/main");
    let bearer = format!("Bearer {identity}");
    server
        .mock_async(move |when, then| {
            when.method(GET).path(path).header("authorization", bearer);
            then.status(200).json_body(json!({
                "accessToken": "cas-jwt",
                "exp": exp,
                "casUrl": cas_url,
            }));
        })
        .await
}

#[tokio::test]
async fn resolve_authorize_and_download() {
    let server = MockServer::start_async().await;
    let hash = digest(CONTENT);

    let head = server
        .mock_async(|when, then| {
            when.method(HEAD)
                .path("/acme/widget/resolve/main/config.json")
                .header("authorization", "Bearer hf_user");
            then.status(200)
                .header("x-xet-hash", hash.as_str())
                .header("x-linked-size", CONTENT.len().to_string());
        })
        .await;
    let token = mock_token(&server, "read", "hf_user").await;

    let chunk = 16usize;
    let mut range_mocks = Vec::new();
    for start in (0..CONTENT.len()).step_by(chunk) {
        let end = (start + chunk).min(CONTENT.len());
        let range = format!("bytes={start}-{}", end - 1);
        let body = CONTENT[start..end].to_vec();
        let path = format!("/v1/files/{hash}");
        range_mocks.push(
            server
                .mock_async(move |when, then| {
                    when.method(GET)
                        .path(path)
                        .header("range", range)
                        .header("authorization", "Bearer cas-jwt");
                    then.status(206).body(body);
                })
                .await,
        );
    }

    let client = CasClient::with_config(config_for(&server, chunk as u64), Some("hf_user".into()))
        .unwrap();

    let descriptor = client
        .resolve("acme/widget", "config.json", None)
        .await
        .unwrap()
        .expect("file is CAS-backed");
    assert_eq!(descriptor.size, CONTENT.len() as u64);

    let credential = client
        .authorize("acme/widget", None, Direction::Download)
        .await
        .unwrap();
    assert_eq!(credential.endpoint, server.base_url());

    let dest = TempDir::new().unwrap();
    let result = client
        .download(TransferRequest::new(vec![descriptor], dest.path(), credential))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&result.paths[0]).unwrap(), CONTENT);
    head.assert_async().await;
    token.assert_async().await;
    for mock in range_mocks {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn identity_can_be_overridden_per_call() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server, "read", "hf_other").await;

    let client = CasClient::with_config(config_for(&server, 64), Some("hf_user".into())).unwrap();
    client
        .authorize_as("acme/widget", None, Direction::Download, Some("hf_other"))
        .await
        .unwrap();

    token.assert_async().await;
}

#[tokio::test]
async fn each_authorize_call_fetches_a_fresh_credential() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server, "read", "hf_user").await;

    let client = CasClient::with_config(config_for(&server, 64), Some("hf_user".into())).unwrap();
    for _ in 0..2 {
        client
            .authorize("acme/widget", Some("main"), Direction::Download)
            .await
            .unwrap();
    }

    token.assert_hits_async(2).await;
}

#[tokio::test]
async fn malformed_repo_is_rejected_before_any_request() {
    let server = MockServer::start_async().await;
    let client = CasClient::with_config(config_for(&server, 64), None).unwrap();

    let err = client.resolve("", "config.json", None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution(ResolutionError::InvalidReference { .. })
    ));
}

#[tokio::test]
async fn partial_download_reports_missing_content() {
    let server = MockServer::start_async().await;
    let present = digest(CONTENT);
    let absent = digest(b"never uploaded");

    let present_path = format!("/v1/files/{present}");
    server
        .mock_async(|when, then| {
            when.method(GET).path(present_path);
            then.status(200).body(CONTENT);
        })
        .await;
    let absent_path = format!("/v1/files/{absent}");
    let missing = server
        .mock_async(|when, then| {
            when.method(GET).path(absent_path);
            then.status(404)
                .json_body(json!({"error": "no such file", "code": "not_found"}));
        })
        .await;
    let token = mock_token(&server, "read", "hf_user").await;

    let client = CasClient::with_config(config_for(&server, 1024), Some("hf_user".into())).unwrap();
    let credential = client
        .authorize("acme/widget", None, Direction::Download)
        .await
        .unwrap();

    let dest = TempDir::new().unwrap();
    let result = client
        .download_partial(TransferRequest::new(
            vec![
                hubcas::ContentDescriptor::new(present.clone(), CONTENT.len() as u64),
                hubcas::ContentDescriptor::new(absent, 14),
            ],
            dest.path(),
            credential,
        ))
        .await
        .unwrap();

    assert_eq!(
        result.outcomes[0].as_ref().unwrap(),
        &dest.path().join(&present)
    );
    assert_eq!(
        result.outcomes[1].as_ref().unwrap_err().kind,
        TransferErrorKind::NotFound
    );
    missing.assert_hits_async(1).await;
    token.assert_async().await;
}

#[tokio::test]
async fn upload_credential_writes_nothing() {
    let server = MockServer::start_async().await;
    let hash = digest(CONTENT);
    let path = format!("/v1/files/{hash}");
    let cas = server
        .mock_async(|when, then| {
            when.method(GET).path(path);
            then.status(200).body(CONTENT);
        })
        .await;
    mock_token(&server, "write", "hf_user").await;

    let client = CasClient::with_config(config_for(&server, 1024), Some("hf_user".into())).unwrap();
    let credential = client
        .authorize("acme/widget", None, Direction::Upload)
        .await
        .unwrap();

    let dest = TempDir::new().unwrap();
    let err = client
        .download(TransferRequest::new(
            vec![hubcas::ContentDescriptor::new(hash, CONTENT.len() as u64)],
            dest.path(),
            credential,
        ))
        .await
        .unwrap_err();

    assert_eq!(
        err.as_transfer().map(|e| e.kind),
        Some(TransferErrorKind::Auth)
    );
    cas.assert_hits_async(0).await;
    assert_eq!(std::fs::read_dir(dest.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn download_credential_follows_advertised_route() {
    let server = MockServer::start_async().await;
    let hash = digest(CONTENT);
    let exp = chrono::Utc::now().timestamp() + 3600;
    let cas_url = server.base_url();
    let link = format!(
        "<{}>; rel=\"xet-auth\"",
        server.url("/api/models/acme/widget/xet-read-token/3f2a")
    );

    server
        .mock_async(|when, then| {
            when.method(HEAD).path("/acme/widget/resolve/main/config.json");
            then.status(302)
                .header("x-xet-hash", hash.as_str())
                .header("x-linked-size", CONTENT.len().to_string())
                .header("x-repo-commit", "3f2a")
                .header("link", link.as_str());
        })
        .await;
    let routed = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/models/acme/widget/xet-read-token/3f2a")
                .header("authorization", "Bearer hf_user");
            then.status(200).json_body(json!({
                "accessToken": "routed-jwt",
                "exp": exp,
                "casUrl": cas_url,
            }));
        })
        .await;
    let standard = mock_token(&server, "read", "hf_user").await;

    let client = CasClient::with_config(config_for(&server, 64), Some("hf_user".into())).unwrap();
    let resolution = client
        .resolve_file("acme/widget", "config.json", None)
        .await
        .unwrap();
    assert_eq!(resolution.commit.as_deref(), Some("3f2a"));

    let credential = client
        .authorize_resolved("acme/widget", None, &resolution)
        .await
        .unwrap();

    assert_eq!(credential.token, "routed-jwt");
    routed.assert_async().await;
    standard.assert_hits_async(0).await;
}

#[tokio::test]
async fn download_credential_without_route_uses_read_token() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server, "read", "hf_user").await;

    let client = CasClient::with_config(config_for(&server, 64), Some("hf_user".into())).unwrap();
    let credential = client
        .authorize_resolved("acme/widget", None, &hubcas::Resolution::default())
        .await
        .unwrap();

    assert_eq!(credential.token, "cas-jwt");
    token.assert_async().await;
}
