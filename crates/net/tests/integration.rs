//! Integration tests for net crate

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use hubcas_errors::{AuthError, ChunkError};
    use hubcas_net::*;
    use hubcas_types::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    const HASH: &str = "3c5bda5a4ebbb9fd3bfe2c8c7b6d3e3e5c4a8c1f0f0a8b7c6d5e4f3a2b1c0d9e";

    fn credential(endpoint: &str, direction: Direction) -> AccessCredential {
        AccessCredential {
            token: "tok".into(),
            endpoint: endpoint.to_string(),
            scope: CredentialScope {
                repo: "owner/name".into(),
                revision: "main".into(),
                direction,
            },
            expiry: Utc::now() + Duration::hours(1),
        }
    }

    fn chunk(offset: u64, length: u32) -> ChunkHandle {
        ChunkHandle {
            descriptor: ContentDescriptor::new(HASH, 20),
            offset,
            length,
        }
    }

    fn fetcher() -> HttpChunkFetcher {
        HttpChunkFetcher::new(NetClient::new(NetConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_fetch_sends_range_and_bearer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/v1/files/{HASH}"))
                    .header("range", "bytes=10-19")
                    .header("authorization", "Bearer tok");
                then.status(206).body("abcdefghij");
            })
            .await;

        let bytes = fetcher()
            .fetch(&chunk(10, 10), &credential(&server.base_url(), Direction::Download))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(&bytes[..], b"abcdefghij");
    }

    #[tokio::test]
    async fn test_fetch_maps_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/v1/files/{HASH}"));
                then.status(404)
                    .body(r#"{"error":"no such xorb","code":"not_found"}"#);
            })
            .await;

        let err = fetcher()
            .fetch(&chunk(0, 10), &credential(&server.base_url(), Direction::Download))
            .await
            .unwrap_err();
        assert!(matches!(err, ChunkError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_fetch_maps_server_error_to_transient() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/v1/files/{HASH}"));
                then.status(503);
            })
            .await;

        let err = fetcher()
            .fetch(&chunk(0, 10), &credential(&server.base_url(), Direction::Download))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_upload_credential_never_reaches_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(206).body("abcdefghij");
            })
            .await;

        let err = fetcher()
            .fetch(&chunk(0, 10), &credential(&server.base_url(), Direction::Upload))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChunkError::Auth(AuthError::WrongDirection { .. })
        ));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_expired_credential_never_reaches_server() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(206).body("abcdefghij");
            })
            .await;

        let mut cred = credential(&server.base_url(), Direction::Download);
        cred.expiry = Utc::now() - Duration::seconds(5);

        let err = fetcher().fetch(&chunk(0, 10), &cred).await.unwrap_err();
        assert!(matches!(err, ChunkError::Auth(AuthError::Expired { .. })));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_net_client_head_does_not_follow_redirects() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/file");
                then.status(302).header("location", "/elsewhere");
            })
            .await;

        let client = NetClient::new(NetConfig::default()).unwrap();
        let response = client
            .head_no_redirect(&server.url("/file"), None)
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 302);
    }

    #[tokio::test]
    async fn test_ranged_get_does_not_follow_redirects() {
        let server = MockServer::start_async().await;
        let file = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/file")
                    .header("range", "bytes=0-0")
                    .header("authorization", "Bearer hf_test");
                then.status(302)
                    .header("location", "/elsewhere")
                    .header("x-linked-size", "10");
            })
            .await;
        let elsewhere = server
            .mock_async(|when, then| {
                when.path("/elsewhere");
                then.status(200);
            })
            .await;

        let client = NetClient::new(NetConfig::default()).unwrap();
        let response = client
            .get_range_no_redirect(&server.url("/file"), Some("hf_test"), "bytes=0-0")
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 302);
        assert_eq!(response.headers()["x-linked-size"], "10");
        file.assert_async().await;
        elsewhere.assert_hits_async(0).await;
    }
}
