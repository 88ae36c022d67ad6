//! Integration tests for hub crate

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hubcas_errors::{AuthError, Error, ResolutionError};
    use hubcas_events::{channel, AppEvent, HubEvent};
    use hubcas_hub::*;
    use hubcas_net::{NetClient, NetConfig};
    use hubcas_types::{ContentDescriptor, Direction, RepoId};
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;

    const HASH: &str = "0b3e2f9a7c61d5e48f1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f70";

    fn client() -> NetClient {
        NetClient::new(NetConfig::default()).unwrap()
    }

    fn qwen() -> RepoId {
        RepoId::parse("Qwen/Qwen3-0.6B").unwrap()
    }

    #[tokio::test]
    async fn test_resolve_from_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(HEAD)
                    .path("/Qwen/Qwen3-0.6B/resolve/main/tokenizer.json")
                    .header("authorization", "Bearer hf_test");
                then.status(302)
                    .header("x-xet-hash", HASH)
                    .header("x-linked-size", "11422654")
                    .header("x-repo-commit", "c1899de")
                    .header("location", "https://cas-bridge.example/whatever");
            })
            .await;

        let (tx, mut rx) = channel();
        let resolver = ReferenceResolver::new(client(), server.base_url()).with_events(tx);
        let descriptor = resolver
            .resolve(&qwen(), "tokenizer.json", "main", Some("hf_test"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(descriptor, Some(ContentDescriptor::new(HASH, 11_422_654)));

        let mut saw_resolved = false;
        while let Ok(msg) = rx.try_recv() {
            if let AppEvent::Hub(HubEvent::Resolved { size, commit, .. }) = msg.event {
                assert_eq!(size, 11_422_654);
                assert_eq!(commit.as_deref(), Some("c1899de"));
                saw_resolved = true;
            }
        }
        assert!(saw_resolved);
    }

    #[tokio::test]
    async fn test_resolve_dataset_lfs_pointer_fallback() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD)
                    .path("/datasets/owner/data/resolve/main/train.jsonl");
                then.status(200).header("content-length", "130");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/datasets/owner/data/raw/main/train.jsonl");
                then.status(200).body(format!(
                    "version https://git-lfs.github.com/spec/v1\noid sha256:{HASH}\nsize 5000\n"
                ));
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let repo = RepoId::parse("datasets/owner/data").unwrap();
        let descriptor = resolver
            .resolve(&repo, "train.jsonl", "main", None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(descriptor.hash, format!("sha256:{HASH}"));
        assert_eq!(descriptor.size, 5000);
    }

    #[tokio::test]
    async fn test_plain_file_is_absent_not_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/owner/name/resolve/main/README.md");
                then.status(200).header("content-length", "20");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/owner/name/raw/main/README.md");
                then.status(200).body("# A model card here\n");
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let repo = RepoId::parse("owner/name").unwrap();
        let result = resolver.resolve(&repo, "README.md", "main", None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_binary_extension_skips_pointer_fetch() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/owner/name/resolve/main/model.safetensors");
                then.status(200).header("content-length", "100");
            })
            .await;
        let raw = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("oid abc\nsize 1\n");
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let repo = RepoId::parse("owner/name").unwrap();
        let result = resolver
            .resolve(&repo, "model.safetensors", "main", None)
            .await
            .unwrap();
        assert!(result.is_none());
        raw.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_missing_file_is_resolution_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD);
                then.status(404);
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let err = resolver
            .resolve(&qwen(), "missing.json", "main", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_json_response() {
        let server = MockServer::start_async().await;
        let exp = Utc::now().timestamp() + 3600;
        let cas_url = server.url("/cas");
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/models/Qwen/Qwen3-0.6B/xet-read-token/main")
                    .header("authorization", "Bearer hf_test");
                then.status(200).json_body(serde_json::json!({
                    "accessToken": "cas-jwt",
                    "exp": exp,
                    "casUrl": cas_url,
                }));
            })
            .await;

        let provider = CasAuthProvider::new(client(), server.base_url());
        let cred = provider
            .authorize(&qwen(), "main", Direction::Download, Some("hf_test"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(cred.token, "cas-jwt");
        assert_eq!(cred.endpoint, server.url("/cas"));
        assert_eq!(cred.scope.direction, Direction::Download);
        assert_eq!(cred.scope.repo, "Qwen/Qwen3-0.6B");
        assert_eq!(cred.expiry.timestamp(), exp);
    }

    #[tokio::test]
    async fn test_authorize_header_fallback_for_upload() {
        let server = MockServer::start_async().await;
        let exp = (Utc::now().timestamp() + 600).to_string();
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/spaces/owner/app/xet-write-token/main");
                then.status(200)
                    .header("x-xet-access-token", "write-jwt")
                    .header("x-xet-token-expiration", exp.as_str())
                    .header("x-xet-cas-url", "https://cas.example");
            })
            .await;

        let provider = CasAuthProvider::new(client(), server.base_url());
        let repo = RepoId::parse("spaces/owner/app").unwrap();
        let cred = provider
            .authorize(&repo, "main", Direction::Upload, Some("hf_test"))
            .await
            .unwrap();
        assert_eq!(cred.token, "write-jwt");
        assert_eq!(cred.scope.direction, Direction::Upload);
    }

    #[tokio::test]
    async fn test_authorize_requires_identity() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(401);
            })
            .await;

        let provider = CasAuthProvider::new(client(), server.base_url());
        let anonymous = provider
            .authorize(&qwen(), "main", Direction::Download, None)
            .await
            .unwrap_err();
        assert!(matches!(
            anonymous,
            Error::Auth(AuthError::IdentityRequired { .. })
        ));

        let bad_token = provider
            .authorize(&qwen(), "main", Direction::Download, Some("wrong"))
            .await
            .unwrap_err();
        assert!(matches!(
            bad_token,
            Error::Auth(AuthError::Denied { status: 401, .. })
        ));
    }

    #[tokio::test]
    async fn test_authorize_rejects_already_expired_token() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(serde_json::json!({
                    "accessToken": "stale",
                    "exp": 1_000,
                    "casUrl": "https://cas.example",
                }));
            })
            .await;

        let provider = CasAuthProvider::new(client(), server.base_url());
        let err = provider
            .authorize(&qwen(), "main", Direction::Download, Some("hf_test"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::Expired { .. })));
    }

    #[tokio::test]
    async fn test_refused_head_falls_back_to_ranged_get() {
        let server = MockServer::start_async().await;
        let head = server
            .mock_async(|when, then| {
                when.method(HEAD)
                    .path("/Qwen/Qwen3-0.6B/resolve/main/tokenizer.json");
                then.status(405);
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/Qwen/Qwen3-0.6B/resolve/main/tokenizer.json")
                    .header("range", "bytes=0-0");
                then.status(302)
                    .header("x-xet-hash", HASH)
                    .header("x-linked-size", "11422654")
                    .header("location", "https://cas-bridge.example/whatever");
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let descriptor = resolver
            .resolve(&qwen(), "tokenizer.json", "main", None)
            .await
            .unwrap();

        head.assert_async().await;
        get.assert_async().await;
        assert_eq!(descriptor, Some(ContentDescriptor::new(HASH, 11_422_654)));
    }

    #[tokio::test]
    async fn test_ranged_get_size_comes_from_content_range() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD);
                then.status(501);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).header("range", "bytes=0-0");
                then.status(206)
                    .header("x-xet-hash", HASH)
                    .header("content-range", "bytes 0-0/4096")
                    .body("x");
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let metadata = resolver
            .fetch_metadata(&qwen(), "tokenizer.json", "main", None)
            .await
            .unwrap();
        assert_eq!(metadata.hash.as_deref(), Some(HASH));
        assert_eq!(metadata.size, Some(4096));
    }

    #[tokio::test]
    async fn test_api_resolve_route_used_after_not_found() {
        let server = MockServer::start_async().await;
        let short = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/owner/name/resolve/main/weights.bin");
                then.status(404);
            })
            .await;
        let api = server
            .mock_async(|when, then| {
                when.method(HEAD)
                    .path("/api/models/owner/name/resolve/main/weights.bin");
                then.status(200)
                    .header("x-xet-hash", HASH)
                    .header("x-linked-size", "77");
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let repo = RepoId::parse("owner/name").unwrap();
        let descriptor = resolver
            .resolve(&repo, "weights.bin", "main", None)
            .await
            .unwrap();

        short.assert_async().await;
        api.assert_async().await;
        assert_eq!(descriptor, Some(ContentDescriptor::new(HASH, 77)));
    }

    #[tokio::test]
    async fn test_forbidden_does_not_try_api_route() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/owner/name/resolve/main/weights.bin");
                then.status(403);
            })
            .await;
        let api = server
            .mock_async(|when, then| {
                when.path_contains("/api/");
                then.status(200);
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let repo = RepoId::parse("owner/name").unwrap();
        let err = resolver
            .resolve(&repo, "weights.bin", "main", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::Unauthorized { status: 403, .. })
        ));
        api.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn test_advertised_token_route_is_used_for_download() {
        let server = MockServer::start_async().await;
        let exp = Utc::now().timestamp() + 3600;
        let cas_url = server.url("/cas");
        let route = server.url("/api/models/Qwen/Qwen3-0.6B/xet-read-token/c1899de");
        let link = format!("<{route}>; rel=\"xet-auth\"");
        server
            .mock_async(|when, then| {
                when.method(HEAD)
                    .path("/Qwen/Qwen3-0.6B/resolve/main/tokenizer.json");
                then.status(302)
                    .header("x-xet-hash", HASH)
                    .header("x-linked-size", "11422654")
                    .header("x-repo-commit", "c1899de")
                    .header("link", link.as_str());
            })
            .await;
        let advertised = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/models/Qwen/Qwen3-0.6B/xet-read-token/c1899de")
                    .header("authorization", "Bearer hf_test");
                then.status(200).json_body(serde_json::json!({
                    "accessToken": "routed-jwt",
                    "exp": exp,
                    "casUrl": cas_url,
                }));
            })
            .await;
        let standard = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/models/Qwen/Qwen3-0.6B/xet-read-token/main");
                then.status(500);
            })
            .await;

        let resolver = ReferenceResolver::new(client(), server.base_url());
        let resolution = resolver
            .resolve_file(&qwen(), "tokenizer.json", "main", Some("hf_test"))
            .await
            .unwrap();
        assert_eq!(resolution.refresh_route.as_deref(), Some(route.as_str()));
        assert_eq!(resolution.commit.as_deref(), Some("c1899de"));

        let provider = CasAuthProvider::new(client(), server.base_url());
        let cred = provider
            .authorize_download(
                &qwen(),
                "main",
                resolution.refresh_route.as_deref(),
                Some("hf_test"),
            )
            .await
            .unwrap();

        advertised.assert_async().await;
        standard.assert_hits_async(0).await;
        assert_eq!(cred.token, "routed-jwt");
        assert_eq!(cred.scope.revision, "main");
        assert_eq!(cred.scope.direction, Direction::Download);
    }

    #[tokio::test]
    async fn test_authorize_rejects_non_http_cas_url() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).json_body(serde_json::json!({
                    "accessToken": "cas-jwt",
                    "exp": Utc::now().timestamp() + 3600,
                    "casUrl": "ftp://cas.example",
                }));
            })
            .await;

        let provider = CasAuthProvider::new(client(), server.base_url());
        let err = provider
            .authorize(&qwen(), "main", Direction::Download, Some("hf_test"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Auth(AuthError::MalformedResponse { .. })
        ));
    }
}
