//! Integration tests for types

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use hubcas_errors::TransferErrorKind;
    use hubcas_types::*;
    use std::path::PathBuf;

    #[test]
    fn test_credential_serde_roundtrip_keeps_scope() {
        let cred = AccessCredential {
            token: "jwt".into(),
            endpoint: "https://cas.example".into(),
            scope: CredentialScope {
                repo: "owner/name".into(),
                revision: "main".into(),
                direction: Direction::Download,
            },
            expiry: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = serde_json::to_string(&cred).unwrap();
        assert!(json.contains("\"direction\":\"download\""));
        let back: AccessCredential = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn test_request_totals_and_partial_summary() {
        let cred = AccessCredential {
            token: "jwt".into(),
            endpoint: "https://cas.example".into(),
            scope: CredentialScope {
                repo: "owner/name".into(),
                revision: "main".into(),
                direction: Direction::Download,
            },
            expiry: Utc::now(),
        };
        let request = TransferRequest::new(
            vec![
                ContentDescriptor::new("a", 10),
                ContentDescriptor::new("b", 32),
            ],
            "/tmp/out",
            cred,
        );
        assert_eq!(request.total_bytes(), 42);

        let partial = PartialTransferResult {
            outcomes: vec![
                Ok(PathBuf::from("/tmp/out/a")),
                Err(hubcas_errors::TransferError::new(
                    1,
                    TransferErrorKind::NotFound,
                    "gone",
                )),
            ],
        };
        assert_eq!(partial.succeeded(), 1);
        assert_eq!(partial.failures()[0].index, 1);
        assert!(!partial.is_complete());
    }

    #[test]
    fn test_repo_id_from_str() {
        let repo: RepoId = "spaces/owner/app".parse().unwrap();
        assert_eq!(repo.repo_type.url_prefix(), "spaces/");
        assert_eq!(repo.name, "owner/app");
    }
}
