//! Integration tests for config

#[cfg(test)]
mod tests {
    use hubcas_config::*;
    use hubcas_hash::HashAlgorithm;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[hub]
endpoint = "https://hub.internal"

[transfer]
chunk_size = 1048576
max_concurrent_fetches = 8
share_pool = true
request_timeout_secs = 600
default_hash_algorithm = "blake3"

[retry]
max_attempts = 3
        "#
        )
        .unwrap();

        let config = Config::load_from_file(temp_file.path()).await.unwrap();
        assert_eq!(config.hub.endpoint, "https://hub.internal");
        assert_eq!(config.transfer.chunk_size, 1_048_576);
        assert_eq!(config.transfer.max_concurrent_fetches, 8);
        assert!(config.transfer.share_pool);
        assert_eq!(config.transfer.request_timeout_secs, Some(600));
        assert_eq!(
            config.transfer.default_hash_algorithm,
            HashAlgorithm::Blake3
        );
        assert_eq!(config.retry.max_attempts, 3);
        // untouched sections keep their defaults
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.network.timeout_secs, 300);
        config.validate().unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from_file(&dir.path().join("nope.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.hub.endpoint, "https://huggingface.co");
        assert_eq!(config.transfer.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.transfer.max_parallel_files, 32);
        assert!(config.transfer.request_timeout_secs.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_merge_env() {
        let mut config = Config::default();
        config
            .merge_env_from(lookup(&[
                ("HF_ENDPOINT", "https://mirror.example/"),
                ("XET_CHUNK_SIZE_MB", "4"),
                ("XET_NUM_CONCURRENT_RANGE_GETS", "7"),
                ("XET_MAX_PARALLEL_FILES", "3"),
            ]))
            .unwrap();

        assert_eq!(config.hub.endpoint, "https://mirror.example");
        assert_eq!(config.transfer.chunk_size, 4 * 1024 * 1024);
        assert_eq!(config.transfer.max_in_flight_per_file, 7);
        assert_eq!(config.transfer.max_parallel_files, 3);
    }

    #[test]
    fn test_hubcas_vars_take_precedence() {
        let mut config = Config::default();
        config
            .merge_env_from(lookup(&[
                ("HF_ENDPOINT", "https://hf.example"),
                ("HUBCAS_ENDPOINT", "https://cas-hub.example"),
                ("XET_CHUNK_SIZE_MB", "4"),
                ("HUBCAS_CHUNK_SIZE_MB", "2"),
            ]))
            .unwrap();
        assert_eq!(config.hub.endpoint, "https://cas-hub.example");
        assert_eq!(config.transfer.chunk_size, 2 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = Config::default();
        let result = config.merge_env_from(lookup(&[("XET_MAX_PARALLEL_FILES", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.transfer.max_concurrent_fetches = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transfer.chunk_size = u64::from(u32::MAX) + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }
}
