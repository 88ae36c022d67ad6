use serde::{Deserialize, Serialize};

/// Events from reference resolution and credential issuance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubEvent {
    ResolveStarted {
        repo: String,
        path: String,
        revision: String,
    },

    Resolved {
        repo: String,
        path: String,
        hash: String,
        size: u64,
        /// Commit the revision pointed at, when the Hub reported it
        #[serde(default, skip_serializing_if = "Option::is_none")]
        commit: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        etag: Option<String>,
    },

    /// The path exists but carries no CAS pointer metadata
    NotCasBacked { repo: String, path: String },

    CredentialIssued {
        repo: String,
        revision: String,
        direction: String,
        /// RFC 3339 expiry
        expiry: String,
    },
}
