//! Hub repository identifiers

use std::str::FromStr;

use hubcas_errors::ResolutionError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    #[default]
    Model,
    Dataset,
    Space,
}

impl RepoType {
    /// Accepts singular and plural spellings, case-insensitively
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment.to_ascii_lowercase().as_str() {
            "model" | "models" => Some(Self::Model),
            "dataset" | "datasets" => Some(Self::Dataset),
            "space" | "spaces" => Some(Self::Space),
            _ => None,
        }
    }

    /// Segment used in `/api/{plural}/...` routes
    #[must_use]
    pub fn plural(self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Dataset => "datasets",
            Self::Space => "spaces",
        }
    }

    /// Prefix of file URLs (`/{prefix}{repo}/resolve/...`); models have none
    #[must_use]
    pub fn url_prefix(self) -> &'static str {
        match self {
            Self::Model => "",
            Self::Dataset => "datasets/",
            Self::Space => "spaces/",
        }
    }
}

/// A repository on the hosting platform, e.g. `Qwen/Qwen3-0.6B` or
/// `datasets/owner/name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub repo_type: RepoType,
    /// `owner/name`
    pub name: String,
}

impl RepoId {
    /// Parse `owner/name` or `{type}/owner/name`.
    ///
    /// # Errors
    ///
    /// Returns `ResolutionError::InvalidReference` for empty segments or a
    /// missing owner.
    pub fn parse(input: &str) -> Result<Self, ResolutionError> {
        let invalid = || ResolutionError::InvalidReference {
            message: format!(
                "repository must be `owner/name` or `type/owner/name`, got `{input}`"
            ),
        };

        let trimmed = input.trim().trim_matches('/');
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (repo_type, name_parts) = match RepoType::from_segment(parts[0]) {
            Some(repo_type) if parts.len() >= 3 => (repo_type, &parts[1..]),
            _ => (RepoType::Model, &parts[..]),
        };
        if name_parts.len() != 2 {
            return Err(invalid());
        }

        Ok(Self {
            repo_type,
            name: name_parts.join("/"),
        })
    }

    /// `{prefix}{owner}/{name}`, as used in file URLs
    #[must_use]
    pub fn url_path(&self) -> String {
        format!("{}{}", self.repo_type.url_prefix(), self.name)
    }
}

impl FromStr for RepoId {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url_path())
    }
}
