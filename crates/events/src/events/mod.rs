use serde::{Deserialize, Serialize};

use crate::EventSource;
use hubcas_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub retryable: bool,
}

impl FailureContext {
    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self {
            code: error.user_code().map(Into::into),
            message: error.user_message().into_owned(),
            hint: error.user_hint().map(Into::into),
            retryable: error.is_retryable(),
        }
    }
}

pub mod general;
pub mod hub;
pub mod transfer;

pub use general::*;
pub use hub::*;
pub use transfer::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// Warnings, errors and debug notes
    General(GeneralEvent),

    /// Reference resolution and credential issuance
    Hub(HubEvent),

    /// Batch, file and chunk lifecycle of a download
    Transfer(TransferEvent),
}

impl AppEvent {
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Hub(_) => EventSource::HUB,
            Self::Transfer(_) => EventSource::TRANSFER,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Transfer(
                TransferEvent::FileFailed { .. } | TransferEvent::BatchFailed { .. },
            ) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Hub(HubEvent::NotCasBacked { .. })
            | Self::Transfer(
                TransferEvent::ChunkRetrying { .. } | TransferEvent::RolledBack { .. },
            ) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. })
            | Self::Hub(HubEvent::ResolveStarted { .. })
            | Self::Transfer(
                TransferEvent::FileStarted { .. }
                | TransferEvent::FileVerified { .. }
                | TransferEvent::StagingSwept { .. },
            ) => Level::DEBUG,

            Self::Transfer(TransferEvent::Progress { .. }) => Level::TRACE,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "hubcas::events::general",
            Self::Hub(_) => "hubcas::events::hub",
            Self::Transfer(_) => "hubcas::events::transfer",
        }
    }
}
