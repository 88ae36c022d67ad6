//! Per-chunk retry state machine

use hubcas_errors::{ChunkError, TransferErrorKind};
use hubcas_net::RetryPolicy;
use std::time::Duration;

/// Lifecycle of one chunk.
///
/// `Pending → InFlight → {Succeeded | RetryScheduled → InFlight … | Failed}`.
/// Transitions are pure; the caller performs the fetch and the sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Pending,
    InFlight { attempt: u32 },
    Succeeded,
    RetryScheduled { attempt: u32, delay: Duration },
    Failed(TransferErrorKind),
}

impl ChunkState {
    /// Start the next attempt.
    ///
    /// Terminal states are returned unchanged.
    #[must_use]
    pub fn begin_attempt(self) -> Self {
        match self {
            Self::Pending => Self::InFlight { attempt: 1 },
            Self::RetryScheduled { attempt, .. } => Self::InFlight {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    /// Record the outcome of the in-flight attempt.
    ///
    /// `jitter_unit` is the random draw in `[0, 1)` used for the backoff
    /// delay, supplied by the caller so the transition stays deterministic.
    #[must_use]
    pub fn complete(
        self,
        outcome: Result<(), &ChunkError>,
        policy: &RetryPolicy,
        jitter_unit: f64,
    ) -> Self {
        let Self::InFlight { attempt } = self else {
            return self;
        };

        match outcome {
            Ok(()) => Self::Succeeded,
            Err(err) if err.is_transient() && policy.allows_retry_after(attempt) => {
                Self::RetryScheduled {
                    attempt,
                    delay: policy.delay_with_jitter(attempt, jitter_unit),
                }
            }
            Err(err) => Self::Failed(err.kind()),
        }
    }
}
