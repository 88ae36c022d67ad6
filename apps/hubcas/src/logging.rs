//! Structured logging integration for events
//!
//! Library crates report through the event channel; this module turns each
//! message into a tracing record with structured fields.

use hubcas_events::{AppEvent, EventMessage, GeneralEvent, HubEvent, TransferEvent};
use tracing::{debug, error, info, trace, warn};

/// Log an event message at its level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let event_id = meta.event_id;
    let correlation = meta.correlation_id.as_deref();

    match &message.event {
        AppEvent::General(general) => match general {
            GeneralEvent::Warning { message, context } => {
                warn!(source, %event_id, ?correlation, %message, ?context, "Warning");
            }
            GeneralEvent::Error { message, details } => {
                error!(source, %event_id, ?correlation, %message, ?details, "Error");
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(source, %event_id, ?correlation, %message, ?context, "Debug log");
            }
        },

        AppEvent::Hub(hub) => match hub {
            HubEvent::ResolveStarted {
                repo,
                path,
                revision,
            } => {
                debug!(source, %event_id, %repo, %path, %revision, "Resolving reference");
            }
            HubEvent::Resolved {
                repo,
                path,
                hash,
                size,
                commit,
                etag,
            } => {
                info!(
                    source, %event_id, %repo, %path, %hash, size, ?commit, ?etag,
                    "Reference resolved"
                );
            }
            HubEvent::NotCasBacked { repo, path } => {
                warn!(source, %event_id, %repo, %path, "File is not stored in CAS");
            }
            HubEvent::CredentialIssued {
                repo,
                revision,
                direction,
                expiry,
            } => {
                info!(
                    source, %event_id, %repo, %revision, %direction, %expiry,
                    "CAS credential issued"
                );
            }
        },

        AppEvent::Transfer(transfer) => log_transfer_event(message, transfer),
    }
}

fn log_transfer_event(message: &EventMessage, event: &TransferEvent) {
    let meta = &message.meta;
    let source = meta.source.as_str();
    let event_id = meta.event_id;
    let correlation = meta.correlation_id.as_deref();

    match event {
        TransferEvent::BatchStarted {
            batch_id,
            descriptors,
            unique_files,
            total_bytes,
        } => {
            info!(
                source, %event_id, %batch_id, descriptors, unique_files, total_bytes,
                "Download started"
            );
        }
        TransferEvent::FileStarted {
            index,
            hash,
            size,
            chunks,
        } => {
            debug!(
                source, %event_id, ?correlation, index, %hash, size, chunks,
                "File transfer started"
            );
        }
        TransferEvent::ChunkRetrying {
            hash,
            offset,
            attempt,
            delay_ms,
            reason,
        } => {
            warn!(
                source, %event_id, ?correlation, %hash, offset, attempt, delay_ms, %reason,
                "Retrying chunk"
            );
        }
        TransferEvent::FileVerified { index, hash } => {
            debug!(source, %event_id, ?correlation, index, %hash, "File verified");
        }
        TransferEvent::FileCommitted { index, path } => {
            info!(source, %event_id, ?correlation, index, path = %path.display(), "File committed");
        }
        TransferEvent::FileFailed {
            index,
            hash,
            failure,
        } => {
            error!(
                source,
                %event_id,
                ?correlation,
                index,
                %hash,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "File transfer failed"
            );
        }
        TransferEvent::Progress {
            hash,
            file_bytes,
            file_total,
            batch_bytes,
            batch_total,
        } => {
            trace!(
                source, ?correlation, %hash, file_bytes, file_total, batch_bytes, batch_total,
                "Progress"
            );
        }
        TransferEvent::RolledBack { removed } => {
            warn!(source, %event_id, ?correlation, removed, "Committed files rolled back");
        }
        TransferEvent::BatchCompleted {
            batch_id,
            succeeded,
            failed,
            duration_ms,
        } => {
            info!(
                source, %event_id, %batch_id, succeeded, failed, duration_ms,
                "Download completed"
            );
        }
        TransferEvent::BatchFailed { batch_id, failure } => {
            error!(
                source,
                %event_id,
                %batch_id,
                retryable = failure.retryable,
                code = ?failure.code,
                message = %failure.message,
                hint = ?failure.hint,
                "Download failed"
            );
        }
        TransferEvent::StagingSwept { dir, removed } => {
            info!(
                source, %event_id, dir = %dir.display(), removed,
                "Orphaned staging files removed"
            );
        }
    }
}
