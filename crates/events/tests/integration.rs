//! Integration tests for events

#[cfg(test)]
mod tests {
    use hubcas_errors::{TransferError, TransferErrorKind};
    use hubcas_events::*;

    #[tokio::test]
    async fn test_emitter_wraps_events_with_meta() {
        let (tx, mut rx) = channel();

        tx.emit_error("test error");
        tx.emit_transfer(TransferEvent::ChunkRetrying {
            hash: "abc".into(),
            offset: 0,
            attempt: 1,
            delay_ms: 250,
            reason: "503".into(),
        });

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first.event,
            AppEvent::General(GeneralEvent::Error { .. })
        ));
        assert_eq!(first.meta.level, EventLevel::Error);
        assert_eq!(first.meta.source, EventSource::GENERAL);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.meta.level, EventLevel::Warn);
        assert_eq!(second.meta.source, EventSource::TRANSFER);
        assert_eq!(second.event.log_target(), "hubcas::events::transfer");
    }

    #[tokio::test]
    async fn test_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);

        // Should not panic when receiver is dropped
        tx.emit_warning("ignored");
    }

    #[test]
    fn test_absent_sender_is_noop() {
        let none: Option<EventSender> = None;
        none.emit_debug("nobody listens");
    }

    #[test]
    fn test_failure_context_from_transfer_error() {
        let err = TransferError::new(2, TransferErrorKind::Auth, "credential expired");
        let ctx = FailureContext::from_error(&err);
        assert_eq!(ctx.code.as_deref(), Some("transfer.auth"));
        assert!(!ctx.retryable);
        assert!(ctx.hint.is_some());
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AppEvent::Hub(HubEvent::NotCasBacked {
            repo: "owner/name".into(),
            path: "README.md".into(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["domain"], "hub");
        assert_eq!(json["event"]["type"], "not_cas_backed");
    }
}
