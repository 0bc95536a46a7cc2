//! Failure reporting through the external notification capability.
//!
//! [`FailureReporter::report`] is non-blocking relative to the caller-facing
//! path: delivery runs on a detached task that is never awaited before a
//! response is returned. A failing notifier is recorded once at warn level
//! and otherwise swallowed — the gateway must not cascade-fail because its
//! telemetry exit is down.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::models::{FailureEvent, Partition};

/// External notification capability. Fire-and-forget, best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &FailureEvent) -> anyhow::Result<()>;
}

/// Default notifier: renders each event as a structured log record.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &FailureEvent) -> anyhow::Result<()> {
        tracing::error!(
            kind = %event.kind,
            partition = ?event.partition,
            timestamp = %event.timestamp,
            "{}",
            event.detail
        );
        Ok(())
    }
}

/// Notifier that drops every event.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _event: &FailureEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct FailureReporter {
    notifier: Arc<dyn Notifier>,
}

impl FailureReporter {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Forward one event. Never blocks, never errors.
    pub fn report(&self, event: FailureEvent) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.notify(&event).await {
                tracing::warn!(kind = %event.kind, "failure notification dropped: {err}");
            }
        });
    }

    /// Mirror an error to the notifier when its kind is a system event.
    /// Validation and auth failures are caller mistakes and are skipped.
    pub fn report_error(&self, error: &GatewayError, partition: Option<Partition>) {
        if error.is_reportable() {
            self.report(FailureEvent::from_error(error, partition));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Recording double; a sender half lets tests await delivery.
    struct RecordingNotifier {
        events: Mutex<Vec<FailureEvent>>,
        tx: tokio::sync::mpsc::UnboundedSender<()>,
    }

    fn recording() -> (
        Arc<RecordingNotifier>,
        tokio::sync::mpsc::UnboundedReceiver<()>,
    ) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Arc::new(RecordingNotifier {
                events: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &FailureEvent) -> anyhow::Result<()> {
            self.events.lock().unwrap().push(event.clone());
            let _ = self.tx.send(());
            Ok(())
        }
    }

    struct BrokenNotifier {
        tx: tokio::sync::mpsc::UnboundedSender<()>,
    }

    #[async_trait]
    impl Notifier for BrokenNotifier {
        async fn notify(&self, _event: &FailureEvent) -> anyhow::Result<()> {
            let _ = self.tx.send(());
            anyhow::bail!("notification topic unreachable")
        }
    }

    #[tokio::test]
    async fn test_reportable_error_delivered() {
        let (notifier, mut rx) = recording();
        let reporter = FailureReporter::new(notifier.clone());
        reporter.report_error(&GatewayError::Unavailable("backend down".into()), None);

        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notification should be delivered")
            .unwrap();
        let events = notifier.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, crate::error::ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_caller_mistakes_not_reported() {
        let (notifier, _rx) = recording();
        let reporter = FailureReporter::new(notifier.clone());
        reporter.report_error(&GatewayError::Validation("empty".into()), None);
        reporter.report_error(&GatewayError::Auth("unknown".into()), None);

        tokio::task::yield_now().await;
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_notifier_is_swallowed() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let reporter = FailureReporter::new(Arc::new(BrokenNotifier { tx }));
        // Must neither panic nor propagate.
        reporter.report_error(&GatewayError::Resolution("contract bug".into()), None);
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("notifier should have been invoked")
            .unwrap();
    }
}
