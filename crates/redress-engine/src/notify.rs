//! Outbound notifications.
//!
//! Delivery is fire-and-forget: the engine hands finished notifications to
//! a background worker and never blocks a mutation on a sink. A failing
//! sink is logged and dropped; issue state is already committed by the
//! time a notification exists.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, warn};

use redress_core::model::{IssueId, PrincipalId, Role};

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    /// One principal, e.g. the reporter or the new assignee.
    Principal(PrincipalId),
    /// Everyone holding a role, e.g. managers on escalation.
    Role(Role),
}

/// A rendered notification, ready for a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub target: NotifyTarget,
    pub issue: IssueId,
    /// Stable kind string, mirroring the audit action that caused it.
    pub kind: &'static str,
    pub message: String,
}

/// Transport behind the dispatcher: mail, chat, a test buffer.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Implementations report transport failures; the dispatcher logs and
    /// drops them.
    fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Discards everything. The default when no transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _notification: &Notification) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Buffers notifications in memory for test assertions.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far.
    #[must_use]
    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().expect("sink lock poisoned").clone()
    }
}

impl NotificationSink for MemorySink {
    fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .expect("sink lock poisoned")
            .push(notification.clone());
        Ok(())
    }
}

/// Background delivery worker.
///
/// Dropping the dispatcher closes the queue and joins the worker, so
/// everything dispatched before the drop is delivered or logged.
#[derive(Debug)]
pub struct NotificationDispatcher {
    tx: Option<mpsc::Sender<Notification>>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Start the worker thread for the given sink.
    ///
    /// # Panics
    ///
    /// Panics when the OS refuses to spawn a thread.
    #[must_use]
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> Self {
        let (tx, rx) = mpsc::channel::<Notification>();
        let worker = std::thread::Builder::new()
            .name("redress-notify".to_string())
            .spawn(move || {
                for notification in rx {
                    match sink.deliver(&notification) {
                        Ok(()) => {
                            debug!(
                                issue = %notification.issue,
                                kind = notification.kind,
                                "notification delivered"
                            );
                        }
                        Err(error) => {
                            warn!(
                                issue = %notification.issue,
                                kind = notification.kind,
                                error = %error,
                                "notification delivery failed"
                            );
                        }
                    }
                }
            })
            .expect("spawn notification worker");
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Queue a notification. Never blocks and never fails the caller.
    pub fn dispatch(&self, notification: Notification) {
        let Some(tx) = self.tx.as_ref() else {
            warn!("dispatch after shutdown dropped");
            return;
        };
        if tx.send(notification).is_err() {
            warn!("notification worker is gone; notification dropped");
        }
    }
}

impl Drop for NotificationDispatcher {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop; join drains the queue.
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("notification worker panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(kind: &'static str) -> Notification {
        Notification {
            target: NotifyTarget::Role(Role::Manager),
            issue: IssueId::new("gr-notify000001"),
            kind,
            message: "a grievance needs attention".to_string(),
        }
    }

    #[test]
    fn test_dispatched_notifications_arrive_before_shutdown_completes() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = NotificationDispatcher::spawn(Arc::clone(&sink) as _);
        dispatcher.dispatch(notification("issue.assign"));
        dispatcher.dispatch(notification("issue.escalate"));
        drop(dispatcher);

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 2);
        assert_eq!(delivered[0].kind, "issue.assign");
        assert_eq!(delivered[1].kind, "issue.escalate");
    }

    #[test]
    fn test_failing_sink_does_not_stop_the_worker() {
        struct FlakySink {
            inner: Arc<MemorySink>,
        }
        impl NotificationSink for FlakySink {
            fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
                if notification.kind == "issue.escalate" {
                    anyhow::bail!("smtp down");
                }
                self.inner.deliver(notification)
            }
        }

        let inner = Arc::new(MemorySink::new());
        let dispatcher = NotificationDispatcher::spawn(Arc::new(FlakySink {
            inner: Arc::clone(&inner),
        }));
        dispatcher.dispatch(notification("issue.escalate"));
        dispatcher.dispatch(notification("issue.resolve"));
        drop(dispatcher);

        let delivered = inner.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].kind, "issue.resolve");
    }
}
