//! Consumer-facing event fan-out.
//!
//! Every observable outcome of the client leaves through here: inbox
//! snapshots, domain and system notifications, and error signals. Firing
//! never fails; an event with no subscribers is simply dropped.

use tokio::sync::broadcast;

use zyp_proto::InboxSnapshot;

#[derive(Debug, Clone)]
pub enum ZypEvent {
    /// A consolidated inbox view, emitted after every reconciliation pass
    /// and every full refresh.
    Message(InboxSnapshot),
    /// Domain or system notification, e.g. `message:update`,
    /// `websocket:connectionUp`, `login:email`, `logout`.
    Notification {
        topic: String,
        data: serde_json::Value,
    },
    /// Best-effort failure detail.
    Error(String),
}

#[derive(Clone)]
pub struct Events {
    tx: broadcast::Sender<ZypEvent>,
}

impl Events {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ZypEvent> {
        self.tx.subscribe()
    }

    pub fn fire(&self, event: ZypEvent) {
        let _ = self.tx.send(event);
    }

    pub fn message(&self, snapshot: InboxSnapshot) {
        self.fire(ZypEvent::Message(snapshot));
    }

    pub fn notify(&self, topic: &str, data: serde_json::Value) {
        self.fire(ZypEvent::Notification {
            topic: topic.to_string(),
            data,
        });
    }

    pub fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("[events] {message}");
        self.fire(ZypEvent::Error(message));
    }
}

impl Default for Events {
    fn default() -> Self {
        Self::new(64)
    }
}
