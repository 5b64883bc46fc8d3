//! Notification sink registry for the streaming connection.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

struct Observer {
    name: String,
    sink: mpsc::UnboundedSender<String>,
}

/// Named notification sinks. Registration and removal are keyed by name;
/// registering a name twice is a no-op.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Mutex<Vec<Observer>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, sink: mpsc::UnboundedSender<String>) {
        let mut observers = self.observers.lock();
        if observers.iter().any(|o| o.name == name) {
            return;
        }
        observers.push(Observer {
            name: name.to_string(),
            sink,
        });
    }

    pub fn unregister(&self, name: &str) {
        self.observers.lock().retain(|o| o.name != name);
    }

    /// Deliver a frame to every sink in registration order. A sink whose
    /// receiver has gone away is skipped, never an error.
    pub fn notify(&self, frame: &str) {
        for observer in self.observers.lock().iter() {
            if observer.sink.send(frame.to_string()).is_err() {
                warn!("[ws] observer {} has gone away, skipping", observer.name);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }
}
