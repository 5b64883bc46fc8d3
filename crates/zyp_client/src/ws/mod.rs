//! Realtime notification channel.
//!
//! `WsChannel` owns the pieces with a lifecycle: the reconnecting socket,
//! the handshake worker task, the keepalive task, and the observer
//! registry. Connect and close are explicit; nothing here is ambient
//! state.

mod registry;
mod socket;
mod worker;

pub use registry::ObserverRegistry;
pub use socket::{RawSocket, ReadyState, ReconnectingSocket, SocketEvent};
pub use worker::{HandshakeState, SocketWorker};

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::Events;

struct ActiveConnection {
    socket: Arc<ReconnectingSocket>,
    worker: JoinHandle<()>,
    keepalive: JoinHandle<()>,
}

pub struct WsChannel {
    events: Events,
    registry: Arc<ObserverRegistry>,
    ws_url: String,
    keepalive_interval: Duration,
    reconnect_delay: Duration,
    active: Mutex<Option<ActiveConnection>>,
}

impl WsChannel {
    pub fn new(
        events: Events,
        ws_url: String,
        keepalive_interval: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            events,
            registry: Arc::new(ObserverRegistry::new()),
            ws_url,
            keepalive_interval,
            reconnect_delay,
            active: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> Arc<ObserverRegistry> {
        self.registry.clone()
    }

    /// Open the realtime connection, register `sink` under `observer`, and
    /// start the handshake worker and keepalive loop.
    pub fn connect(&self, token: &str, observer: &str, sink: mpsc::UnboundedSender<String>) {
        self.close(observer);
        self.registry.register(observer, sink);

        let (socket, event_rx) =
            ReconnectingSocket::connect(self.ws_url.clone(), self.reconnect_delay);

        let dyn_socket: Arc<dyn RawSocket> = socket.clone();
        let worker = tokio::spawn(
            SocketWorker::new(token.to_string(), dyn_socket.clone(), self.registry.clone())
                .run(event_rx),
        );
        let keepalive = tokio::spawn(keepalive_loop(
            self.events.clone(),
            Arc::downgrade(&dyn_socket),
            self.keepalive_interval,
        ));

        *self.active.lock() = Some(ActiveConnection {
            socket,
            worker,
            keepalive,
        });
    }

    /// Stop the keepalive loop, close the socket, and unregister the
    /// observer. Anything already in flight elsewhere finishes on its own.
    pub fn close(&self, observer: &str) {
        if let Some(active) = self.active.lock().take() {
            active.socket.close();
            active.keepalive.abort();
            active.worker.abort();
        }
        self.registry.unregister(observer);
    }
}

async fn keepalive_loop(events: Events, socket: Weak<dyn RawSocket>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; the first ping belongs one
    // period after connect.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match socket.upgrade() {
            Some(socket) => {
                let ready = socket.ready_state();
                if ready == ReadyState::Open {
                    socket.send_frame("ping");
                    events.notify(
                        "websocket:connectionUp",
                        json!({"readyState": ready.code()}),
                    );
                } else {
                    events.notify(
                        "websocket:connectionDown",
                        json!({"readyState": ready.code()}),
                    );
                }
            }
            None => events.notify("websocket:noConnection", serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::socket::{RawSocket, ReadyState};
    use parking_lot::Mutex;

    pub(crate) struct FakeSocket {
        state: Mutex<ReadyState>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeSocket {
        pub fn open() -> Self {
            Self {
                state: Mutex::new(ReadyState::Open),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn set_state(&self, state: ReadyState) {
            *self.state.lock() = state;
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    impl RawSocket for FakeSocket {
        fn send_frame(&self, frame: &str) {
            self.sent.lock().push(frame.to_string());
        }

        fn ready_state(&self) -> ReadyState {
            *self.state.lock()
        }

        fn close(&self) {
            *self.state.lock() = ReadyState::Closed;
        }
    }
}
