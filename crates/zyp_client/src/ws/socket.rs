//! Raw socket collaborator.
//!
//! The handshake worker only sees the `RawSocket` trait and the
//! `SocketEvent` stream; `ReconnectingSocket` is the tokio-tungstenite
//! production implementation. Reconnect policy is deliberately minimal: a
//! fixed delay between attempts, with the handshake replayed on every new
//! connection by the worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{info, warn};

/// Connection lifecycle, WebSocket readyState numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closed,
}

impl ReadyState {
    pub fn code(self) -> u8 {
        match self {
            ReadyState::Connecting => 0,
            ReadyState::Open => 1,
            ReadyState::Closed => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum SocketEvent {
    Open,
    Frame(String),
    Closed,
}

/// Text-frame socket surface consumed by the handshake worker and the
/// keepalive loop.
pub trait RawSocket: Send + Sync {
    /// Queue a text frame for sending. Best effort: failures surface as a
    /// `Closed` event, not here.
    fn send_frame(&self, frame: &str);
    fn ready_state(&self) -> ReadyState;
    fn close(&self);
}

pub struct ReconnectingSocket {
    out_tx: mpsc::UnboundedSender<String>,
    state: Arc<Mutex<ReadyState>>,
    shutdown: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl ReconnectingSocket {
    /// Open the socket and return it together with its event stream. The
    /// connection task lives until `close` is called.
    pub fn connect(
        url: String,
        reconnect_delay: Duration,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<SocketEvent>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(ReadyState::Connecting));
        let shutdown = Arc::new(Notify::new());
        let closed = Arc::new(AtomicBool::new(false));

        tokio::spawn(run_connection(
            url,
            reconnect_delay,
            out_rx,
            event_tx,
            state.clone(),
            shutdown.clone(),
            closed.clone(),
        ));

        (
            Arc::new(Self {
                out_tx,
                state,
                shutdown,
                closed,
            }),
            event_rx,
        )
    }
}

impl RawSocket for ReconnectingSocket {
    fn send_frame(&self, frame: &str) {
        let _ = self.out_tx.send(frame.to_string());
    }

    fn ready_state(&self) -> ReadyState {
        *self.state.lock()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *self.state.lock() = ReadyState::Closed;
        self.shutdown.notify_waiters();
    }
}

async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    mut out_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<SocketEvent>,
    state: Arc<Mutex<ReadyState>>,
    shutdown: Arc<Notify>,
    closed: Arc<AtomicBool>,
) {
    loop {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        *state.lock() = ReadyState::Connecting;

        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("[ws] connected to {url}");
                *state.lock() = ReadyState::Open;
                let _ = event_tx.send(SocketEvent::Open);

                let (mut write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        _ = shutdown.notified() => {
                            let _ = write.send(WsMessage::Close(None)).await;
                            break;
                        }
                        frame = out_rx.recv() => match frame {
                            Some(frame) => {
                                if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                                    warn!("[ws] send failed: {e}");
                                    break;
                                }
                            }
                            // Socket handle dropped; nothing left to send.
                            None => break,
                        },
                        inbound = read.next() => match inbound {
                            Some(Ok(WsMessage::Text(text))) => {
                                let _ = event_tx.send(SocketEvent::Frame(text.to_string()));
                            }
                            Some(Ok(WsMessage::Close(_))) | None => {
                                info!("[ws] server closed the connection");
                                break;
                            }
                            // Binary and control frames are not part of the
                            // notification protocol.
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("[ws] read failed: {e}");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => {
                warn!("[ws] connect to {url} failed: {e}");
            }
        }

        *state.lock() = ReadyState::Closed;
        let _ = event_tx.send(SocketEvent::Closed);
        if closed.load(Ordering::SeqCst) {
            break;
        }
        tokio::select! {
            _ = shutdown.notified() => break,
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }
    *state.lock() = ReadyState::Closed;
}
