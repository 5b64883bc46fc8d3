//! Per-connection handshake state machine.
//!
//! The server speaks first: it prompts with a literal `login` frame, the
//! worker answers with the bearer token, and a literal `ok` opens the
//! stream. Every frame after that is a domain notification and goes to the
//! observer registry verbatim. A socket close rewinds the machine so the
//! handshake replays on the next connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::registry::ObserverRegistry;
use super::socket::{RawSocket, SocketEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingLoginPrompt,
    AwaitingLoginAck,
    Streaming,
}

pub struct SocketWorker {
    token: String,
    state: HandshakeState,
    socket: Arc<dyn RawSocket>,
    registry: Arc<ObserverRegistry>,
}

impl SocketWorker {
    pub fn new(token: String, socket: Arc<dyn RawSocket>, registry: Arc<ObserverRegistry>) -> Self {
        Self {
            token,
            state: HandshakeState::AwaitingLoginPrompt,
            socket,
            registry,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn handle_event(&mut self, event: SocketEvent) {
        match event {
            // The server drives the handshake; nothing to do on open.
            SocketEvent::Open => {}
            SocketEvent::Frame(frame) => self.handle_frame(&frame),
            SocketEvent::Closed => {
                debug!("[ws] connection closed, handshake will replay");
                self.state = HandshakeState::AwaitingLoginPrompt;
            }
        }
    }

    fn handle_frame(&mut self, frame: &str) {
        match self.state {
            HandshakeState::AwaitingLoginPrompt => {
                if frame == "login" {
                    self.socket.send_frame(&self.token);
                    self.state = HandshakeState::AwaitingLoginAck;
                }
            }
            HandshakeState::AwaitingLoginAck => {
                if frame == "ok" {
                    info!("[ws] login acknowledged, streaming notifications");
                    self.state = HandshakeState::Streaming;
                }
            }
            HandshakeState::Streaming => self.registry.notify(frame),
        }
    }

    /// Consume socket events until the event stream ends.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<SocketEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
    }
}
