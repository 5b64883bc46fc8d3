//! zyp_client - ZypHub client library
//!
//! Maintains a locally cached, eventually-consistent view of a user's
//! conversation inbox against the ZypHub service, kept current over a push
//! notification socket. The canonical message model lives in `zyp_proto`;
//! this crate owns everything with a lifecycle.
//!
//! # Modules
//! - `client`  - The `ZypClient` facade: login, logout, inbox, messaging
//! - `inbox`   - Inbox reconciliation engine
//! - `update`  - Action gatekeeper
//! - `ws`      - Realtime channel: handshake worker, observer registry,
//!   reconnecting socket, keepalive
//! - `session` - Logged-in identity tracking
//! - `api`     - REST transport (trait + reqwest implementation)
//! - `events`  - Consumer-facing event fan-out
//! - `admin`   - Enterprise administration plumbing
//! - `config`  - Configuration with environment overrides
//!
//! All fire-and-forget methods must be called from within a tokio runtime;
//! results and failures come back through the event fan-out
//! (`ZypClient::subscribe`).

pub mod admin;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod inbox;
pub mod session;
mod update;
pub mod util;
pub mod ws;

pub use api::{ApiClient, ApiError, RestTransport};
pub use client::{NewMessage, ZypClient};
pub use config::ZypConfig;
pub use error::ClientError;
pub use events::{Events, ZypEvent};
pub use inbox::{DiscardReason, Inbox, ReconcileOutcome};
pub use session::{CurrentUser, Session};

pub use zyp_proto::{InboxSnapshot, Message};
