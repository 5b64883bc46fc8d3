//! Action gatekeeper: validates user-initiated actions against a message's
//! permitted set before anything touches the network.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use zyp_proto::Message;

use crate::api::RestTransport;
use crate::error::ClientError;
use crate::events::Events;
use crate::session::Session;

/// Dispatch `action` on `message`. `data` is action-specific: the target
/// member id for FORWARD and DELEGATE, absent otherwise.
///
/// Returns whether the request was submitted; the eventual result arrives
/// as a `message:update` notification or an error signal. A request in
/// flight is never cancelled.
pub(crate) fn request_update(
    api: Arc<dyn RestTransport>,
    events: Events,
    session: &Session,
    message: &Message,
    action: &str,
    data: Option<String>,
) -> bool {
    if !session.is_logged_in() {
        events.error(ClientError::NotAuthenticated.to_string());
        return false;
    }
    if !message.envelope.allowable_actions.iter().any(|a| a == action) {
        events.error(
            ClientError::ActionNotAllowed {
                action: action.to_string(),
                message_id: message.id.clone(),
            }
            .to_string(),
        );
        return false;
    }

    let path = format!("conversations/{}/{}", message.id, action);
    info!("[update] submitting {path}");
    let body = data.map(Value::String);
    tokio::spawn(async move {
        match api.put(&path, body).await {
            Ok(ack) => events.notify("message:update", ack),
            Err(e) => events.error(format!("Message update failed: {e}")),
        }
    });
    true
}
