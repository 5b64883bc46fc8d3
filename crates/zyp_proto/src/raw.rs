//! Raw server payloads, exactly as they arrive on the wire.
//!
//! The ZypHub server is loose about shape: a notification frame, a
//! conversation fetched over REST, and an update event all share one
//! top-level layout but populate different subsets of it. Member ids may
//! arrive under the Mongo-style `_id` key or a plain `id` key; the
//! time-to-live may be spelled `toLive` or `ttl`. These types absorb all of
//! that so the canonical model never has to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-event markers the normalizer branches on. Other markers pass
/// through to participants verbatim.
pub mod member_event {
    pub const ACCEPTED: &str = "ACCEPTED";
    pub const SENT: &str = "SENT";
    pub const REMOVED: &str = "REMOVED";
    pub const REJECTED: &str = "REJECTED";
}

/// Notification kinds with dedicated handling. Everything else takes the
/// generic update path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    New,
    Forward,
    Delegate,
    Accept,
    Reject,
    Leave,
    Ok,
    UpdateEvent,
    Other,
}

impl EventKind {
    pub fn parse(kind: Option<&str>) -> Self {
        match kind {
            Some("NEW") => Self::New,
            Some("FORWARD") => Self::Forward,
            Some("DELEGATE") => Self::Delegate,
            Some("ACCEPT") => Self::Accept,
            Some("REJECT") => Self::Reject,
            Some("LEAVE") => Self::Leave,
            Some("OK") => Self::Ok,
            Some("UPDATE_EVENT") => Self::UpdateEvent,
            _ => Self::Other,
        }
    }
}

/// A member reference as the server spells it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMemberId {
    /// Primary-key form of the member id.
    #[serde(rename = "_id")]
    pub primary: Option<String>,
    /// Generic form, sent by some endpoints instead of `_id`.
    pub id: Option<String>,
    /// The member's enterprise-side id.
    pub original_id: Option<String>,
}

impl RawMemberId {
    /// Prefer the primary-key field, fall back to the generic id field.
    pub fn member_id(&self) -> Option<&str> {
        self.primary.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTime {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Older endpoints send `toLive`, newer ones `ttl`.
    pub to_live: Option<i64>,
    pub ttl: Option<i64>,
}

impl RawTime {
    /// `-1` means the message never expires.
    pub fn ttl(&self) -> i64 {
        self.to_live.or(self.ttl).unwrap_or(-1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEnvelope {
    pub origin: RawMemberId,
    #[serde(default)]
    pub members: Vec<RawMemberId>,
    pub pattern: Option<String>,
    pub priority: Option<i64>,
    pub latest_member: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawParticipant {
    pub member: RawMemberId,
    pub event_time: Option<DateTime<Utc>>,
    pub last_event: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawState {
    #[serde(default)]
    pub start_member_count: i64,
    #[serde(default)]
    pub cur_member_count: i64,
    #[serde(default)]
    pub leaves: i64,
    #[serde(default)]
    pub delegates: i64,
    #[serde(default)]
    pub forwards: i64,
    #[serde(default)]
    pub oks: i64,
    #[serde(default)]
    pub rejects: i64,
    #[serde(default)]
    pub accepts: i64,
    #[serde(default)]
    pub max_accepts: i64,
    #[serde(default)]
    pub open: bool,
    #[serde(default)]
    pub members: Vec<RawParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReply {
    pub created: DateTime<Utc>,
    pub origin: RawMemberId,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    /// Thread-opening body.
    pub message: Option<String>,
    #[serde(default)]
    pub replies: Vec<RawReply>,
}

/// One server payload: a realtime notification frame, or one entry of a
/// conversation list fetch. `time` and `state` are always present on valid
/// payloads; everything else depends on the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConversation {
    pub id: String,
    pub time: RawTime,
    pub state: RawState,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub disposition: Option<String>,
    pub allowable_actions: Option<Vec<String>>,
    pub envelope: Option<RawEnvelope>,
    pub content: Option<RawContent>,
    /// On bare update events: the member that triggered the update.
    pub originator: Option<String>,
    /// Routing: which inbox this notification is addressed to.
    pub intended_recipient: Option<String>,
}

impl RawConversation {
    pub fn kind(&self) -> EventKind {
        EventKind::parse(self.kind.as_deref())
    }
}
