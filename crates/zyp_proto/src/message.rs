//! Canonical message model and the normalization pass that produces it.
//!
//! A `Message` is one conversation thread as the client caches it. It is
//! built exactly once per raw payload; reconciliation never mutates a
//! message in place, it merges two canonical messages into a fresh one
//! (see `merge`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtoError;
use crate::raw::{member_event, EventKind, RawConversation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeInfo {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// `-1` means the message never expires.
    pub ttl: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRef {
    pub zyp_id: String,
    pub enterprise_id: Option<String>,
}

/// Thread metadata. Fields are optional where a notification may leave
/// them unset; merge fills those from the prior cached state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Envelope {
    pub originator: Option<MemberRef>,
    pub active: Vec<String>,
    pub pattern: Option<String>,
    pub priority: Option<i64>,
    pub last_modified_by: Option<String>,
    /// Derived from the current identity, never taken from the server.
    pub is_mine: bool,
    pub allowable_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub member: MemberRef,
    pub event_time: Option<DateTime<Utc>>,
    pub last_event: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThreadState {
    pub start_member_count: i64,
    pub cur_member_count: i64,
    pub leaves: i64,
    pub delegates: i64,
    pub forwards: i64,
    pub oks: i64,
    pub rejects: i64,
    pub accepts: i64,
    pub max_accepts: i64,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEntry {
    pub created: DateTime<Utc>,
    /// Member that authored this entry. Absent when the originating
    /// notification did not identify one.
    pub origin: Option<String>,
    pub content: String,
}

/// One conversation thread, normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub time: TimeInfo,
    pub envelope: Envelope,
    pub participants: Vec<Participant>,
    pub state: ThreadState,
    pub content: Vec<ContentEntry>,
}

impl Message {
    /// Normalize a raw server payload into a canonical message.
    ///
    /// `me` is the zyp id of the logged-in identity; it drives the
    /// `is_mine` derivation and the self-removal check on ACCEPT events.
    pub fn from_raw(raw: &RawConversation, me: Option<&str>) -> Result<Message, ProtoError> {
        let mut envelope = Envelope::default();
        let mut open = raw.state.open;

        if let Some(env) = &raw.envelope {
            // Full broadcast: NEW, FORWARD, DELEGATE, and any update that
            // carries its envelope.
            let owner = env.origin.member_id().ok_or_else(|| {
                ProtoError::MalformedPayload(format!(
                    "envelope origin has no member id (message {})",
                    raw.id
                ))
            })?;
            envelope.originator = Some(MemberRef {
                zyp_id: owner.to_string(),
                enterprise_id: env.origin.original_id.clone(),
            });
            envelope.active = env
                .members
                .iter()
                .filter_map(|m| m.member_id().map(str::to_string))
                .collect();
            envelope.pattern = env.pattern.clone();
            envelope.priority = env.priority;
            envelope.last_modified_by = env.latest_member.clone();
            envelope.is_mine = me == Some(owner);
            envelope.allowable_actions = raw.allowable_actions.clone().unwrap_or_default();
        } else {
            match raw.kind() {
                EventKind::Accept => {
                    // Active membership is decided by each member's last
                    // event alone. A REMOVED marker for the current
                    // identity closes the thread locally.
                    for p in &raw.state.members {
                        let Some(member_id) = p.member.member_id() else {
                            continue;
                        };
                        match p.last_event.as_deref() {
                            Some(member_event::ACCEPTED) | Some(member_event::SENT) => {
                                envelope.active.push(member_id.to_string());
                            }
                            Some(member_event::REMOVED) if Some(member_id) == me => {
                                open = false;
                            }
                            _ => {}
                        }
                    }
                    envelope.allowable_actions =
                        raw.allowable_actions.clone().unwrap_or_default();
                }
                EventKind::Reject => {
                    for p in &raw.state.members {
                        let Some(member_id) = p.member.member_id() else {
                            continue;
                        };
                        if p.last_event.as_deref() != Some(member_event::REJECTED) {
                            envelope.active.push(member_id.to_string());
                        }
                    }
                    envelope.allowable_actions =
                        raw.allowable_actions.clone().unwrap_or_default();
                }
                _ => {
                    // Bare update event: only the last modifier is known
                    // here, the rest of the envelope comes from merge.
                    envelope.last_modified_by = raw.originator.clone();
                }
            }
        }

        // Participants are rebuilt in full on every pass, whatever the
        // branch above did.
        let participants = raw
            .state
            .members
            .iter()
            .filter_map(|p| {
                p.member.member_id().map(|id| Participant {
                    member: MemberRef {
                        zyp_id: id.to_string(),
                        enterprise_id: p.member.original_id.clone(),
                    },
                    event_time: p.event_time,
                    last_event: p.last_event.clone(),
                })
            })
            .collect();

        let mut content = Vec::new();
        if let Some(c) = &raw.content {
            content.push(ContentEntry {
                created: raw.time.created,
                origin: envelope.originator.as_ref().map(|o| o.zyp_id.clone()),
                content: c.message.clone().unwrap_or_default(),
            });
            for reply in &c.replies {
                content.push(ContentEntry {
                    created: reply.created,
                    origin: reply.origin.member_id().map(str::to_string),
                    content: reply.content.clone(),
                });
            }
        }

        let state = ThreadState {
            // The server excludes the originator from the initial count;
            // the client re-adds it. Raw payloads only, so normalizing is
            // single-shot safe.
            start_member_count: raw.state.start_member_count + 1,
            cur_member_count: envelope.active.len() as i64,
            leaves: raw.state.leaves,
            delegates: raw.state.delegates,
            forwards: raw.state.forwards,
            oks: raw.state.oks,
            rejects: raw.state.rejects,
            accepts: raw.state.accepts,
            max_accepts: raw.state.max_accepts,
            open,
        };

        Ok(Message {
            id: raw.id.clone(),
            time: TimeInfo {
                created: raw.time.created,
                modified: raw.time.modified,
                ttl: raw.time.ttl(),
            },
            envelope,
            participants,
            state,
            content,
        })
    }

    /// Re-establish the derived parts of the state after a merge or a
    /// canonical round-trip. Idempotent.
    pub fn renormalize(&mut self) {
        self.state.cur_member_count = self.envelope.active.len() as i64;
    }
}

/// Normalize any server payload: raw payloads (recognized by carrying a
/// `disposition` or `allowableActions`) go through the full branch logic;
/// anything else is treated as an already-canonical document whose derived
/// state is recomputed.
pub fn normalize(value: serde_json::Value, me: Option<&str>) -> Result<Message, ProtoError> {
    let already_canonical =
        value.get("disposition").is_none() && value.get("allowableActions").is_none();
    if already_canonical {
        let mut msg: Message = serde_json::from_value(value)
            .map_err(|e| ProtoError::MalformedPayload(format!("canonical payload: {e}")))?;
        msg.renormalize();
        Ok(msg)
    } else {
        let raw: RawConversation = serde_json::from_value(value)
            .map_err(|e| ProtoError::MalformedPayload(format!("raw payload: {e}")))?;
        Message::from_raw(&raw, me)
    }
}

/// The owner of an inbox snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub enterprise_id: Option<String>,
    pub zyp_id: Option<String>,
}

/// What changed in a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxChange {
    pub message_id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The consolidated view handed to consumers after every reconciliation
/// pass and every full refresh. `change` is absent in the refresh case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxSnapshot {
    pub alert: bool,
    pub id: IdentityRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<InboxChange>,
    pub message_list: Vec<Message>,
}
