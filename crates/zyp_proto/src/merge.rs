//! Typed merge of an update onto a cached message.
//!
//! The merge is field-group by field-group over the explicit schema: time
//! and state follow the update wholesale, participants and content replace
//! the cached sequences when the update rebuilt them, and the envelope
//! merges per field, with unset update fields keeping their prior values.
//! Notification-kind overrides then restore exactness where the generic
//! rules are too coarse.

use crate::message::{Envelope, Message};
use crate::raw::EventKind;

/// Merge `update` onto `existing`, producing a brand-new message.
///
/// `me` is the current identity; `is_mine` is re-derived from the merged
/// originator rather than merged as data.
pub fn merge(existing: &Message, update: &Message, kind: EventKind, me: Option<&str>) -> Message {
    let mut merged = existing.clone();

    merged.time = update.time.clone();
    merged.state = update.state.clone();
    if !update.participants.is_empty() {
        merged.participants = update.participants.clone();
    }
    if !update.content.is_empty() {
        merged.content = update.content.clone();
    }
    merged.envelope = merge_envelope(&existing.envelope, &update.envelope);

    match kind {
        // A LEAVE or OK broadcast carries a complete envelope; take it
        // verbatim.
        EventKind::Leave | EventKind::Ok => {
            merged.envelope = update.envelope.clone();
        }
        // ACCEPT and REJECT recompute membership and permissions but say
        // nothing about the rest of the envelope.
        EventKind::Accept | EventKind::Reject => {
            merged.envelope.active = update.envelope.active.clone();
            merged.envelope.allowable_actions = update.envelope.allowable_actions.clone();
        }
        _ => {}
    }

    merged.envelope.is_mine = match (&merged.envelope.originator, me) {
        (Some(originator), Some(me)) => originator.zyp_id == me,
        _ => false,
    };
    merged.renormalize();
    merged
}

fn merge_envelope(prior: &Envelope, update: &Envelope) -> Envelope {
    Envelope {
        originator: update.originator.clone().or_else(|| prior.originator.clone()),
        active: if update.active.is_empty() {
            prior.active.clone()
        } else {
            update.active.clone()
        },
        pattern: update.pattern.clone().or_else(|| prior.pattern.clone()),
        priority: update.priority.or(prior.priority),
        last_modified_by: update
            .last_modified_by
            .clone()
            .or_else(|| prior.last_modified_by.clone()),
        is_mine: prior.is_mine,
        allowable_actions: if update.allowable_actions.is_empty() {
            prior.allowable_actions.clone()
        } else {
            update.allowable_actions.clone()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::raw::RawConversation;
    use serde_json::json;

    fn from_json(value: serde_json::Value, me: &str) -> Message {
        let raw: RawConversation = serde_json::from_value(value).unwrap();
        Message::from_raw(&raw, Some(me)).unwrap()
    }

    fn cached() -> Message {
        from_json(
            json!({
                "id": "c-1",
                "type": "NEW",
                "allowableActions": ["ACCEPT", "REJECT"],
                "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:00:00Z", "ttl": -1},
                "envelope": {
                    "origin": {"_id": "alice", "originalId": "ent-a"},
                    "members": [{"_id": "alice"}, {"_id": "bob"}],
                    "pattern": "FCFS",
                    "priority": 0,
                    "latestMember": "alice"
                },
                "state": {"startMemberCount": 1, "open": true, "members": [
                    {"member": {"_id": "alice"}, "lastEvent": "SENT"},
                    {"member": {"_id": "bob"}, "lastEvent": "SENT"}
                ]},
                "content": {"message": "anyone?", "replies": []}
            }),
            "alice",
        )
    }

    #[test]
    fn bare_update_keeps_prior_envelope() {
        let existing = cached();
        let update = from_json(
            json!({
                "id": "c-1",
                "type": "UPDATE_EVENT",
                "disposition": "READ",
                "originator": "bob",
                "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:06:00Z"},
                "state": {"startMemberCount": 1, "open": true, "members": [
                    {"member": {"_id": "alice"}, "lastEvent": "SENT"},
                    {"member": {"_id": "bob"}, "lastEvent": "OPENED"}
                ]}
            }),
            "alice",
        );

        let merged = merge(&existing, &update, EventKind::UpdateEvent, Some("alice"));

        // Envelope fields the update left empty survive from the cache.
        assert_eq!(merged.envelope.originator.as_ref().unwrap().zyp_id, "alice");
        assert_eq!(merged.envelope.active, vec!["alice", "bob"]);
        assert_eq!(merged.envelope.pattern.as_deref(), Some("FCFS"));
        assert_eq!(merged.envelope.allowable_actions, vec!["ACCEPT", "REJECT"]);
        // The update's contribution won.
        assert_eq!(merged.envelope.last_modified_by.as_deref(), Some("bob"));
        assert_eq!(merged.time.modified, update.time.modified);
        // Derived state is consistent even though the update's own count
        // was zero.
        assert_eq!(merged.state.cur_member_count, 2);
        assert!(merged.envelope.is_mine);
        // Content was not resent; the cached thread body survives.
        assert_eq!(merged.content.len(), 1);
    }

    #[test]
    fn accept_override_replaces_membership_only() {
        let existing = cached();
        let update = from_json(
            json!({
                "id": "c-1",
                "type": "ACCEPT",
                "allowableActions": ["OK"],
                "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:07:00Z"},
                "state": {"startMemberCount": 1, "open": true, "accepts": 1, "members": [
                    {"member": {"_id": "alice"}, "lastEvent": "SENT"},
                    {"member": {"_id": "bob"}, "lastEvent": "ACCEPTED"}
                ]}
            }),
            "alice",
        );

        let merged = merge(&existing, &update, EventKind::Accept, Some("alice"));

        // The ACCEPT branch computed no originator; the cached one is kept.
        assert_eq!(merged.envelope.originator.as_ref().unwrap().zyp_id, "alice");
        assert!(merged.envelope.is_mine);
        assert_eq!(merged.envelope.pattern.as_deref(), Some("FCFS"));
        // Membership and permissions follow the update.
        assert_eq!(merged.envelope.allowable_actions, vec!["OK"]);
        assert_eq!(merged.state.accepts, 1);
        assert_eq!(merged.state.cur_member_count, merged.envelope.active.len() as i64);
    }

    #[test]
    fn leave_override_replaces_envelope_wholesale() {
        let existing = cached();
        let update = from_json(
            json!({
                "id": "c-1",
                "type": "LEAVE",
                "allowableActions": [],
                "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:08:00Z"},
                "envelope": {
                    "origin": {"_id": "bob"},
                    "members": [{"_id": "bob"}],
                    "pattern": "STANDARD",
                    "latestMember": "bob"
                },
                "state": {"startMemberCount": 1, "open": false, "leaves": 1, "members": [
                    {"member": {"_id": "bob"}, "lastEvent": "SENT"}
                ]}
            }),
            "alice",
        );

        let merged = merge(&existing, &update, EventKind::Leave, Some("alice"));

        assert_eq!(merged.envelope.originator.as_ref().unwrap().zyp_id, "bob");
        assert_eq!(merged.envelope.pattern.as_deref(), Some("STANDARD"));
        assert_eq!(merged.envelope.active, vec!["bob"]);
        assert!(merged.envelope.allowable_actions.is_empty());
        assert!(!merged.envelope.is_mine);
        assert!(!merged.state.open);
        assert_eq!(merged.state.cur_member_count, 1);
    }
}
