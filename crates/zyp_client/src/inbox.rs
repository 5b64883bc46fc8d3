//! Inbox reconciliation engine.
//!
//! Owns the cached inbox. One reconciler task feeds frames through
//! `reconcile` strictly in arrival order; every pass runs to completion
//! (merge, filter, sort, snapshot) before the next frame is taken.
//! Consumers only ever receive owned snapshots, never a handle into the
//! live cache.

use serde_json::Value;
use tracing::{debug, info};

use zyp_proto::{
    merge, normalize,
    order::{retain_open, sort_by_modified},
    EventKind, InboxChange, InboxSnapshot, Message, ProtoError, RawConversation,
};

use crate::error::ClientError;
use crate::session::Session;

/// Why a frame produced no snapshot. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Literal "fail" frame, a transport-level signal.
    TransportSentinel,
    /// Addressed to a different identity; expected under fan-out.
    Misrouted,
    /// Unknown thread and the notification kind does not open one.
    NotAdmitted,
}

#[derive(Debug)]
pub enum ReconcileOutcome {
    Applied(InboxSnapshot),
    Discarded(DiscardReason),
}

#[derive(Default)]
pub struct Inbox {
    entries: Vec<Message>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.entries
    }

    /// Merge one notification frame into the cached inbox.
    ///
    /// On a malformed frame the cache is left untouched and the error is
    /// returned for the caller to signal.
    pub fn reconcile(
        &mut self,
        frame: &str,
        session: &Session,
    ) -> Result<ReconcileOutcome, ClientError> {
        if frame == "fail" {
            debug!("[inbox] transport sentinel frame, ignoring");
            return Ok(ReconcileOutcome::Discarded(DiscardReason::TransportSentinel));
        }

        let raw: RawConversation = serde_json::from_str(frame)
            .map_err(|e| ProtoError::MalformedPayload(format!("notification frame: {e}")))?;
        let kind = raw.kind();
        let alert = kind != EventKind::UpdateEvent && raw.intended_recipient != raw.originator;

        let me = session.zyp_id();
        if raw.intended_recipient.as_deref() != me.as_deref() {
            debug!(
                "[inbox] notification for {:?}, but the current identity is {:?}; dropping",
                raw.intended_recipient, me
            );
            return Ok(ReconcileOutcome::Discarded(DiscardReason::Misrouted));
        }
        info!(
            "[inbox] notification for {}: {}",
            me.as_deref().unwrap_or("-"),
            raw.kind.as_deref().unwrap_or("-")
        );

        if let Some(i) = self.entries.iter().position(|m| m.id == raw.id) {
            let update = Message::from_raw(&raw, me.as_deref())?;
            self.entries[i] = merge(&self.entries[i], &update, kind, me.as_deref());
        } else {
            // A closed NEW thread is stale by the time it arrives; FORWARD
            // and DELEGATE always enter and are dropped again below if
            // already closed.
            let admitted = match kind {
                EventKind::New => raw.state.open,
                EventKind::Forward | EventKind::Delegate => true,
                _ => false,
            };
            if !admitted {
                debug!("[inbox] no matching thread for {} ({:?}), dropping", raw.id, kind);
                return Ok(ReconcileOutcome::Discarded(DiscardReason::NotAdmitted));
            }
            self.entries.push(Message::from_raw(&raw, me.as_deref())?);
        }

        retain_open(&mut self.entries);
        sort_by_modified(&mut self.entries);

        Ok(ReconcileOutcome::Applied(InboxSnapshot {
            alert,
            id: session.identity(),
            change: Some(InboxChange {
                message_id: raw.id.clone(),
                kind: raw.kind.clone().unwrap_or_default(),
            }),
            message_list: self.entries.clone(),
        }))
    }

    /// Replace the cached inbox wholesale from a full list fetch. Closed
    /// threads are kept here; only reconciliation filters them.
    pub fn refresh(
        &mut self,
        entries: Vec<Value>,
        session: &Session,
    ) -> Result<InboxSnapshot, ClientError> {
        let me = session.zyp_id();
        let mut list = Vec::with_capacity(entries.len());
        for value in entries {
            list.push(normalize(value, me.as_deref())?);
        }
        sort_by_modified(&mut list);
        self.entries = list;

        Ok(InboxSnapshot {
            alert: false,
            id: session.identity(),
            change: None,
            message_list: self.entries.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CurrentUser;
    use serde_json::json;

    fn session_for(zyp_id: &str) -> Session {
        let session = Session::new();
        session.set_current(Some(CurrentUser {
            zyp_id: zyp_id.to_string(),
            enterprise_id: Some(format!("ent-{zyp_id}")),
            token: None,
            enterprises_uuid: None,
            first_time_login: false,
        }));
        session.set_logged_in(true);
        session
    }

    fn new_frame(id: &str, recipient: &str, originator: &str, modified: &str) -> String {
        json!({
            "id": id,
            "type": "NEW",
            "intendedRecipient": recipient,
            "originator": originator,
            "disposition": "DELIVERED",
            "allowableActions": ["ACCEPT", "REJECT"],
            "time": {"created": modified, "modified": modified, "ttl": -1},
            "envelope": {
                "origin": {"_id": originator},
                "members": [{"_id": originator}, {"_id": recipient}],
                "pattern": "STANDARD",
                "latestMember": originator
            },
            "state": {"startMemberCount": 1, "open": true, "members": [
                {"member": {"_id": originator}, "lastEvent": "SENT"},
                {"member": {"_id": recipient}, "lastEvent": "SENT"}
            ]}
        })
        .to_string()
    }

    fn applied(outcome: ReconcileOutcome) -> InboxSnapshot {
        match outcome {
            ReconcileOutcome::Applied(snapshot) => snapshot,
            other => panic!("expected a snapshot, got {other:?}"),
        }
    }

    #[test]
    fn transport_sentinel_is_ignored() {
        let mut inbox = Inbox::new();
        let outcome = inbox.reconcile("fail", &session_for("a")).unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::TransportSentinel)
        ));
        assert!(inbox.messages().is_empty());
    }

    #[test]
    fn misrouted_frame_is_silently_dropped() {
        let mut inbox = Inbox::new();
        let frame = new_frame("c-1", "someone-else", "b", "2026-03-01T10:00:00Z");
        let outcome = inbox.reconcile(&frame, &session_for("a")).unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::Misrouted)
        ));
        assert!(inbox.messages().is_empty());
    }

    #[test]
    fn malformed_frame_leaves_state_unchanged() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("c-1", "a", "b", "2026-03-01T10:00:00Z"), &session)
            .unwrap();

        let err = inbox.reconcile("{\"id\": \"c-2\"}", &session).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Malformed(ProtoError::MalformedPayload(_))
        ));
        assert_eq!(inbox.messages().len(), 1);
    }

    #[test]
    fn new_notification_opens_a_thread_with_alert() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        let snapshot = applied(
            inbox
                .reconcile(&new_frame("c-1", "a", "b", "2026-03-01T10:00:00Z"), &session)
                .unwrap(),
        );

        assert!(snapshot.alert);
        assert_eq!(snapshot.message_list.len(), 1);
        assert_eq!(snapshot.id.zyp_id.as_deref(), Some("a"));
        let change = snapshot.change.unwrap();
        assert_eq!(change.message_id, "c-1");
        assert_eq!(change.kind, "NEW");
        // The invariant holds on everything a snapshot carries.
        for m in &snapshot.message_list {
            assert_eq!(m.state.cur_member_count, m.envelope.active.len() as i64);
        }
    }

    #[test]
    fn closed_new_thread_is_not_admitted() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        let frame = json!({
            "id": "c-9",
            "type": "NEW",
            "intendedRecipient": "a",
            "originator": "b",
            "allowableActions": [],
            "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:00:00Z"},
            "envelope": {"origin": {"_id": "b"}, "members": [{"_id": "a"}]},
            "state": {"open": false, "members": []}
        })
        .to_string();

        let outcome = inbox.reconcile(&frame, &session).unwrap();
        assert!(matches!(
            outcome,
            ReconcileOutcome::Discarded(DiscardReason::NotAdmitted)
        ));
        assert!(inbox.messages().is_empty());
    }

    #[test]
    fn leave_closes_and_filters_the_thread() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("m-1", "a", "b", "2026-03-01T10:00:00Z"), &session)
            .unwrap();
        assert_eq!(inbox.messages().len(), 1);

        let leave = json!({
            "id": "m-1",
            "type": "LEAVE",
            "intendedRecipient": "a",
            "originator": "b",
            "allowableActions": [],
            "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:05:00Z"},
            "envelope": {"origin": {"_id": "b"}, "members": [{"_id": "b"}], "latestMember": "b"},
            "state": {"startMemberCount": 1, "open": false, "leaves": 1, "members": [
                {"member": {"_id": "b"}, "lastEvent": "LEFT"}
            ]}
        })
        .to_string();

        let snapshot = applied(inbox.reconcile(&leave, &session).unwrap());
        assert!(snapshot.alert);
        assert!(snapshot.message_list.is_empty());
        assert!(inbox.messages().is_empty());
    }

    #[test]
    fn self_update_event_does_not_alert() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("c-1", "a", "b", "2026-03-01T10:00:00Z"), &session)
            .unwrap();

        let update = json!({
            "id": "c-1",
            "type": "UPDATE_EVENT",
            "intendedRecipient": "a",
            "originator": "a",
            "disposition": "READ",
            "time": {"created": "2026-03-01T10:00:00Z", "modified": "2026-03-01T10:06:00Z"},
            "state": {"startMemberCount": 1, "open": true, "members": [
                {"member": {"_id": "a"}, "lastEvent": "OPENED"},
                {"member": {"_id": "b"}, "lastEvent": "SENT"}
            ]}
        })
        .to_string();

        let snapshot = applied(inbox.reconcile(&update, &session).unwrap());
        assert!(!snapshot.alert);
        assert_eq!(snapshot.message_list.len(), 1);
        let m = &snapshot.message_list[0];
        // Envelope survives the bare update; the derived count tracks it.
        assert_eq!(m.envelope.active.len(), 2);
        assert_eq!(m.state.cur_member_count, 2);
        assert_eq!(m.envelope.originator.as_ref().unwrap().zyp_id, "b");
    }

    #[test]
    fn snapshots_sort_newest_first() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("c-old", "a", "b", "2026-03-01T10:00:00Z"), &session)
            .unwrap();
        let snapshot = applied(
            inbox
                .reconcile(&new_frame("c-new", "a", "b", "2026-03-01T11:00:00Z"), &session)
                .unwrap(),
        );
        let ids: Vec<&str> = snapshot.message_list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c-new", "c-old"]);
    }

    #[test]
    fn refresh_replaces_the_cache_without_alert() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("gone", "a", "b", "2026-03-01T09:00:00Z"), &session)
            .unwrap();

        let list = vec![
            serde_json::from_str::<Value>(&new_frame("c-1", "a", "b", "2026-03-01T10:00:00Z"))
                .unwrap(),
            serde_json::from_str::<Value>(&new_frame("c-2", "a", "b", "2026-03-01T12:00:00Z"))
                .unwrap(),
        ];
        let snapshot = inbox.refresh(list, &session).unwrap();

        assert!(!snapshot.alert);
        assert!(snapshot.change.is_none());
        let ids: Vec<&str> = snapshot.message_list.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["c-2", "c-1"]);
    }

    #[test]
    fn refresh_with_malformed_entry_keeps_the_cache() {
        let mut inbox = Inbox::new();
        let session = session_for("a");
        inbox
            .reconcile(&new_frame("c-1", "a", "b", "2026-03-01T10:00:00Z"), &session)
            .unwrap();

        let err = inbox
            .refresh(vec![json!({"id": "broken", "allowableActions": []})], &session)
            .unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)));
        assert_eq!(inbox.messages().len(), 1);
        assert_eq!(inbox.messages()[0].id, "c-1");
    }
}
