//! Inbox ordering and filtering.

use crate::message::Message;

/// Sort newest-modified first. Equal timestamps fall back to ascending id
/// so the order is deterministic and re-sorting is a no-op.
pub fn sort_by_modified(messages: &mut [Message]) {
    messages.sort_by(|l, r| {
        r.time
            .modified
            .cmp(&l.time.modified)
            .then_with(|| l.id.cmp(&r.id))
    });
}

/// Drop every closed thread.
pub fn retain_open(messages: &mut Vec<Message>) {
    messages.retain(|m| m.state.open);
}
