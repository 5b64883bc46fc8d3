//! zyp_proto - Wire payloads and canonical message model for the ZypHub client
//!
//! The ZypHub server speaks loosely-shaped JSON; this crate turns it into
//! one canonical, typed representation and defines the merge and ordering
//! rules the inbox engine relies on.
//!
//! # Modules
//! - `raw`     - Server payloads as they arrive on the wire
//! - `message` - Canonical message model and the normalization pass
//! - `merge`   - Typed merge of an update onto a cached message
//! - `order`   - Inbox sorting and closed-thread filtering
//! - `error`   - Normalization failures

pub mod error;
pub mod merge;
pub mod message;
pub mod order;
pub mod raw;

pub use error::ProtoError;
pub use merge::merge;
pub use message::{
    normalize, ContentEntry, Envelope, IdentityRef, InboxChange, InboxSnapshot, MemberRef,
    Message, Participant, ThreadState, TimeInfo,
};
pub use raw::{EventKind, RawConversation};
