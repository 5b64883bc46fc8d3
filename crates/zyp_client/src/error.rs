use thiserror::Error;

use crate::api::ApiError;
use zyp_proto::ProtoError;

/// Failure taxonomy of the client core. None of these are fatal: every
/// variant degrades to an emitted error signal and a best-effort fallback
/// state at the call boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Action {action} is not allowed on message {message_id}")]
    ActionNotAllowed { action: String, message_id: String },

    #[error(transparent)]
    Malformed(#[from] ProtoError),

    #[error(transparent)]
    Transport(#[from] ApiError),
}
