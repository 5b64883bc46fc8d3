use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    /// The payload could not be interpreted as either a raw server
    /// conversation or a canonical message. No partial message is produced.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}
