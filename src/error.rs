// Precondition-violation errors
//
// Caller contract violations are rejected with a typed error rather than
// silently tolerated. Warnings (insufficient class diversity, channel-count
// mismatch) are logged and never surface here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractError {
    /// `project` was called before any training grew the roster
    #[error("project called on an ensemble with an empty roster")]
    EmptyRoster,

    /// More `train` calls than `acquire` calls for the same identifier
    #[error("training contribution for '{identifier}' exceeds outstanding references")]
    RefCountUnderflow { identifier: String },

    /// Serialized stream ended before its declared contents
    #[error("serialized stream truncated before the declared contents")]
    TruncatedStream,

    /// No constructor registered under the requested name
    #[error("no trainable unit registered under '{name}'")]
    UnknownUnit { name: String },

    /// Wrapper operation requiring an inner unit was called without one
    #[error("wrapper has no inner unit")]
    MissingInner,
}
