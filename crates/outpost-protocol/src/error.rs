//! Error types for the protocol layer.
//!
//! Every decoding failure is recoverable: the offending record (or the
//! offending entry inside a batch) is dropped and processing continues.

/// Errors that can occur while decoding records.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The wire string had no fields at all.
    #[error("empty record")]
    Empty,

    /// The verb is not one this side of the protocol understands.
    #[error("unknown verb `{0}`")]
    UnknownVerb(String),

    /// A positional field the verb requires is absent.
    #[error("`{verb}` record is missing field {index}")]
    MissingField { verb: String, index: usize },

    /// A field that must be numeric is not.
    #[error("`{verb}` field {index} is not a number: `{value}`")]
    InvalidNumber {
        verb: String,
        index: usize,
        value: String,
    },

    /// A settlement sync entry is not a `tile:name:faction` triple.
    #[error("malformed settlement entry `{entry}`: {reason}")]
    MalformedEntry { entry: String, reason: String },

    /// The message is invalid at the protocol level.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
