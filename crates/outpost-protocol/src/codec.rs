//! Codec trait and the delimited-text implementation.
//!
//! A "codec" converts between wire strings and [`Record`]s. The rest of
//! the system only ever sees decoded records or typed messages; swapping
//! the separator scheme means swapping the codec, nothing else.

use crate::{FIELD_SEPARATOR, PeerRecord, ProtocolError, Record, ServerRecord};

/// Converts between wire strings and [`Record`]s.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Joins a record into its wire string.
    fn encode(&self, record: &Record) -> String;

    /// Splits a wire string into a record.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Empty`] when the string has no verb.
    fn decode(&self, raw: &str) -> Result<Record, ProtocolError>;

    /// Encodes a server → peer message.
    fn encode_server(&self, message: &ServerRecord) -> String {
        self.encode(&message.to_record())
    }

    /// Decodes a server → peer message.
    fn decode_server(&self, raw: &str) -> Result<ServerRecord, ProtocolError> {
        ServerRecord::from_record(&self.decode(raw)?)
    }

    /// Encodes a peer → server message.
    fn encode_peer(&self, message: &PeerRecord) -> String {
        self.encode(&message.to_record())
    }

    /// Decodes a peer → server message.
    fn decode_peer(&self, raw: &str) -> Result<PeerRecord, ProtocolError> {
        PeerRecord::from_record(&self.decode(raw)?)
    }
}

/// A [`Codec`] that joins fields with a single separator character.
///
/// The default separator is [`FIELD_SEPARATOR`].
///
/// ```rust
/// use outpost_protocol::{Codec, DelimitedCodec, ServerRecord};
///
/// let codec = DelimitedCodec::default();
/// let wire = codec.encode_server(&ServerRecord::Notification {
///     text: "Server restarting".into(),
/// });
/// assert_eq!(wire, "Notification│Server restarting");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DelimitedCodec {
    separator: char,
}

impl DelimitedCodec {
    /// Creates a codec using a custom separator.
    pub fn with_separator(separator: char) -> Self {
        Self { separator }
    }
}

impl Default for DelimitedCodec {
    fn default() -> Self {
        Self::with_separator(FIELD_SEPARATOR)
    }
}

impl Codec for DelimitedCodec {
    fn encode(&self, record: &Record) -> String {
        let mut out = String::new();
        for (i, field) in record.fields().iter().enumerate() {
            if i > 0 {
                out.push(self.separator);
            }
            out.push_str(field);
        }
        // Marker-only records keep their trailing separator on the wire.
        if record.len() == 1 {
            out.push(self.separator);
        }
        out
    }

    fn decode(&self, raw: &str) -> Result<Record, ProtocolError> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        Record::from_fields(raw.split(self.separator).map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_marker_only_record_keeps_trailing_separator() {
        let codec = DelimitedCodec::default();
        assert_eq!(codec.encode(&Record::new("Promote", Vec::<String>::new())), "Promote│");
    }

    #[test]
    fn test_decode_splits_positional_fields() {
        let codec = DelimitedCodec::default();
        let record = codec.decode("Settlement│Add│4821│Steve").unwrap();
        assert_eq!(record.verb(), "Settlement");
        assert_eq!(record.field(2).unwrap(), "4821");
        assert_eq!(record.field(3).unwrap(), "Steve");
    }

    #[test]
    fn test_decode_strips_line_ending() {
        let codec = DelimitedCodec::default();
        let record = codec.decode("Ping│\r\n").unwrap();
        assert_eq!(record.verb(), "Ping");
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_decode_empty_string_is_error() {
        let codec = DelimitedCodec::default();
        assert_eq!(codec.decode(""), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_custom_separator() {
        let codec = DelimitedCodec::with_separator('|');
        let record = codec.decode("Notification|hi").unwrap();
        assert_eq!(codec.encode(&record), "Notification|hi");
    }
}
