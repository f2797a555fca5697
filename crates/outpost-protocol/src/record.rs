//! The already-decoded record: an ordered list of fields.

use std::str::FromStr;

use crate::{FIELD_SEPARATOR, ProtocolError};

/// One record as it appears on the wire, split into its fields.
///
/// Field 0 is the verb. Trailing empty fields (produced by a trailing
/// separator such as `Promote│`) are not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<String>,
}

impl Record {
    /// Builds a record from a verb followed by its payload fields.
    pub fn new<I, S>(verb: &str, payload: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields = vec![verb.to_string()];
        fields.extend(payload.into_iter().map(Into::into));
        Self { fields }
    }

    /// Builds a record from already-split fields.
    pub fn from_fields(mut fields: Vec<String>) -> Result<Self, ProtocolError> {
        while fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        if fields.first().is_none_or(|verb| verb.is_empty()) {
            return Err(ProtocolError::Empty);
        }
        Ok(Self { fields })
    }

    /// The verb selecting this record's handler.
    pub fn verb(&self) -> &str {
        &self.fields[0]
    }

    /// All fields, verb included.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Number of fields, verb included.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always `false`: a record carries at least its verb.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns field `index`, or [`ProtocolError::MissingField`].
    pub fn field(&self, index: usize) -> Result<&str, ProtocolError> {
        self.fields
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| ProtocolError::MissingField {
                verb: self.verb().to_string(),
                index,
            })
    }

    /// Parses field `index` as a number.
    pub fn number<T: FromStr>(&self, index: usize) -> Result<T, ProtocolError> {
        let raw = self.field(index)?;
        raw.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
            verb: self.verb().to_string(),
            index,
            value: raw.to_string(),
        })
    }

    /// Rejoins every field from `index` onward.
    ///
    /// Free-text payloads are always the last field; if the text itself
    /// contained the separator it was split on decode and is restored here.
    pub fn rest(&self, index: usize) -> Result<String, ProtocolError> {
        self.field(index)?;
        let mut sep = [0u8; 4];
        Ok(self.fields[index..].join(FIELD_SEPARATOR.encode_utf8(&mut sep)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_fields_drops_trailing_empty_fields() {
        let record = Record::from_fields(fields(&["Promote", ""])).unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record.verb(), "Promote");
    }

    #[test]
    fn test_from_fields_empty_verb_is_rejected() {
        assert_eq!(
            Record::from_fields(fields(&["", ""])),
            Err(ProtocolError::Empty)
        );
        assert_eq!(Record::from_fields(Vec::new()), Err(ProtocolError::Empty));
    }

    #[test]
    fn test_number_non_numeric_reports_field() {
        let record = Record::new("Settlement", ["Remove", "abc"]);
        assert_eq!(
            record.number::<u32>(2),
            Err(ProtocolError::InvalidNumber {
                verb: "Settlement".into(),
                index: 2,
                value: "abc".into(),
            })
        );
    }

    #[test]
    fn test_field_out_of_range_is_missing() {
        let record = Record::new("Notification", Vec::<String>::new());
        assert!(matches!(
            record.field(1),
            Err(ProtocolError::MissingField { index: 1, .. })
        ));
    }

    #[test]
    fn test_rest_rejoins_split_text() {
        let record = Record::new("ChatMessage", ["SERVER", "a", "b"]);
        assert_eq!(record.rest(2).unwrap(), "a│b");
    }
}
