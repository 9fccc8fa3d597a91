//! Recovery strategies for records with malformed fields.
//!
//! Readers never abort a record because of one bad field: they drop the field
//! and attach a [`PicaError::MalformedField`] to the [`Decoded`] outcome. The
//! [`RecoveryMode`] decides what the parser does with such a record.

use crate::error::{PicaError, Result};
use crate::formats::Decoded;

/// Strategy for handling records that lost fields during decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    /// Keep the record without its malformed fields (default)
    #[default]
    Lenient,
    /// Reject the whole record if any field was malformed
    Strict,
}

impl RecoveryMode {
    /// Apply the strategy to a decoded record.
    ///
    /// In lenient mode the outcome is returned unchanged; the caller still
    /// sees the dropped fields in [`Decoded::errors`].
    ///
    /// # Errors
    ///
    /// In strict mode, returns [`PicaError::MalformedRecord`] naming the first
    /// malformed field if there is one.
    pub fn apply(self, decoded: Decoded) -> Result<Decoded> {
        if self == RecoveryMode::Strict {
            if let Some(first) = decoded.errors.first() {
                let ppn = decoded.record.ppn().unwrap_or("unknown");
                return Err(PicaError::MalformedRecord(format!(
                    "record {ppn} has {} malformed field(s), first: {first}",
                    decoded.errors.len()
                )));
            }
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, Record};

    fn decoded_with_error() -> Decoded {
        let mut record = Record::new();
        record.append(Field::builder("003@").unwrap().subfield('0', "77").build());
        Decoded {
            record,
            errors: vec![PicaError::malformed_field("99X", "tag does not match")],
        }
    }

    #[test]
    fn test_lenient_keeps_record() {
        let decoded = RecoveryMode::Lenient.apply(decoded_with_error()).unwrap();
        assert_eq!(decoded.record.ppn(), Some("77"));
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn test_strict_rejects_record() {
        let err = RecoveryMode::Strict.apply(decoded_with_error()).unwrap_err();
        assert!(matches!(err, PicaError::MalformedRecord(ref msg) if msg.contains("77")));
    }

    #[test]
    fn test_strict_accepts_clean_record() {
        let clean = Decoded::new(Record::new());
        assert!(RecoveryMode::Strict.apply(clean).is_ok());
        assert_eq!(RecoveryMode::default(), RecoveryMode::Lenient);
    }
}
