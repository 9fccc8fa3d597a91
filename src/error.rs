//! Error types for PICA+ operations.
//!
//! This module provides the [`PicaError`] type for all library operations
//! and the [`Result`] convenience type.
//!
//! Errors fall into two groups. Malformed fields and records are
//! *recoverable*: a reader reports them and carries on with the next field or
//! record. Everything else (I/O failures, unparsable XML documents, encoding
//! refusals) ends the current operation.

use thiserror::Error;

/// Error type for all PICA+ library operations.
#[derive(Error, Debug)]
pub enum PicaError {
    /// A single field could not be decoded.
    ///
    /// Raised for a tag or occurrence that does not match the fixed grammar and
    /// for subfield segments without a code. Only the field is lost.
    #[error("Malformed field '{token}': {reason}")]
    MalformedField {
        /// The offending field token (tag and occurrence as found in the input)
        token: String,
        /// What was wrong with it
        reason: String,
    },

    /// A whole record could not be decoded.
    ///
    /// The reader has already skipped to the next record boundary.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// A value contains a character the target format cannot represent.
    #[error("Invalid character {character:?} in {context}")]
    InvalidCharacter {
        /// The rejected character
        character: char,
        /// Where it was found, e.g. `021A$a`
        context: String,
    },

    /// A field selector string could not be parsed.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Misuse of a writer, e.g. writing after `finish`.
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Statistics or records could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error from the underlying source or destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The XML document itself is not well-formed.
    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),
}

impl PicaError {
    /// Shorthand for a [`PicaError::MalformedField`].
    pub fn malformed_field(token: impl Into<String>, reason: impl Into<String>) -> Self {
        PicaError::MalformedField {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Whether decoding can continue after this error.
    ///
    /// Only malformed fields and malformed records are local to one piece of
    /// input; all other errors are terminal for the current source.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PicaError::MalformedField { .. } | PicaError::MalformedRecord(_)
        )
    }
}

impl From<serde_json::Error> for PicaError {
    fn from(err: serde_json::Error) -> Self {
        PicaError::SerializationError(err.to_string())
    }
}

/// Convenience type alias for [`std::result::Result`] with [`PicaError`].
pub type Result<T> = std::result::Result<T, PicaError>;
