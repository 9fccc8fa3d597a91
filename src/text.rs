//! PICA+ text codec.
//!
//! Two dialects are supported:
//!
//! - **Normalized** PICA+, the interchange form. Every field is written as
//!   its token (`021A` or `044K/01`) and a space, followed by subfields that
//!   each start with [`SUBFIELD_SEPARATOR`] and the code, and ends with
//!   [`FIELD_TERMINATOR`]. A record ends with [`RECORD_TERMINATOR`].
//! - **Plain** PICA+, the human-readable form: one field per line
//!   (`021A $aTitle$hAuthor`), records separated by an empty line, a literal
//!   `$` in a value doubled.
//!
//! Decoding is lenient at the field level. A malformed field is dropped and
//! reported through [`Decoded::errors`]; a record that cannot be decoded at
//! all is reported as [`PicaError::MalformedRecord`] after the reader has
//! moved past it.
//!
//! # Examples
//!
//! ```
//! use pica::text::{decode_record, encode_record};
//!
//! let bytes = b"003@ \x1f0123\x1e021A \x1faTitle\x1e\x1d";
//! let decoded = decode_record(bytes).unwrap();
//! assert_eq!(decoded.record.ppn(), Some("123"));
//! assert_eq!(encode_record(&decoded.record).unwrap(), bytes.to_vec());
//! ```

use crate::error::{PicaError, Result};
use crate::formats::{Decoded, FormatReader};
use crate::record::{Field, Record};
use memchr::memchr;
use std::fmt;
use std::io::BufRead;

/// Terminates a record in normalized PICA+.
pub const RECORD_TERMINATOR: u8 = 0x1D;
/// Terminates a field in normalized PICA+.
pub const FIELD_TERMINATOR: u8 = 0x1E;
/// Starts a subfield in normalized PICA+.
pub const SUBFIELD_SEPARATOR: u8 = 0x1F;

const PLAIN_SEPARATOR: char = '$';

/// Which textual layout to read or write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextDialect {
    /// Control-marker delimited interchange format
    #[default]
    Normalized,
    /// Line-oriented, `$`-delimited format
    Plain,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode one normalized record.
///
/// `data` may include the trailing record terminator and leading line breaks.
///
/// # Errors
///
/// Returns [`PicaError::MalformedRecord`] if the bytes are not UTF-8 or none
/// of the fields can be parsed. Otherwise malformed fields, wherever they
/// appear, are collected in [`Decoded::errors`] and decoding continues.
///
/// A token written without its trailing space (`003@\x1f0...`) is accepted;
/// encoding always writes the space, so such input is normalized rather than
/// reproduced byte for byte.
pub fn decode_record(data: &[u8]) -> Result<Decoded> {
    let data = data.strip_suffix(&[RECORD_TERMINATOR]).unwrap_or(data);
    let data = trim_leading_line_breaks(data);
    let text = std::str::from_utf8(data)
        .map_err(|e| PicaError::MalformedRecord(format!("record is not valid UTF-8: {e}")))?;

    let mut decoded = Decoded::new(Record::new());
    let mut rest = text;
    while !rest.is_empty() {
        let (chunk, terminated) = match memchr(FIELD_TERMINATOR, rest.as_bytes()) {
            Some(pos) => {
                let chunk = &rest[..pos];
                rest = &rest[pos + 1..];
                (chunk, true)
            },
            None => {
                let chunk = rest;
                rest = "";
                (chunk, false)
            },
        };

        let result = if terminated {
            decode_field(chunk)
        } else {
            Err(PicaError::malformed_field(
                field_token(chunk),
                "missing field terminator",
            ))
        };

        match result {
            Ok(field) => decoded.record.append(field),
            Err(err) => decoded.errors.push(err),
        }
    }

    reject_unparseable(decoded)
}

/// Decode one normalized field without its terminator.
///
/// # Errors
///
/// Returns [`PicaError::MalformedField`] if the token does not match the tag
/// grammar or a subfield segment has no valid code.
pub fn decode_field(data: &str) -> Result<Field> {
    let mut segments = data.split(char::from(SUBFIELD_SEPARATOR));
    let token = segments.next().unwrap_or_default();
    let token = token.strip_suffix(' ').unwrap_or(token);

    let (tag, occurrence) = Field::parse_token(token)?;
    let mut field = Field::new(tag, occurrence);

    for segment in segments {
        let mut chars = segment.chars();
        match chars.next() {
            Some(code) if code.is_ascii_alphanumeric() => field.add_subfield(code, chars.as_str()),
            Some(code) => {
                return Err(PicaError::malformed_field(
                    token,
                    format!("invalid subfield code {code:?}"),
                ))
            },
            None => return Err(PicaError::malformed_field(token, "empty subfield")),
        }
    }

    Ok(field)
}

/// Decode one plain record (a block of field lines).
///
/// # Errors
///
/// Returns [`PicaError::MalformedRecord`] if the block is not UTF-8 or none
/// of its lines can be parsed.
pub fn decode_plain_record(data: &[u8]) -> Result<Decoded> {
    let text = std::str::from_utf8(data)
        .map_err(|e| PicaError::MalformedRecord(format!("record is not valid UTF-8: {e}")))?;

    let mut decoded = Decoded::new(Record::new());
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        match decode_plain_field(line) {
            Ok(field) => decoded.record.append(field),
            Err(err) => decoded.errors.push(err),
        }
    }

    reject_unparseable(decoded)
}

/// A record whose every field failed is malformed as a whole; a record with
/// no fields at all is not.
fn reject_unparseable(decoded: Decoded) -> Result<Decoded> {
    if decoded.record.is_empty() {
        if let Some(first) = decoded.errors.first() {
            return Err(PicaError::MalformedRecord(format!(
                "no parseable field ({} malformed, first: {first})",
                decoded.errors.len()
            )));
        }
    }
    Ok(decoded)
}

/// Decode one plain field line such as `044K/01 $aRust$9123`.
///
/// # Errors
///
/// Returns [`PicaError::MalformedField`] for an invalid token, a `$` without
/// a code, or text before the first subfield.
pub fn decode_plain_field(line: &str) -> Result<Field> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    let (token, rest) = match line.find(PLAIN_SEPARATOR) {
        Some(pos) => (&line[..pos], &line[pos..]),
        None => (line, ""),
    };
    let token = token.trim_end();

    let (tag, occurrence) = Field::parse_token(token)?;
    let mut field = Field::new(tag, occurrence);

    let mut chars = rest.chars().peekable();
    let mut current: Option<(char, String)> = None;
    while let Some(c) = chars.next() {
        if c != PLAIN_SEPARATOR {
            match current.as_mut() {
                Some((_, value)) => value.push(c),
                None => return Err(PicaError::malformed_field(token, "text before first subfield")),
            }
            continue;
        }

        // `$$` inside a value is a literal dollar sign
        if current.is_some() && chars.peek() == Some(&PLAIN_SEPARATOR) {
            chars.next();
            if let Some((_, value)) = current.as_mut() {
                value.push(PLAIN_SEPARATOR);
            }
            continue;
        }

        if let Some((code, value)) = current.take() {
            field.add_subfield(code, value);
        }
        match chars.next() {
            Some(code) if code.is_ascii_alphanumeric() => current = Some((code, String::new())),
            Some(code) => {
                return Err(PicaError::malformed_field(
                    token,
                    format!("invalid subfield code {code:?}"),
                ))
            },
            None => return Err(PicaError::malformed_field(token, "empty subfield")),
        }
    }
    if let Some((code, value)) = current {
        field.add_subfield(code, value);
    }

    Ok(field)
}

fn trim_leading_line_breaks(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| b != b'\n' && b != b'\r')
        .unwrap_or(data.len());
    &data[start..]
}

fn field_token(chunk: &str) -> &str {
    let end = memchr(SUBFIELD_SEPARATOR, chunk.as_bytes()).unwrap_or(chunk.len());
    chunk[..end].trim_end()
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a record as normalized PICA+, including the record terminator.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a structural marker.
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(record.len() * 32 + 1);
    for field in record.fields() {
        encode_field(field, &mut out)?;
    }
    out.push(RECORD_TERMINATOR);
    Ok(out)
}

/// Append a normalized field, including its terminator, to `out`.
///
/// Nothing is appended if the field cannot be encoded.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a structural
/// marker or a code is not alphanumeric.
pub fn encode_field(field: &Field, out: &mut Vec<u8>) -> Result<()> {
    validate_field(field, is_marker)?;

    out.extend_from_slice(field.token().as_bytes());
    out.push(b' ');
    for subfield in &field.subfields {
        out.push(SUBFIELD_SEPARATOR);
        let mut buf = [0u8; 4];
        out.extend_from_slice(subfield.code.encode_utf8(&mut buf).as_bytes());
        out.extend_from_slice(subfield.value.as_bytes());
    }
    out.push(FIELD_TERMINATOR);
    Ok(())
}

/// Encode a record as plain PICA+, followed by the separating empty line.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a line break.
pub fn encode_plain_record(record: &Record) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(record.len() * 32 + 1);
    for field in record.fields() {
        encode_plain_field(field, &mut out)?;
    }
    out.push(b'\n');
    Ok(out)
}

/// Append a plain field line to `out`.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a line break
/// or a code is not alphanumeric.
pub fn encode_plain_field(field: &Field, out: &mut Vec<u8>) -> Result<()> {
    validate_field(field, is_line_break)?;

    out.extend_from_slice(field.token().as_bytes());
    out.push(b' ');
    for subfield in &field.subfields {
        out.push(b'$');
        let mut buf = [0u8; 4];
        out.extend_from_slice(subfield.code.encode_utf8(&mut buf).as_bytes());
        out.extend_from_slice(subfield.value.replace(PLAIN_SEPARATOR, "$$").as_bytes());
    }
    out.push(b'\n');
    Ok(())
}

fn is_marker(c: char) -> bool {
    matches!(u8::try_from(c), Ok(RECORD_TERMINATOR | FIELD_TERMINATOR | SUBFIELD_SEPARATOR))
}

fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

fn validate_field(field: &Field, forbidden: fn(char) -> bool) -> Result<()> {
    for subfield in &field.subfields {
        if !subfield.code.is_ascii_alphanumeric() {
            return Err(PicaError::InvalidCharacter {
                character: subfield.code,
                context: format!("subfield code of {}", field.token()),
            });
        }
        if let Some(character) = subfield.value.chars().find(|&c| forbidden(c)) {
            return Err(PicaError::InvalidCharacter {
                character,
                context: format!("{}${}", field.token(), subfield.code),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Streaming reader
// ---------------------------------------------------------------------------

/// Streaming reader for PICA+ text.
///
/// Reads one record at a time from any [`BufRead`] source; a record is
/// never split across calls and the source is only read up to the end of the
/// record being returned.
///
/// # Examples
///
/// ```
/// use pica::text::TextReader;
///
/// let data: &[u8] = b"003@ \x1f01\x1e\x1d003@ \x1f02\x1e\x1d";
/// let mut reader = TextReader::new(data);
///
/// let mut ppns = Vec::new();
/// while let Some(decoded) = reader.read_record().unwrap() {
///     ppns.push(decoded.record.ppn().unwrap().to_string());
/// }
/// assert_eq!(ppns, ["1", "2"]);
/// ```
pub struct TextReader<R: BufRead> {
    reader: R,
    dialect: TextDialect,
    buffer: Vec<u8>,
    records_read: usize,
}

impl<R: BufRead> TextReader<R> {
    /// Create a reader for normalized PICA+.
    pub fn new(reader: R) -> Self {
        Self::with_dialect(reader, TextDialect::Normalized)
    }

    /// Create a reader for plain PICA+.
    pub fn plain(reader: R) -> Self {
        Self::with_dialect(reader, TextDialect::Plain)
    }

    /// Create a reader for the given dialect.
    pub fn with_dialect(reader: R, dialect: TextDialect) -> Self {
        TextReader {
            reader,
            dialect,
            buffer: Vec::new(),
            records_read: 0,
        }
    }

    /// Read the next record.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::MalformedRecord`] for a record that cannot be
    /// decoded (the next call continues with the following record) and
    /// [`PicaError::IoError`] if reading fails.
    pub fn read_record(&mut self) -> Result<Option<Decoded>> {
        match self.dialect {
            TextDialect::Normalized => self.read_normalized(),
            TextDialect::Plain => self.read_plain(),
        }
    }

    fn read_normalized(&mut self) -> Result<Option<Decoded>> {
        self.buffer.clear();
        if self.reader.read_until(RECORD_TERMINATOR, &mut self.buffer)? == 0 {
            return Ok(None);
        }

        if self.buffer.last() != Some(&RECORD_TERMINATOR) {
            // Trailing line breaks after the last record are not a record
            if self.buffer.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            self.records_read += 1;
            return Err(PicaError::MalformedRecord(
                "unexpected end of input before record terminator".to_string(),
            ));
        }

        self.records_read += 1;
        decode_record(&self.buffer).map(Some)
    }

    fn read_plain(&mut self) -> Result<Option<Decoded>> {
        self.buffer.clear();
        loop {
            let start = self.buffer.len();
            if self.reader.read_until(b'\n', &mut self.buffer)? == 0 {
                break;
            }
            if self.buffer[start..].iter().all(u8::is_ascii_whitespace) {
                self.buffer.truncate(start);
                if self.buffer.is_empty() {
                    continue;
                }
                break;
            }
        }

        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.records_read += 1;
        decode_plain_record(&self.buffer).map(Some)
    }

    /// Number of records attempted so far, malformed ones included.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Unwrap the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: BufRead> fmt::Debug for TextReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextReader")
            .field("dialect", &self.dialect)
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> FormatReader for TextReader<R> {
    fn read_record(&mut self) -> Result<Option<Decoded>> {
        TextReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}
