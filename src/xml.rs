//! PICA XML serialization and deserialization.
//!
//! PICA XML nests subfields inside fields inside records:
//!
//! ```xml
//! <record xmlns="info:srw/schema/5/picaXML-v1.0">
//!   <datafield tag="003@">
//!     <subfield code="0">123</subfield>
//!   </datafield>
//!   <datafield tag="044K" occurrence="01">
//!     <subfield code="a">Rust</subfield>
//!   </datafield>
//! </record>
//! ```
//!
//! Decoding is event driven. [`XmlRecordDecoder`] is fed [`XmlEvent`]s one at
//! a time and hands back each record as soon as its end tag arrives, so the
//! same decoder serves bare documents ([`XmlReader`]) and records embedded in
//! an SRU response ([`SruResponseParser`](crate::sru::SruResponseParser)).
//! Elements are matched by local name; any namespace prefix is accepted.
//!
//! # Examples
//!
//! ```
//! use pica::{Field, Record};
//! use pica::xml::{record_to_xml, xml_to_records};
//!
//! let mut record = Record::new();
//! record.append(Field::builder("003@").unwrap().subfield('0', "123").build());
//!
//! let xml = record_to_xml(&record).unwrap();
//! let restored = xml_to_records(&xml).unwrap();
//! assert_eq!(restored, vec![record]);
//! ```

use crate::error::{PicaError, Result};
use crate::events::{XmlEvent, XmlEventReader};
use crate::formats::{Decoded, FormatReader};
use crate::record::{Field, Record};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::fmt;
use std::io::{BufRead, Write};

/// The PICA XML namespace URI.
pub const PICA_XML_NS: &str = "info:srw/schema/5/picaXML-v1.0";

const RECORD: &str = "record";
const FIELD: &str = "datafield";
const SUBFIELD: &str = "subfield";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    OutsideRecord,
    InRecord,
    InField,
    InSubfield,
}

/// Incremental PICA XML decoder.
///
/// Malformed fields (bad `tag` or `occurrence` attributes, subfields without
/// a valid `code`) are dropped together with their subfields and reported in
/// [`Decoded::errors`]. Character data outside subfields is ignored.
///
/// ```
/// use pica::events::XmlEvent;
/// use pica::xml::XmlRecordDecoder;
///
/// let mut decoder = XmlRecordDecoder::new();
/// let events = [
///     XmlEvent::start("record", &[]),
///     XmlEvent::start("datafield", &[("tag", "003@")]),
///     XmlEvent::start("subfield", &[("code", "0")]),
///     XmlEvent::text("42"),
///     XmlEvent::end("subfield"),
///     XmlEvent::end("datafield"),
///     XmlEvent::end("record"),
/// ];
///
/// let mut records = Vec::new();
/// for event in events {
///     records.extend(decoder.feed(event));
/// }
/// assert_eq!(records[0].record.ppn(), Some("42"));
/// ```
#[derive(Debug)]
pub struct XmlRecordDecoder {
    state: DecoderState,
    record: Record,
    errors: Vec<PicaError>,
    field: Option<Field>,
    field_error: Option<PicaError>,
    code: Option<char>,
    text: String,
}

impl Default for XmlRecordDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlRecordDecoder {
    /// Create a decoder waiting for a record start.
    #[must_use]
    pub fn new() -> Self {
        XmlRecordDecoder {
            state: DecoderState::OutsideRecord,
            record: Record::new(),
            errors: Vec::new(),
            field: None,
            field_error: None,
            code: None,
            text: String::new(),
        }
    }

    /// Whether a record has been opened but not closed yet.
    #[must_use]
    pub fn in_record(&self) -> bool {
        self.state != DecoderState::OutsideRecord
    }

    /// Drop any partially decoded record.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Process one event, returning a record when its end tag is seen.
    pub fn feed(&mut self, event: XmlEvent) -> Option<Decoded> {
        match event {
            XmlEvent::Start { name, attributes } => {
                match (self.state, name.local.as_str()) {
                    (DecoderState::OutsideRecord, RECORD) => {
                        self.state = DecoderState::InRecord;
                    },
                    (DecoderState::InRecord, FIELD) => {
                        self.start_field(&attributes);
                        self.state = DecoderState::InField;
                    },
                    (DecoderState::InField, SUBFIELD) => {
                        self.start_subfield(&attributes);
                        self.state = DecoderState::InSubfield;
                    },
                    _ => {},
                }
                None
            },
            XmlEvent::Text(text) => {
                if self.state == DecoderState::InSubfield {
                    self.text.push_str(&text);
                }
                None
            },
            XmlEvent::End { name } => match (self.state, name.local.as_str()) {
                (DecoderState::InSubfield, SUBFIELD) => {
                    self.end_subfield();
                    self.state = DecoderState::InField;
                    None
                },
                (DecoderState::InField, FIELD) => {
                    self.end_field();
                    self.state = DecoderState::InRecord;
                    None
                },
                (DecoderState::OutsideRecord, _) => None,
                (_, RECORD) => Some(self.end_record()),
                _ => None,
            },
        }
    }

    fn start_field(&mut self, attributes: &[(String, String)]) {
        let tag = attribute(attributes, "tag").unwrap_or_default();
        let token = match attribute(attributes, "occurrence") {
            Some(occurrence) if !occurrence.is_empty() => format!("{tag}/{occurrence}"),
            _ => tag.to_string(),
        };

        match Field::parse_token(&token) {
            Ok((tag, occurrence)) => self.field = Some(Field::new(tag, occurrence)),
            Err(err) => {
                self.field = None;
                self.field_error = Some(err);
            },
        }
    }

    fn start_subfield(&mut self, attributes: &[(String, String)]) {
        self.text.clear();
        let code = attribute(attributes, "code").unwrap_or_default();
        let mut chars = code.chars();
        self.code = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Some(c),
            _ => {
                if let Some(field) = self.field.take() {
                    self.field_error = Some(PicaError::malformed_field(
                        field.token(),
                        format!("invalid subfield code {code:?}"),
                    ));
                }
                None
            },
        };
    }

    fn end_subfield(&mut self) {
        let value = std::mem::take(&mut self.text);
        if let (Some(field), Some(code)) = (self.field.as_mut(), self.code.take()) {
            field.add_subfield(code, value);
        }
    }

    fn end_field(&mut self) {
        if let Some(err) = self.field_error.take() {
            self.errors.push(err);
        } else if let Some(field) = self.field.take() {
            self.record.append(field);
        }
    }

    fn end_record(&mut self) -> Decoded {
        // A record closed in the middle of a field loses that field
        if matches!(self.state, DecoderState::InField | DecoderState::InSubfield) {
            let token = self
                .field
                .take()
                .map_or_else(|| "?".to_string(), |f| f.token());
            let err = self
                .field_error
                .take()
                .unwrap_or_else(|| PicaError::malformed_field(token, "field not closed"));
            self.errors.push(err);
        }

        let decoded = Decoded {
            record: std::mem::take(&mut self.record),
            errors: std::mem::take(&mut self.errors),
        };
        self.reset();
        decoded
    }
}

fn attribute<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Streaming reader for PICA XML documents.
///
/// Accepts a single `<record>` or any wrapper (usually `<collection>`)
/// containing records.
pub struct XmlReader<R: BufRead> {
    events: XmlEventReader<R>,
    decoder: XmlRecordDecoder,
    records_read: usize,
}

impl<R: BufRead> XmlReader<R> {
    /// Create a reader over a buffered source.
    pub fn new(source: R) -> Self {
        XmlReader {
            events: XmlEventReader::new(source),
            decoder: XmlRecordDecoder::new(),
            records_read: 0,
        }
    }

    /// Read the next record.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`] if the document is not well-formed and
    /// [`PicaError::MalformedRecord`] if it ends inside a record.
    pub fn read_record(&mut self) -> Result<Option<Decoded>> {
        while let Some(event) = self.events.next_event()? {
            if let Some(decoded) = self.decoder.feed(event) {
                self.records_read += 1;
                return Ok(Some(decoded));
            }
        }

        if self.decoder.in_record() {
            self.decoder.reset();
            self.records_read += 1;
            return Err(PicaError::MalformedRecord(
                "document ended inside a record".to_string(),
            ));
        }
        Ok(None)
    }

    /// Number of records attempted so far.
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }
}

impl<R: BufRead> fmt::Debug for XmlReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlReader")
            .field("events", &self.events)
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> FormatReader for XmlReader<R> {
    fn read_record(&mut self) -> Result<Option<Decoded>> {
        XmlReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write one `<record>` element.
///
/// With `with_namespace` the element declares [`PICA_XML_NS`] itself, which
/// is what a standalone record needs; inside a `<collection>` that already
/// declares it, pass `false`.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a character
/// XML 1.0 cannot represent; nothing is written in that case.
pub fn write_record_xml<W: Write>(
    writer: &mut quick_xml::Writer<W>,
    record: &Record,
    with_namespace: bool,
) -> Result<()> {
    for field in record.fields() {
        validate_field(field)?;
    }

    let mut start = BytesStart::new(RECORD);
    if with_namespace {
        start.push_attribute(("xmlns", PICA_XML_NS));
    }
    writer.write_event(Event::Start(start))?;
    for field in record.fields() {
        write_field_unchecked(writer, field)?;
    }
    writer.write_event(Event::End(BytesEnd::new(RECORD)))?;
    Ok(())
}

/// Write one `<datafield>` element.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] if a value contains a character
/// XML 1.0 cannot represent.
pub fn write_field_xml<W: Write>(writer: &mut quick_xml::Writer<W>, field: &Field) -> Result<()> {
    validate_field(field)?;
    write_field_unchecked(writer, field)
}

fn write_field_unchecked<W: Write>(writer: &mut quick_xml::Writer<W>, field: &Field) -> Result<()> {
    let mut start = BytesStart::new(FIELD);
    start.push_attribute(("tag", field.tag.as_str()));
    if let Some(occurrence) = field.occurrence_string() {
        start.push_attribute(("occurrence", occurrence.as_str()));
    }

    if field.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for subfield in &field.subfields {
        let mut buf = [0u8; 4];
        let mut start = BytesStart::new(SUBFIELD);
        start.push_attribute(("code", &*subfield.code.encode_utf8(&mut buf)));

        // Empty elements keep the indenting writer from adding whitespace
        // that would end up in the value.
        if subfield.value.is_empty() {
            writer.write_event(Event::Empty(start))?;
        } else {
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Text(BytesText::new(&subfield.value)))?;
            writer.write_event(Event::End(BytesEnd::new(SUBFIELD)))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(FIELD)))?;
    Ok(())
}

fn is_xml_illegal(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'
    )
}

fn validate_field(field: &Field) -> Result<()> {
    for subfield in &field.subfields {
        if !subfield.code.is_ascii_alphanumeric() {
            return Err(PicaError::InvalidCharacter {
                character: subfield.code,
                context: format!("subfield code of {}", field.token()),
            });
        }
        if let Some(character) = subfield.value.chars().find(|&c| is_xml_illegal(c)) {
            return Err(PicaError::InvalidCharacter {
                character,
                context: format!("{}${}", field.token(), subfield.code),
            });
        }
    }
    Ok(())
}

/// Serialize a single record as a standalone PICA XML document.
///
/// # Errors
///
/// Returns [`PicaError::InvalidCharacter`] for values XML cannot represent.
pub fn record_to_xml(record: &Record) -> Result<String> {
    let mut writer = quick_xml::Writer::new(Vec::new());
    write_record_xml(&mut writer, record, true)?;
    String::from_utf8(writer.into_inner())
        .map_err(|e| PicaError::SerializationError(e.to_string()))
}

/// Parse every record in a PICA XML document.
///
/// Malformed fields are dropped silently; use [`XmlReader`] to see them.
///
/// # Errors
///
/// Returns [`PicaError::XmlError`] for a document that is not well-formed
/// and [`PicaError::MalformedRecord`] for a record cut off by the end of input.
pub fn xml_to_records(xml: &str) -> Result<Vec<Record>> {
    let mut reader = XmlReader::new(xml.as_bytes());
    Ok(reader
        .read_all()?
        .into_iter()
        .map(|decoded| decoded.record)
        .collect())
}
