//! Record extraction from SRU `searchRetrieve` responses.
//!
//! An SRU response wraps PICA XML records in protocol elements:
//!
//! ```xml
//! <srw:searchRetrieveResponse xmlns:srw="http://www.loc.gov/zing/srw/">
//!   <srw:numberOfRecords>2</srw:numberOfRecords>
//!   <srw:resultSetId>abc</srw:resultSetId>
//!   <srw:records>
//!     <srw:record>
//!       <srw:recordData>
//!         <record xmlns="info:srw/schema/5/picaXML-v1.0">...</record>
//!       </srw:recordData>
//!     </srw:record>
//!   </srw:records>
//! </srw:searchRetrieveResponse>
//! ```
//!
//! [`SruResponseParser`] watches the protocol elements and forwards the
//! events inside `recordData` to an [`XmlRecordDecoder`]. Some servers emit
//! `datafield` elements with an empty `tag` attribute; those are skipped
//! with their subfields before the decoder ever sees them, so the rest of the
//! record survives.
//!
//! Every `recordData` element is one record slot. A slot that closes without
//! yielding a PICA record (a surrogate diagnostic, an empty element, a record
//! cut off inside it) comes back as a recoverable
//! [`PicaError::MalformedRecord`], so callers count it like any other record
//! that could not be decoded.

use crate::error::{PicaError, Result};
use crate::events::{XmlEvent, XmlEventReader};
use crate::formats::{Decoded, FormatReader};
use crate::xml::XmlRecordDecoder;
use serde::Serialize;
use std::fmt;
use std::io::BufRead;
use tracing::{debug, warn};

/// The SRU (zing) response namespace URI.
pub const SRU_NS: &str = "http://www.loc.gov/zing/srw/";

const RECORD_DATA: &str = "recordData";
const NUMBER_OF_RECORDS: &str = "numberOfRecords";
const RESULT_SET_ID: &str = "resultSetId";

/// Protocol-level facts collected from a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SruMetadata {
    /// Hit count declared by the server (trimmed, not validated)
    pub number_of_records: Option<String>,
    /// Result set identifier for follow-up requests
    pub result_set_id: Option<String>,
    /// Number of `recordData` elements closed
    pub current_number: usize,
    /// Fields dropped because their `tag` attribute was empty
    pub skipped_fields: usize,
}

/// All records of a response together with its metadata.
#[derive(Debug)]
pub struct SruResponse {
    /// Records in document order
    pub records: Vec<Decoded>,
    /// One [`PicaError::MalformedRecord`] per record slot without a usable record
    pub errors: Vec<PicaError>,
    /// Protocol metadata
    pub metadata: SruMetadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    NumberOfRecords,
    ResultSetId,
}

/// Event-driven SRU response parser.
///
/// `number_of_records` is reported as the server declared it; it is not
/// compared with the records actually present.
#[derive(Debug, Default)]
pub struct SruResponseParser {
    decoder: XmlRecordDecoder,
    current_number: usize,
    number_of_records: Option<String>,
    result_set_id: Option<String>,
    in_record: bool,
    slot_filled: bool,
    skip_field: bool,
    skip_depth: usize,
    skipped_fields: usize,
    capture: Option<Capture>,
    text: String,
}

impl SruResponseParser {
    /// Create a parser for one response document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event.
    ///
    /// Returns `Some(Ok(_))` when a record is completed and `Some(Err(_))`
    /// when a `recordData` element closes without having yielded one.
    pub fn feed(&mut self, event: XmlEvent) -> Option<Result<Decoded>> {
        if self.skip_field {
            self.skip(&event);
            return None;
        }

        if self.in_record {
            return self.feed_record(event);
        }

        match &event {
            XmlEvent::Start { name, .. } if name.is(SRU_NS, RECORD_DATA) => {
                self.in_record = true;
                self.slot_filled = false;
            },
            XmlEvent::Start { name, .. } if name.is(SRU_NS, NUMBER_OF_RECORDS) => {
                self.capture = Some(Capture::NumberOfRecords);
                self.text.clear();
            },
            XmlEvent::Start { name, .. } if name.is(SRU_NS, RESULT_SET_ID) => {
                self.capture = Some(Capture::ResultSetId);
                self.text.clear();
            },
            XmlEvent::Text(text) if self.capture.is_some() => self.text.push_str(text),
            XmlEvent::End { name } if name.namespace.as_deref() == Some(SRU_NS) => {
                let value = self.text.trim().to_string();
                match (self.capture, name.local.as_str()) {
                    (Some(Capture::NumberOfRecords), NUMBER_OF_RECORDS) => {
                        self.number_of_records = Some(value);
                        self.capture = None;
                    },
                    (Some(Capture::ResultSetId), RESULT_SET_ID) => {
                        self.result_set_id = Some(value);
                        self.capture = None;
                    },
                    _ => {},
                }
            },
            _ => {},
        }
        None
    }

    fn feed_record(&mut self, event: XmlEvent) -> Option<Result<Decoded>> {
        let closes_record_data =
            matches!(&event, XmlEvent::End { name } if name.is(SRU_NS, RECORD_DATA));
        let empty_tag_field =
            matches!(&event, XmlEvent::Start { name, .. } if name.local == "datafield")
                && event.attribute("tag") == Some("");

        if closes_record_data {
            self.in_record = false;
            self.current_number += 1;
            if self.decoder.in_record() {
                warn!(
                    position = self.current_number,
                    "recordData closed inside an unfinished record"
                );
                self.decoder.reset();
                return Some(Err(PicaError::MalformedRecord(format!(
                    "recordData {} closed inside an unfinished record",
                    self.current_number
                ))));
            }
            if !self.slot_filled {
                debug!(position = self.current_number, "recordData without a PICA record");
                return Some(Err(PicaError::MalformedRecord(format!(
                    "recordData {} holds no PICA record",
                    self.current_number
                ))));
            }
            return None;
        }

        if empty_tag_field {
            debug!(
                position = self.current_number + 1,
                "skipping datafield with empty tag attribute"
            );
            self.skip_field = true;
            self.skip_depth = 0;
            self.skipped_fields += 1;
            return None;
        }

        let decoded = self.decoder.feed(event)?;
        self.slot_filled = true;
        Some(Ok(decoded))
    }

    fn skip(&mut self, event: &XmlEvent) {
        match event {
            XmlEvent::Start { .. } => self.skip_depth += 1,
            XmlEvent::End { .. } if self.skip_depth == 0 => self.skip_field = false,
            XmlEvent::End { .. } => self.skip_depth -= 1,
            XmlEvent::Text(_) => {},
        }
    }

    /// Number of `recordData` elements closed so far.
    #[must_use]
    pub fn current_number(&self) -> usize {
        self.current_number
    }

    /// Hit count declared by the server, once its element has closed.
    #[must_use]
    pub fn number_of_records(&self) -> Option<&str> {
        self.number_of_records.as_deref()
    }

    /// Result set identifier, once its element has closed.
    #[must_use]
    pub fn result_set_id(&self) -> Option<&str> {
        self.result_set_id.as_deref()
    }

    /// Fields skipped for having an empty `tag` attribute.
    #[must_use]
    pub fn skipped_fields(&self) -> usize {
        self.skipped_fields
    }

    /// Snapshot of the metadata collected so far.
    #[must_use]
    pub fn metadata(&self) -> SruMetadata {
        SruMetadata {
            number_of_records: self.number_of_records.clone(),
            result_set_id: self.result_set_id.clone(),
            current_number: self.current_number,
            skipped_fields: self.skipped_fields,
        }
    }

    /// Parse a whole response document.
    ///
    /// Record slots without a usable record are collected in
    /// [`SruResponse::errors`].
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`] if the envelope is not well-formed.
    pub fn parse<R: BufRead>(source: R) -> Result<SruResponse> {
        let mut parser = SruResponseParser::new();
        let mut records = Vec::new();
        let mut errors = Vec::new();
        for event in XmlEventReader::new(source) {
            match parser.feed(event?) {
                Some(Ok(decoded)) => records.push(decoded),
                Some(Err(err)) => errors.push(err),
                None => {},
            }
        }
        Ok(SruResponse {
            records,
            errors,
            metadata: parser.metadata(),
        })
    }

    /// Parse a response held in a string.
    ///
    /// # Errors
    ///
    /// See [`parse`](Self::parse).
    pub fn parse_str(xml: &str) -> Result<SruResponse> {
        Self::parse(xml.as_bytes())
    }
}

/// Streaming reader over an SRU response.
///
/// Yields records as they complete; [`metadata`](Self::metadata) reflects
/// everything read so far.
pub struct SruReader<R: BufRead> {
    events: XmlEventReader<R>,
    parser: SruResponseParser,
    records_read: usize,
}

impl<R: BufRead> SruReader<R> {
    /// Create a reader over a buffered source.
    pub fn new(source: R) -> Self {
        SruReader {
            events: XmlEventReader::new(source),
            parser: SruResponseParser::new(),
            records_read: 0,
        }
    }

    /// Read the next record.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`] if the envelope is not well-formed and
    /// [`PicaError::MalformedRecord`] for a record slot without a usable
    /// record (the next call continues with the following slot).
    pub fn read_record(&mut self) -> Result<Option<Decoded>> {
        while let Some(event) = self.events.next_event()? {
            if let Some(outcome) = self.parser.feed(event) {
                self.records_read += 1;
                return outcome.map(Some);
            }
        }
        Ok(None)
    }

    /// Metadata collected so far.
    #[must_use]
    pub fn metadata(&self) -> SruMetadata {
        self.parser.metadata()
    }
}

impl<R: BufRead> fmt::Debug for SruReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SruReader")
            .field("parser", &self.parser)
            .field("records_read", &self.records_read)
            .finish_non_exhaustive()
    }
}

impl<R: BufRead> FormatReader for SruReader<R> {
    fn read_record(&mut self) -> Result<Option<Decoded>> {
        SruReader::read_record(self)
    }

    fn records_read(&self) -> Option<usize> {
        Some(self.records_read)
    }
}
