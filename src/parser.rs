//! Handler-driven record parsing.
//!
//! A [`Parser`] pulls records from a source, passes every field through an
//! optional field handler and every record through an optional record
//! handler, and stops once the configured limit of records has been emitted.
//!
//! ```
//! use pica::{Parser, ParserOptions};
//! use std::cell::RefCell;
//!
//! let data: &[u8] = b"003@ \x1f01\x1e021A \x1faOne\x1e\x1d003@ \x1f02\x1e021A \x1faTwo\x1e\x1d";
//! let titles = RefCell::new(Vec::new());
//!
//! let mut parser = Parser::new(ParserOptions::new())
//!     .on_field(|field| Ok((field.tag == "021A").then_some(field)))
//!     .on_record(|record| {
//!         titles.borrow_mut().push(record.first_subfield_value("021A", 'a').unwrap().to_string());
//!         Ok(())
//!     });
//!
//! let summary = parser.parse_text(data).unwrap();
//! assert_eq!(summary.emitted, 2);
//! drop(parser);
//! assert_eq!(titles.into_inner(), ["One", "Two"]);
//! ```
//!
//! # Limits
//!
//! Without a limit every record is read. [`ParserOptions::limit`] bounds the
//! number of records emitted per parse call; zero and negative values mean
//! [`DEFAULT_LIMIT`]. Once the limit is reached the parser stops reading and
//! leaves the rest of the source unconsumed.
//!
//! # Errors
//!
//! Malformed fields and records are counted and passed to the error handler
//! (or logged with `tracing` if there is none); parsing continues. I/O
//! failures, unparsable XML and errors returned by a handler end the parse
//! call and are returned to the caller.

use crate::error::{PicaError, Result};
use crate::formats::{Decoded, FormatReader};
use crate::recovery::RecoveryMode;
use crate::record::{Field, Record};
use crate::source::{open_input, InputFormat};
use crate::sru::{SruMetadata, SruReader};
use crate::text::TextReader;
use crate::xml::XmlReader;
use serde::Serialize;
use std::fmt;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, trace, warn};

/// Limit used when a zero or negative limit is configured.
pub const DEFAULT_LIMIT: usize = 10;

/// Map a requested limit to the effective one.
///
/// ```
/// use pica::parser::normalize_limit;
///
/// assert_eq!(normalize_limit(25), 25);
/// assert_eq!(normalize_limit(0), 10);
/// assert_eq!(normalize_limit(-3), 10);
/// ```
#[must_use]
pub fn normalize_limit(limit: i64) -> usize {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

/// Parser configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum records emitted per parse call, `None` for no limit
    pub limit: Option<usize>,
    /// What to do with records that lost fields
    pub recovery_mode: RecoveryMode,
}

impl ParserOptions {
    /// Options without a limit, lenient recovery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record limit; values `<= 0` become [`DEFAULT_LIMIT`].
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(normalize_limit(limit));
        self
    }

    /// Remove the record limit.
    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.limit = None;
        self
    }

    /// Set the recovery mode.
    #[must_use]
    pub fn recovery_mode(mut self, mode: RecoveryMode) -> Self {
        self.recovery_mode = mode;
        self
    }
}

/// Counts for a single parse call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseSummary {
    /// Records attempted, malformed ones included
    pub processed: usize,
    /// Records passed on to the record handler
    pub emitted: usize,
    /// Records dropped as malformed
    pub malformed_records: usize,
    /// Fields dropped as malformed
    pub malformed_fields: usize,
    /// Whether the limit was hit.
    ///
    /// The parser stops without pulling again, so a source holding exactly
    /// `limit` records reports `true` although nothing was left unread.
    pub limit_reached: bool,
}

/// Field handler: returns the (possibly modified) field, or `None` to drop it.
pub type FieldHandler<'h> = Box<dyn FnMut(Field) -> Result<Option<Field>> + 'h>;
/// Record handler: receives each record without its dropped fields.
pub type RecordHandler<'h> = Box<dyn FnMut(Record) -> Result<()> + 'h>;
/// Error handler: receives malformed field and record errors.
pub type ErrorHandler<'h> = Box<dyn FnMut(&PicaError) + 'h>;

/// Record parser with pluggable handlers.
///
/// Counters accumulate over all parse calls on the same parser, so after
/// processing several sources one after another [`counter`](Self::counter)
/// equals the sum of the per-call [`ParseSummary::processed`] values.
pub struct Parser<'h> {
    options: ParserOptions,
    field_handler: Option<FieldHandler<'h>>,
    record_handler: Option<RecordHandler<'h>>,
    error_handler: Option<ErrorHandler<'h>>,
    counter: usize,
    emitted: usize,
    malformed_records: usize,
    malformed_fields: usize,
}

impl Default for Parser<'_> {
    fn default() -> Self {
        Parser::new(ParserOptions::default())
    }
}

impl<'h> Parser<'h> {
    /// Create a parser without handlers.
    #[must_use]
    pub fn new(options: ParserOptions) -> Self {
        Parser {
            options,
            field_handler: None,
            record_handler: None,
            error_handler: None,
            counter: 0,
            emitted: 0,
            malformed_records: 0,
            malformed_fields: 0,
        }
    }

    /// Install the field handler.
    #[must_use]
    pub fn on_field(mut self, handler: impl FnMut(Field) -> Result<Option<Field>> + 'h) -> Self {
        self.field_handler = Some(Box::new(handler));
        self
    }

    /// Install the record handler.
    #[must_use]
    pub fn on_record(mut self, handler: impl FnMut(Record) -> Result<()> + 'h) -> Self {
        self.record_handler = Some(Box::new(handler));
        self
    }

    /// Install the error handler for malformed input.
    #[must_use]
    pub fn on_error(mut self, handler: impl FnMut(&PicaError) + 'h) -> Self {
        self.error_handler = Some(Box::new(handler));
        self
    }

    /// The parser configuration.
    #[must_use]
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Records attempted over all parse calls, malformed ones included.
    #[must_use]
    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Records emitted over all parse calls.
    #[must_use]
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Records dropped as malformed over all parse calls.
    #[must_use]
    pub fn malformed_records(&self) -> usize {
        self.malformed_records
    }

    /// Fields dropped as malformed over all parse calls.
    #[must_use]
    pub fn malformed_fields(&self) -> usize {
        self.malformed_fields
    }

    /// Parse normalized PICA+ text.
    ///
    /// # Errors
    ///
    /// Returns I/O errors and errors returned by handlers.
    pub fn parse_text<R: BufRead>(&mut self, source: R) -> Result<ParseSummary> {
        self.parse_reader(&mut TextReader::new(source))
    }

    /// Parse plain PICA+ text.
    ///
    /// # Errors
    ///
    /// Returns I/O errors and errors returned by handlers.
    pub fn parse_plain<R: BufRead>(&mut self, source: R) -> Result<ParseSummary> {
        self.parse_reader(&mut TextReader::plain(source))
    }

    /// Parse a PICA XML document.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`] for a document that is not
    /// well-formed, I/O errors and errors returned by handlers.
    pub fn parse_xml<R: BufRead>(&mut self, source: R) -> Result<ParseSummary> {
        self.parse_reader(&mut XmlReader::new(source))
    }

    /// Parse an SRU response, returning its metadata as well.
    ///
    /// If the limit stops parsing early, the metadata covers only the part of
    /// the response read so far.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::XmlError`] for an envelope that is not
    /// well-formed, I/O errors and errors returned by handlers.
    pub fn parse_sru<R: BufRead>(&mut self, source: R) -> Result<(ParseSummary, SruMetadata)> {
        let mut reader = SruReader::new(source);
        let summary = self.parse_reader(&mut reader)?;
        Ok((summary, reader.metadata()))
    }

    /// Parse records that were decoded elsewhere.
    ///
    /// # Errors
    ///
    /// Returns errors returned by handlers.
    pub fn parse_records<I>(&mut self, records: I) -> Result<ParseSummary>
    where
        I: IntoIterator<Item = Decoded>,
    {
        let mut records = records.into_iter();
        self.drive(|| Ok(records.next()))
    }

    /// Parse everything a [`FormatReader`] yields.
    ///
    /// # Errors
    ///
    /// Returns unrecoverable reader errors and errors returned by handlers.
    pub fn parse_reader<F: FormatReader + ?Sized>(&mut self, reader: &mut F) -> Result<ParseSummary> {
        self.drive(|| reader.read_record())
    }

    /// Parse a file, choosing the format by [`InputFormat::from_path`].
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::IoError`] if the file cannot be opened, plus
    /// everything the format-specific parse call returns.
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ParseSummary> {
        let format = InputFormat::from_path(path.as_ref());
        self.parse_file_as(path, format)
    }

    /// Parse a file in the given format.
    ///
    /// # Errors
    ///
    /// See [`parse_file`](Self::parse_file).
    pub fn parse_file_as<P: AsRef<Path>>(&mut self, path: P, format: InputFormat) -> Result<ParseSummary> {
        let path = path.as_ref();
        debug!(path = %path.display(), ?format, "parsing file");
        let source = open_input(path)?;
        match format {
            InputFormat::Normalized => self.parse_text(source),
            InputFormat::Plain => self.parse_plain(source),
            InputFormat::Xml => self.parse_xml(source),
            InputFormat::Sru => self.parse_sru(source).map(|(summary, _)| summary),
        }
    }

    fn drive(&mut self, mut next: impl FnMut() -> Result<Option<Decoded>>) -> Result<ParseSummary> {
        let mut summary = ParseSummary::default();
        loop {
            if let Some(limit) = self.options.limit {
                if summary.emitted >= limit {
                    debug!(limit, processed = summary.processed, "record limit reached");
                    summary.limit_reached = true;
                    break;
                }
            }

            match next() {
                Ok(Some(decoded)) => {
                    self.counter += 1;
                    summary.processed += 1;
                    self.process(decoded, &mut summary)?;
                },
                Ok(None) => break,
                Err(err) if err.is_recoverable() => {
                    self.counter += 1;
                    summary.processed += 1;
                    self.malformed_records += 1;
                    summary.malformed_records += 1;
                    self.report(&err);
                },
                Err(err) => return Err(err),
            }
        }
        Ok(summary)
    }

    fn process(&mut self, decoded: Decoded, summary: &mut ParseSummary) -> Result<()> {
        self.malformed_fields += decoded.errors.len();
        summary.malformed_fields += decoded.errors.len();
        for err in &decoded.errors {
            self.report(err);
        }

        let record = match self.options.recovery_mode.apply(decoded) {
            Ok(decoded) => decoded.record,
            Err(err) => {
                self.malformed_records += 1;
                summary.malformed_records += 1;
                self.report(&err);
                return Ok(());
            },
        };
        trace!(ppn = ?record.ppn(), fields = record.len(), "record decoded");

        let record = match self.field_handler.as_mut() {
            Some(handler) => {
                let mut kept = Record::new();
                for field in record {
                    if let Some(field) = handler(field)? {
                        kept.append(field);
                    }
                }
                kept
            },
            None => record,
        };

        if let Some(handler) = self.record_handler.as_mut() {
            handler(record)?;
        }
        self.emitted += 1;
        summary.emitted += 1;
        Ok(())
    }

    fn report(&mut self, err: &PicaError) {
        match self.error_handler.as_mut() {
            Some(handler) => handler(err),
            None => warn!(error = %err, "skipping malformed input"),
        }
    }
}

impl fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("options", &self.options)
            .field("has_field_handler", &self.field_handler.is_some())
            .field("has_record_handler", &self.record_handler.is_some())
            .field("has_error_handler", &self.error_handler.is_some())
            .field("counter", &self.counter)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const THREE_RECORDS: &[u8] =
        b"003@ \x1f01\x1e021A \x1faA\x1e\x1d003@ \x1f02\x1e\x1d003@ \x1f03\x1e021A \x1faC\x1e\x1d";

    #[test]
    fn test_records_reach_record_handler() {
        let ppns = RefCell::new(Vec::new());
        let mut parser = Parser::default().on_record(|record| {
            ppns.borrow_mut().push(record.ppn().unwrap_or_default().to_string());
            Ok(())
        });

        let summary = parser.parse_text(THREE_RECORDS).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.emitted, 3);
        assert!(!summary.limit_reached);
        drop(parser);
        assert_eq!(ppns.into_inner(), ["1", "2", "3"]);
    }

    #[test]
    fn test_field_handler_suppresses_fields() {
        let lengths = RefCell::new(Vec::new());
        let mut parser = Parser::default()
            .on_field(|field| Ok((field.tag != "021A").then_some(field)))
            .on_record(|record| {
                lengths.borrow_mut().push(record.len());
                Ok(())
            });

        parser.parse_text(THREE_RECORDS).unwrap();
        drop(parser);
        assert_eq!(lengths.into_inner(), [1, 1, 1]);
    }

    #[test]
    fn test_limit_stops_reading() {
        let mut parser = Parser::new(ParserOptions::new().limit(2));
        let summary = parser.parse_text(THREE_RECORDS).unwrap();
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.processed, 2);
        assert!(summary.limit_reached);

        // The limit applies per call
        let summary = parser.parse_text(THREE_RECORDS).unwrap();
        assert_eq!(summary.emitted, 2);
        assert_eq!(parser.counter(), 4);
    }

    #[test]
    fn test_limit_equal_to_source_size() {
        let mut source = THREE_RECORDS;
        let mut parser = Parser::new(ParserOptions::new().limit(3));
        let summary = parser.parse_text(&mut source).unwrap();
        assert_eq!(summary.emitted, 3);
        // The limit was hit even though the source is exhausted
        assert!(summary.limit_reached);
        assert!(source.is_empty());
    }

    #[test]
    fn test_bad_first_field_costs_only_that_field() {
        let data: &[u8] = b"XYZ \x1faBad\x1e003@ \x1f0123\x1e021A \x1faT\x1e\x1d";
        let ppns = RefCell::new(Vec::new());
        let mut parser = Parser::default().on_error(|_| {}).on_record(|record| {
            ppns.borrow_mut().push(record.ppn().unwrap_or_default().to_string());
            Ok(())
        });

        let summary = parser.parse_text(data).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.emitted, 1);
        assert_eq!(summary.malformed_records, 0);
        assert_eq!(summary.malformed_fields, 1);
        drop(parser);
        assert_eq!(ppns.into_inner(), ["123"]);
    }

    #[test]
    fn test_non_positive_limit_means_default() {
        assert_eq!(ParserOptions::new().limit(0).limit, Some(DEFAULT_LIMIT));
        assert_eq!(ParserOptions::new().limit(-1).limit, Some(DEFAULT_LIMIT));
        assert_eq!(ParserOptions::new().limit(5).unlimited().limit, None);
    }

    #[test]
    fn test_malformed_input_is_counted_and_reported() {
        let data: &[u8] = b"003@ \x1f01\x1eXX \x1fax\x1e\x1dgarbage\x1e\x1d003@ \x1f03\x1e\x1d";
        let errors = RefCell::new(Vec::new());
        let mut parser =
            Parser::default().on_error(|err| errors.borrow_mut().push(err.to_string()));

        let summary = parser.parse_text(data).unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.malformed_records, 1);
        assert_eq!(summary.malformed_fields, 1);
        assert_eq!(parser.malformed_fields(), 1);
        drop(parser);
        assert_eq!(errors.into_inner().len(), 2);
    }

    #[test]
    fn test_strict_mode_drops_record() {
        let data: &[u8] = b"003@ \x1f01\x1eXX \x1fax\x1e\x1d003@ \x1f02\x1e\x1d";
        let mut parser = Parser::new(ParserOptions::new().recovery_mode(RecoveryMode::Strict))
            .on_error(|_| {});
        let summary = parser.parse_text(data).unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.emitted, 1);
        assert_eq!(summary.malformed_records, 1);
    }

    #[test]
    fn test_handler_error_aborts() {
        let mut parser = Parser::default()
            .on_record(|_| Err(PicaError::WriterError("sink closed".to_string())));
        assert!(matches!(
            parser.parse_text(THREE_RECORDS),
            Err(PicaError::WriterError(_))
        ));
        assert_eq!(parser.counter(), 1);
    }

    #[test]
    fn test_broken_xml_is_fatal() {
        let mut parser = Parser::default();
        let result = parser.parse_xml("<collection><record></collection>".as_bytes());
        assert!(matches!(result, Err(PicaError::XmlError(_))));
    }

    #[test]
    fn test_parse_records() {
        let records: Vec<Decoded> = (0..15)
            .map(|i| {
                let mut record = Record::new();
                record.set_subfield("003@", '0', i.to_string()).unwrap();
                Decoded::new(record)
            })
            .collect();

        let mut parser = Parser::new(ParserOptions::new().limit(0));
        let summary = parser.parse_records(records).unwrap();
        assert_eq!(summary.emitted, DEFAULT_LIMIT);
        assert!(summary.limit_reached);
    }
}
