//! Writing PICA+ records.
//!
//! [`Writer`] serializes records and single fields in one of the
//! [`OutputFormat`]s to any destination implementing [`std::io::Write`]. It
//! counts what it writes and can optionally keep [`TagStatistics`].
//!
//! # Examples
//!
//! ```
//! use pica::{Field, OutputFormat, Record, Writer};
//!
//! let mut record = Record::new();
//! record.append(Field::builder("003@").unwrap().subfield('0', "1").build());
//!
//! let mut writer = Writer::new(Vec::new(), OutputFormat::Plain);
//! writer.write_record(&record).unwrap();
//! writer.finish().unwrap();
//!
//! assert_eq!(writer.records_written(), 1);
//! assert_eq!(writer.into_inner(), b"003@ $01\n\n");
//! ```
//!
//! Counting without output:
//!
//! ```
//! use pica::{Field, OutputFormat, Record, Writer};
//!
//! let record: Record = vec![Field::builder("021A").unwrap().subfield('a', "T").build()]
//!     .into_iter()
//!     .collect();
//!
//! let mut writer = Writer::null(OutputFormat::Normalized).with_statistics();
//! writer.write_record(&record).unwrap();
//! assert_eq!(writer.statistics().unwrap().all["021A"], 1);
//! ```

use crate::error::{PicaError, Result};
use crate::formats::FormatWriter;
use crate::record::{Field, Record};
use crate::statistics::TagStatistics;
use crate::text;
use crate::xml::{self, PICA_XML_NS};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use std::fmt;
use std::io::{self, Write};

const COLLECTION: &str = "collection";

/// Serialization used by a [`Writer`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Normalized PICA+ with control markers
    #[default]
    Normalized,
    /// Plain PICA+, one field per line
    Plain,
    /// PICA XML, records wrapped in a `<collection>`
    Xml,
}

enum Sink<W: Write> {
    Text(W),
    Xml(quick_xml::Writer<W>),
}

impl<W: Write> Sink<W> {
    fn new(inner: W, format: OutputFormat, line_breaks: bool) -> Self {
        match (format, line_breaks) {
            (OutputFormat::Xml, true) => Sink::Xml(quick_xml::Writer::new_with_indent(inner, b' ', 2)),
            (OutputFormat::Xml, false) => Sink::Xml(quick_xml::Writer::new(inner)),
            _ => Sink::Text(inner),
        }
    }

    fn into_inner(self) -> W {
        match self {
            Sink::Text(inner) => inner,
            Sink::Xml(writer) => writer.into_inner(),
        }
    }

    fn get_mut(&mut self) -> &mut W {
        match self {
            Sink::Text(inner) => inner,
            Sink::Xml(writer) => writer.get_mut(),
        }
    }
}

/// Record writer with a configurable output format.
///
/// XML output only becomes a complete document on [`finish`](Self::finish).
pub struct Writer<W: Write> {
    sink: Sink<W>,
    format: OutputFormat,
    line_breaks: bool,
    started: bool,
    finished: bool,
    records_written: usize,
    fields_written: usize,
    statistics: Option<TagStatistics>,
}

impl Writer<io::Sink> {
    /// A writer that counts records and fields but discards the bytes.
    #[must_use]
    pub fn null(format: OutputFormat) -> Self {
        Writer::new(io::sink(), format)
    }
}

impl<W: Write> Writer<W> {
    /// Create a writer without line breaks.
    pub fn new(inner: W, format: OutputFormat) -> Self {
        Writer {
            sink: Sink::new(inner, format, false),
            format,
            line_breaks: false,
            started: false,
            finished: false,
            records_written: 0,
            fields_written: 0,
            statistics: None,
        }
    }

    /// Enable or disable line breaks.
    ///
    /// Normalized output gets a newline after every record (and after every
    /// field written with [`write_field`](Self::write_field)); XML output is
    /// indented. Plain output always has line breaks.
    #[must_use]
    pub fn line_breaks(mut self, enabled: bool) -> Self {
        if enabled != self.line_breaks {
            self.line_breaks = enabled;
            self.sink = Sink::new(self.sink.into_inner(), self.format, enabled);
        }
        self
    }

    /// Keep per-tag statistics of everything written.
    #[must_use]
    pub fn with_statistics(mut self) -> Self {
        self.statistics = Some(TagStatistics::new());
        self
    }

    /// The configured output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write a record.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::InvalidCharacter`] if the record cannot be
    /// represented in the output format (nothing is written then),
    /// [`PicaError::WriterError`] after [`finish`](Self::finish), and
    /// [`PicaError::IoError`] if the destination fails.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        self.ensure_open()?;

        match &mut self.sink {
            Sink::Text(inner) => {
                let mut bytes = match self.format {
                    OutputFormat::Plain => text::encode_plain_record(record)?,
                    _ => text::encode_record(record)?,
                };
                if self.line_breaks && self.format == OutputFormat::Normalized {
                    bytes.push(b'\n');
                }
                inner.write_all(&bytes)?;
            },
            Sink::Xml(writer) => xml::write_record_xml(writer, record, false)?,
        }

        self.records_written += 1;
        self.fields_written += record.len();
        if let Some(statistics) = self.statistics.as_mut() {
            statistics.add_record(record);
        }
        Ok(())
    }

    /// Write a single field outside of any record.
    ///
    /// Used when selected fields are streamed instead of whole records. In
    /// XML output the `<datafield>` elements are direct children of the
    /// collection.
    ///
    /// # Errors
    ///
    /// Same as [`write_record`](Self::write_record).
    pub fn write_field(&mut self, field: &Field) -> Result<()> {
        self.ensure_open()?;

        match &mut self.sink {
            Sink::Text(inner) => {
                let mut bytes = Vec::new();
                match self.format {
                    OutputFormat::Plain => text::encode_plain_field(field, &mut bytes)?,
                    _ => {
                        text::encode_field(field, &mut bytes)?;
                        if self.line_breaks {
                            bytes.push(b'\n');
                        }
                    },
                }
                inner.write_all(&bytes)?;
            },
            Sink::Xml(writer) => xml::write_field_xml(writer, field)?,
        }

        self.fields_written += 1;
        if let Some(statistics) = self.statistics.as_mut() {
            statistics.add_field(field);
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> Result<()> {
        if self.finished {
            return Err(PicaError::WriterError(
                "cannot write to a finished writer".to_string(),
            ));
        }
        if !self.started {
            self.started = true;
            if let Sink::Xml(writer) = &mut self.sink {
                writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                let mut start = BytesStart::new(COLLECTION);
                start.push_attribute(("xmlns", PICA_XML_NS));
                writer.write_event(Event::Start(start))?;
            }
        }
        Ok(())
    }

    /// Complete the output and flush it.
    ///
    /// Closes the XML collection (opening it first if nothing was written).
    /// Calling `finish` again has no effect.
    ///
    /// # Errors
    ///
    /// Returns [`PicaError::IoError`] if writing or flushing fails.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.ensure_open()?;
        if let Sink::Xml(writer) = &mut self.sink {
            writer.write_event(Event::End(BytesEnd::new(COLLECTION)))?;
            if self.line_breaks {
                writer.get_mut().write_all(b"\n")?;
            }
        }
        self.sink.get_mut().flush()?;
        self.finished = true;
        Ok(())
    }

    /// Number of records written.
    #[must_use]
    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Number of fields written, inside records or on their own.
    #[must_use]
    pub fn fields_written(&self) -> usize {
        self.fields_written
    }

    /// Statistics, if enabled with [`with_statistics`](Self::with_statistics).
    #[must_use]
    pub fn statistics(&self) -> Option<&TagStatistics> {
        self.statistics.as_ref()
    }

    /// Take the statistics out of the writer.
    pub fn take_statistics(&mut self) -> Option<TagStatistics> {
        self.statistics.take()
    }

    /// Unwrap the destination without finishing.
    pub fn into_inner(self) -> W {
        self.sink.into_inner()
    }
}

impl<W: Write> fmt::Debug for Writer<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("format", &self.format)
            .field("line_breaks", &self.line_breaks)
            .field("finished", &self.finished)
            .field("records_written", &self.records_written)
            .field("fields_written", &self.fields_written)
            .finish_non_exhaustive()
    }
}

impl<W: Write> FormatWriter for Writer<W> {
    fn write_record(&mut self, record: &Record) -> Result<()> {
        Writer::write_record(self, record)
    }

    fn finish(&mut self) -> Result<()> {
        Writer::finish(self)
    }

    fn records_written(&self) -> Option<usize> {
        Some(self.records_written)
    }
}
