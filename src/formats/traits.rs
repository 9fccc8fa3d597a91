//! Format reader and writer traits for PICA+ records.
//!
//! This module defines the core traits that all format implementations must implement,
//! providing a uniform interface for reading and writing records regardless of
//! the underlying serialization format.
//!
//! # Design Rationale
//!
//! Readers hand out [`Decoded`] values rather than bare records: a record may
//! survive decoding while some of its fields did not, and those losses must
//! reach the caller without aborting the stream. Whole records that cannot be
//! decoded come back as a recoverable `Err` (see
//! [`PicaError::is_recoverable`](crate::PicaError::is_recoverable)); the reader
//! is positioned at the next record when that happens.
//!
//! # Example
//!
//! ```ignore
//! use pica::formats::{FormatReader, FormatWriter};
//!
//! fn copy_records<R: FormatReader, W: FormatWriter>(
//!     reader: &mut R,
//!     writer: &mut W,
//! ) -> pica::Result<usize> {
//!     let mut count = 0;
//!     while let Some(decoded) = reader.read_record()? {
//!         writer.write_record(&decoded.record)?;
//!         count += 1;
//!     }
//!     writer.finish()?;
//!     Ok(count)
//! }
//! ```

use crate::error::{PicaError, Result};
use crate::record::Record;

/// A record produced by a reader, together with the fields it lost.
#[derive(Debug)]
pub struct Decoded {
    /// The decoded record without its malformed fields
    pub record: Record,
    /// One [`PicaError::MalformedField`] per dropped field, in input order
    pub errors: Vec<PicaError>,
}

impl Decoded {
    /// Wrap a record that decoded without losses.
    #[must_use]
    pub fn new(record: Record) -> Self {
        Decoded {
            record,
            errors: Vec::new(),
        }
    }

    /// Whether every field of the input survived.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl From<Record> for Decoded {
    fn from(record: Record) -> Self {
        Decoded::new(record)
    }
}

/// Trait for readers that can produce PICA+ records from a source.
///
/// # Implementation Notes
///
/// Implementations should:
/// - Return `Ok(None)` when the source is exhausted (not an error)
/// - Preserve field and subfield ordering exactly
/// - Resynchronize at the next record boundary before returning
///   [`PicaError::MalformedRecord`]
pub trait FormatReader: std::fmt::Debug {
    /// Read the next record from the source.
    ///
    /// Returns:
    /// - `Ok(Some(decoded))` if a record was read
    /// - `Ok(None)` if the end of the source was reached
    /// - `Err(_)` if a record was malformed (recoverable) or reading failed
    ///
    /// # Errors
    ///
    /// Returns an error if the source contains malformed data or I/O fails.
    fn read_record(&mut self) -> Result<Option<Decoded>>;

    /// Read all remaining records into a vector.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; previously read records are discarded.
    fn read_all(&mut self) -> Result<Vec<Decoded>> {
        let mut records = Vec::new();
        while let Some(decoded) = self.read_record()? {
            records.push(decoded);
        }
        Ok(records)
    }

    /// Returns the number of records attempted so far, malformed ones included.
    ///
    /// The default implementation returns `None` if tracking is not supported.
    fn records_read(&self) -> Option<usize> {
        None
    }
}

/// Trait for writers that can serialize PICA+ records to a format.
///
/// # Important: Always Call `finish`
///
/// Some formats (XML) only become well-formed on [`finish`](Self::finish).
pub trait FormatWriter: std::fmt::Debug {
    /// Write a single record to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be represented in the format or
    /// if writing to the underlying output fails.
    fn write_record(&mut self, record: &Record) -> Result<()>;

    /// Write multiple records to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if any record cannot be written.
    fn write_batch(&mut self, records: &[Record]) -> Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    /// Finish writing and flush any buffered data.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or finalizing the output fails.
    fn finish(&mut self) -> Result<()>;

    /// Returns the number of records written so far.
    fn records_written(&self) -> Option<usize> {
        None
    }
}

/// Extension trait providing iterator-style access for format readers.
///
/// This trait is automatically implemented for all types implementing [`FormatReader`].
pub trait FormatReaderExt: FormatReader {
    /// Create an iterator over records from this reader.
    ///
    /// Recoverable errors are yielded as items and iteration may continue
    /// past them.
    fn records(&mut self) -> RecordIterator<'_, Self>
    where
        Self: Sized,
    {
        RecordIterator { reader: self }
    }
}

impl<T: FormatReader> FormatReaderExt for T {}

/// Iterator adapter for [`FormatReader`].
///
/// Created by the [`records`](FormatReaderExt::records) method.
#[derive(Debug)]
pub struct RecordIterator<'a, R: FormatReader> {
    reader: &'a mut R,
}

impl<R: FormatReader> Iterator for RecordIterator<'_, R> {
    type Item = Result<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}
