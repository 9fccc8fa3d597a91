//! Multi-format support for PICA+ records.
//!
//! This module provides a unified interface for reading and writing records
//! in the supported serialization formats. All readers and writers implement
//! the same traits, allowing format-agnostic code.
//!
//! # Supported Formats
//!
//! | Format | Reader | Writer |
//! |--------|--------|--------|
//! | Normalized PICA+ (control markers) | [`TextReader`](crate::text::TextReader) | [`Writer`](crate::writer::Writer) |
//! | Plain PICA+ (`$` separated lines) | [`TextReader`](crate::text::TextReader) | [`Writer`](crate::writer::Writer) |
//! | PICA XML | [`XmlReader`](crate::xml::XmlReader) | [`Writer`](crate::writer::Writer) |
//! | SRU response envelope | [`SruReader`](crate::sru::SruReader) | — |
//!
//! ## Format-Agnostic Processing
//!
//! ```ignore
//! use pica::formats::{FormatReader, FormatWriter};
//!
//! fn convert<R: FormatReader, W: FormatWriter>(
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

mod traits;

pub use traits::{Decoded, FormatReader, FormatReaderExt, FormatWriter, RecordIterator};
