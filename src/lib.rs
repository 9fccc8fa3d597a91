#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # pica: PICA+ Rust Crate
//!
//! A Rust library for reading, writing, filtering and counting PICA+
//! bibliographic records in normalized text, plain text, PICA XML and SRU
//! response formats.
//!
//! ## Quick Start
//!
//! ### Reading Records
//!
//! ```
//! use pica::TextReader;
//!
//! # fn main() -> pica::Result<()> {
//! let data: &[u8] = b"003@ \x1f0123\x1e021A \x1faA title\x1e\x1d";
//! let mut reader = TextReader::new(data);
//!
//! while let Some(decoded) = reader.read_record()? {
//!     assert_eq!(decoded.record.first_subfield_value("021A", 'a'), Some("A title"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Filtering and Counting
//!
//! ```
//! use pica::{FieldSelector, OutputFormat, Parser, ParserOptions, Writer};
//! use std::cell::RefCell;
//!
//! # fn main() -> pica::Result<()> {
//! let data: &[u8] = b"003@ \x1f01\x1e044K/01 \x1faRust\x1e\x1d003@ \x1f02\x1e\x1d";
//! let selector: FieldSelector = "044K$a".parse()?;
//! let writer = RefCell::new(Writer::new(Vec::new(), OutputFormat::Plain));
//!
//! let mut parser = Parser::new(ParserOptions::new().limit(100)).on_field(|field| {
//!     if let Some(selected) = selector.select(&field) {
//!         writer.borrow_mut().write_field(&selected)?;
//!     }
//!     Ok(None)
//! });
//!
//! let summary = parser.parse_text(data)?;
//! assert_eq!(summary.processed, 2);
//! drop(parser);
//!
//! let writer = writer.into_inner();
//! assert_eq!(writer.fields_written(), 1);
//! assert_eq!(writer.into_inner(), b"044K/01 $aRust\n");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`record`]: record model (`Record`, `Field`, `Subfield`, `Tag`, `Occurrence`)
//! - [`selector`]: tag/occurrence/subfield selectors
//! - [`text`]: normalized and plain PICA+ codec
//! - [`events`]: owned XML event stream over quick-xml
//! - [`xml`]: PICA XML codec
//! - [`sru`]: record extraction from SRU responses
//! - [`formats`]: format reader and writer traits
//! - [`parser`]: handler-driven parsing with limits and counters
//! - [`writer`]: record writer with output format strategy
//! - [`statistics`]: per-tag statistics
//! - [`recovery`]: handling of records with malformed fields
//! - [`source`]: opening (optionally gzip-compressed) input files
//! - [`error`]: error types and result type

pub mod error;
pub mod events;
pub mod formats;
pub mod parser;
pub mod record;
pub mod recovery;
pub mod selector;
pub mod source;
pub mod sru;
pub mod statistics;
pub mod text;
pub mod writer;
pub mod xml;

pub use error::{PicaError, Result};
pub use formats::{Decoded, FormatReader, FormatReaderExt, FormatWriter};
pub use parser::{ParseSummary, Parser, ParserOptions};
pub use record::{Field, FieldBuilder, Occurrence, Record, Subfield, Tag};
pub use recovery::RecoveryMode;
pub use selector::FieldSelector;
pub use source::{open_input, InputFormat};
pub use sru::{SruMetadata, SruReader, SruResponse, SruResponseParser};
pub use statistics::TagStatistics;
pub use text::{TextDialect, TextReader};
pub use writer::{OutputFormat, Writer};
pub use xml::{XmlReader, XmlRecordDecoder};
