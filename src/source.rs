//! Opening input files.
//!
//! [`open_input`] returns a buffered reader for a path, decompressing gzip
//! transparently; `-` stands for standard input. [`InputFormat::from_path`]
//! guesses the record format from the file name.

use crate::error::Result;
use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Record format of an input source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputFormat {
    /// Normalized PICA+
    #[default]
    Normalized,
    /// Plain PICA+
    Plain,
    /// PICA XML document
    Xml,
    /// SRU response wrapping PICA XML
    Sru,
}

impl InputFormat {
    /// Guess the format from a file name, ignoring a trailing `.gz`.
    ///
    /// `.xml` means PICA XML, `.plain` and `.pp` plain PICA+; everything
    /// else is read as normalized PICA+. SRU responses are never guessed.
    ///
    /// ```
    /// use pica::source::InputFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(InputFormat::from_path(Path::new("dump.xml.gz")), InputFormat::Xml);
    /// assert_eq!(InputFormat::from_path(Path::new("dump.pp")), InputFormat::Plain);
    /// assert_eq!(InputFormat::from_path(Path::new("dump.dat")), InputFormat::Normalized);
    /// ```
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let name = name.strip_suffix(".gz").unwrap_or(&name);

        match name.rsplit_once('.').map(|(_, ext)| ext) {
            Some("xml") => InputFormat::Xml,
            Some("plain" | "pp") => InputFormat::Plain,
            _ => InputFormat::Normalized,
        }
    }
}

/// Open a path for reading.
///
/// Gzip input is recognized by its magic bytes, not its extension, and
/// concatenated gzip members are read as one stream.
///
/// # Errors
///
/// Returns [`PicaError::IoError`](crate::PicaError::IoError) if the file
/// cannot be opened or its first bytes cannot be read.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }

    let mut reader = BufReader::new(File::open(path)?);
    if reader.fill_buf()?.starts_with(&GZIP_MAGIC) {
        debug!(path = %path.display(), "reading gzip-compressed input");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};

    #[test]
    fn test_plain_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"003@ \x1f01\x1e\x1d").unwrap();

        let mut content = Vec::new();
        open_input(file.path()).unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"003@ \x1f01\x1e\x1d");
    }

    #[test]
    fn test_gzip_file_without_extension() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"003@ \x1f01\x1e\x1d").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&compressed).unwrap();

        let mut content = Vec::new();
        open_input(file.path()).unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"003@ \x1f01\x1e\x1d");
    }

    #[test]
    fn test_missing_file() {
        let err = open_input("/nonexistent/records.dat").err().unwrap();
        assert!(matches!(err, crate::PicaError::IoError(_)));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(InputFormat::from_path(Path::new("a.XML")), InputFormat::Xml);
        assert_eq!(InputFormat::from_path(Path::new("a.plain.gz")), InputFormat::Plain);
        assert_eq!(InputFormat::from_path(Path::new("a.dat.gz")), InputFormat::Normalized);
        assert_eq!(InputFormat::from_path(Path::new("noext")), InputFormat::Normalized);
    }
}
