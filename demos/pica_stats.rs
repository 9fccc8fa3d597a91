//! Read PICA+ dumps, optionally select fields, and report counts and tag statistics.
//!
//! Usage:
//! ```bash
//! cargo run --example pica_stats -- [options] <input>...
//! ```
//!
//! Options:
//! - `--select SELECTOR`  write only the selected fields (e.g. `021A$a`)
//! - `--limit N`          stop each input after N records (N <= 0 means 10)
//! - `--format FORMAT`    output format: `normalized`, `plain` (default) or `xml`
//! - `--sru`              read every input as an SRU response
//! - `--count`            discard the output, print counts only
//! - `--stats`            print tag statistics as JSON to stderr
//!
//! Inputs may be gzip-compressed; `-` reads standard input.

use clap::{Parser as ClapParser, ValueEnum};
use pica::{
    FieldSelector, InputFormat, OutputFormat, Parser, ParserOptions, TagStatistics, Writer,
};
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Normalized,
    Plain,
    Xml,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Normalized => OutputFormat::Normalized,
            Format::Plain => OutputFormat::Plain,
            Format::Xml => OutputFormat::Xml,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(name = "pica_stats")]
#[command(about = "Read PICA+ dumps, select fields and count tags")]
struct Options {
    /// Input files (gzip allowed, `-` for stdin)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Write only the selected fields (e.g. `021A$a`)
    #[arg(long = "select")]
    selector: Option<FieldSelector>,
    /// Stop each input after N records (N <= 0 means 10)
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,
    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Plain)]
    format: Format,
    /// Read every input as an SRU response
    #[arg(long)]
    sru: bool,
    /// Discard the output, print counts only
    #[arg(long)]
    count: bool,
    /// Print tag statistics as JSON to stderr
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let options = Options::parse();

    let sink: Box<dyn Write> = if options.count {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout().lock())
    };
    let writer = RefCell::new(
        Writer::new(sink, options.format.into())
            .line_breaks(true)
            .with_statistics(),
    );

    let mut parser_options = ParserOptions::new();
    if let Some(limit) = options.limit {
        parser_options = parser_options.limit(limit);
    }

    let mut parser = Parser::new(parser_options);
    parser = match &options.selector {
        // Selection mode: selected fields are written, records are not
        Some(selector) => parser.on_field(|field| {
            if let Some(selected) = selector.select(&field) {
                writer.borrow_mut().write_field(&selected)?;
            }
            Ok(None)
        }),
        None => parser.on_record(|record| writer.borrow_mut().write_record(&record)),
    };

    let mut failed_sources = 0;
    for input in &options.inputs {
        let format = if options.sru {
            InputFormat::Sru
        } else {
            InputFormat::from_path(input)
        };
        match parser.parse_file_as(input, format) {
            Ok(summary) => eprintln!(
                "{}: {} records read, {} emitted, {} malformed records, {} malformed fields{}",
                input.display(),
                summary.processed,
                summary.emitted,
                summary.malformed_records,
                summary.malformed_fields,
                if summary.limit_reached { " (limit reached)" } else { "" },
            ),
            // A failing source does not stop the remaining ones
            Err(err) => {
                failed_sources += 1;
                eprintln!("{}: {err}", input.display());
            },
        }
    }

    let total = parser.counter();
    drop(parser);

    let mut writer = writer.into_inner();
    writer.finish()?;
    eprintln!(
        "total: {total} records read, {} records and {} fields written, {failed_sources} failed sources",
        writer.records_written(),
        writer.fields_written(),
    );

    if options.stats {
        let statistics = writer.take_statistics().unwrap_or_else(TagStatistics::new);
        eprintln!("{}", statistics.to_json()?);
    }
    Ok(())
}
