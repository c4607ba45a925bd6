//! CSV, JSON and summary output
//!
//! The three representations are written independently: a failure in one is
//! recorded in the `WriteReport` and the others are still attempted.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{CanonicalRecord, RunSummary, WriteError};
use crate::infrastructure::config::OutputConfig;

const BASE_COLUMNS: [&str; 9] = [
    "Date",
    "User Name",
    "Score",
    "Review Text",
    "Helpful Count",
    "Title",
    "Source",
    "Region",
    "Rating Origin",
];
const STORE_COLUMNS: [&str; 1] = ["App Version"];
const TICKET_COLUMNS: [&str; 4] = ["Ticket ID", "Ticket Status", "Ticket Priority", "Ticket Tags"];

/// Target files for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub summary: PathBuf,
}

/// Outcome of each representation.
#[derive(Debug)]
pub struct WriteReport {
    pub csv: Result<PathBuf, WriteError>,
    pub json: Result<PathBuf, WriteError>,
    pub summary: Result<PathBuf, WriteError>,
}

impl WriteReport {
    pub fn is_complete(&self) -> bool {
        self.csv.is_ok() && self.json.is_ok() && self.summary.is_ok()
    }

    pub fn failures(&self) -> Vec<&WriteError> {
        [&self.csv, &self.json, &self.summary]
            .into_iter()
            .filter_map(|result| result.as_ref().err())
            .collect()
    }

    pub fn written(&self) -> Vec<&Path> {
        [&self.csv, &self.json, &self.summary]
            .into_iter()
            .filter_map(|result| result.as_ref().ok().map(PathBuf::as_path))
            .collect()
    }
}

/// Optional column groups present in a record set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CsvLayout {
    pub store_columns: bool,
    pub ticket_columns: bool,
}

impl CsvLayout {
    pub fn for_records(records: &[CanonicalRecord]) -> Self {
        Self {
            store_columns: records.iter().any(|r| !r.source.is_ticketing()),
            ticket_columns: records.iter().any(|r| r.source.is_ticketing()),
        }
    }

    pub fn header(&self) -> Vec<&'static str> {
        let mut header = BASE_COLUMNS.to_vec();
        if self.store_columns {
            header.extend(STORE_COLUMNS);
        }
        if self.ticket_columns {
            header.extend(TICKET_COLUMNS);
        }
        header
    }

    fn row(&self, record: &CanonicalRecord) -> Vec<CsvField> {
        let mut row = vec![
            CsvField::text(&record.date),
            CsvField::text(&record.author),
            CsvField::number(record.rating.map(|r| r.to_string())),
            CsvField::text(&record.body),
            CsvField::number(Some(record.helpful_count.to_string())),
            CsvField::text(record.title.as_deref().unwrap_or_default()),
            CsvField::text(record.source.as_str()),
            CsvField::text(record.region.as_deref().unwrap_or_default()),
            CsvField::text(record.rating_origin.map(|o| o.as_str()).unwrap_or_default()),
        ];
        if self.store_columns {
            row.push(CsvField::text(record.app_version.as_deref().unwrap_or_default()));
        }
        if self.ticket_columns {
            let ticket = record.ticket.clone().unwrap_or_default();
            row.push(CsvField::number(ticket.ticket_id.map(|id| id.to_string())));
            row.push(CsvField::text(ticket.ticket_status.as_deref().unwrap_or_default()));
            row.push(CsvField::text(ticket.ticket_priority.as_deref().unwrap_or_default()));
            row.push(CsvField::text(&ticket.ticket_tags.join(", ")));
        }
        row
    }
}

/// A CSV cell. Quoting is decided by column, never by content, so text that
/// happens to look numeric (an author `12345`, a version `2.0`) stays quoted.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CsvField {
    Text(String),
    /// Bare digits; `None` writes an empty cell.
    Number(Option<String>),
}

impl CsvField {
    fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    const fn number(value: Option<String>) -> Self {
        Self::Number(value)
    }

    fn render(&self) -> String {
        match self {
            Self::Text(text) => format!("\"{}\"", text.replace('"', "\"\"")),
            Self::Number(value) => value.clone().unwrap_or_default(),
        }
    }
}

pub struct ResultWriter {
    config: OutputConfig,
}

impl ResultWriter {
    pub const fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// File names for a run started at `started_at`.
    pub fn paths(&self, started_at: DateTime<Utc>) -> OutputPaths {
        let stem = if self.config.timestamped {
            format!("{}_{}", self.config.file_stem, started_at.format("%Y%m%dT%H%M%SZ"))
        } else {
            self.config.file_stem.clone()
        };
        let dir = &self.config.directory;
        OutputPaths {
            csv: dir.join(format!("{stem}.csv")),
            json: dir.join(format!("{stem}.json")),
            summary: dir.join(format!("{stem}_summary.json")),
        }
    }

    /// Write every representation, attempting each one regardless of the others.
    pub fn write(&self, records: &[CanonicalRecord], summary: &RunSummary) -> WriteReport {
        let paths = self.paths(summary.generated_at);

        let report = WriteReport {
            csv: write_csv(&paths.csv, records).map(|()| paths.csv.clone()),
            json: write_json(&paths.json, records).map(|()| paths.json.clone()),
            summary: write_json(&paths.summary, summary).map(|()| paths.summary.clone()),
        };

        for path in report.written() {
            info!("💾 Wrote {}", path.display());
        }
        for failure in report.failures() {
            warn!("Output failed: {}", failure);
        }
        report
    }
}

fn create_file(path: &Path) -> Result<BufWriter<File>, WriteError> {
    let io_error = |source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    File::create(path).map(BufWriter::new).map_err(io_error)
}

/// CSV with quoted text columns, bare numeric columns and optional column groups.
pub fn write_csv(path: &Path, records: &[CanonicalRecord]) -> Result<(), WriteError> {
    let file = create_file(path)?;
    write_csv_to(file, records).map_err(|message| WriteError::Csv {
        path: path.to_path_buf(),
        message,
    })
}

/// Serialize records as CSV into any writer.
pub fn write_csv_to<W: Write>(writer: W, records: &[CanonicalRecord]) -> Result<(), String> {
    let layout = CsvLayout::for_records(records);
    // Cells arrive already quoted by `CsvField::render`
    let mut csv_writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .from_writer(writer);

    let header = layout.header().into_iter().map(|name| CsvField::text(name).render());
    csv_writer
        .write_record(header)
        .map_err(|e| e.to_string())?;
    for record in records {
        csv_writer
            .write_record(layout.row(record).iter().map(CsvField::render))
            .map_err(|e| e.to_string())?;
    }
    csv_writer.flush().map_err(|e| e.to_string())
}

/// Pretty-printed JSON.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), WriteError> {
    let mut file = create_file(path)?;
    serde_json::to_writer_pretty(&mut file, value).map_err(|e| WriteError::Json {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    file.flush().map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })
}
