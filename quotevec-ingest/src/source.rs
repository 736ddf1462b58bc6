//! Tabular record source
//!
//! Two columns with a header row: column 0 is the speaker, column 1 the quote.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quotevec_core::Record;

use crate::error::SourceError;

const COLUMNS: usize = 2;

/// Supplies raw records to the ingestion pipeline.
pub trait RecordSource {
    /// Read every record. Any malformed row fails the whole read.
    fn records(&mut self) -> Result<Vec<Record>, SourceError>;
}

pub struct CsvRecordSource<R: Read> {
    reader: csv::Reader<R>,
}

impl CsvRecordSource<File> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Ok(Self::from_reader(File::open(path)?))
    }
}

impl<R: Read> CsvRecordSource<R> {
    pub fn from_reader(reader: R) -> Self {
        // Flexible so that short rows reach our own column check.
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        Self { reader }
    }
}

impl<R: Read> RecordSource for CsvRecordSource<R> {
    fn records(&mut self) -> Result<Vec<Record>, SourceError> {
        let headers = self.reader.headers()?.clone();
        if headers.is_empty() {
            return Err(SourceError::MissingHeader);
        }
        if headers.len() != COLUMNS {
            return Err(SourceError::Format {
                line: 1,
                expected: COLUMNS,
                found: headers.len(),
            });
        }
        tracing::debug!(headers = ?headers, "Read source header");

        let mut records = Vec::new();
        for row in self.reader.records() {
            let row = row?;
            if row.len() != COLUMNS {
                return Err(SourceError::Format {
                    line: row.position().map(|p| p.line()).unwrap_or(0),
                    expected: COLUMNS,
                    found: row.len(),
                });
            }
            records.push(Record::new(&row[0], &row[1]));
        }

        Ok(records)
    }
}
