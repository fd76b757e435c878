//! Combine per-range exports into one CSV per calendar year.
//!
//! Exports are concatenated in file-name order with columns aligned by header
//! name. Overlapping retry ranges are not deduplicated.

use crate::error::{HarvestError, Result};
use crate::progress::{ProgressEvent, ProgressSink};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const SUBMISSION_DATE_COLUMN: &str = "Submission Date";
pub const YEAR_COLUMN: &str = "Year";
pub const EXPORT_PREFIX: &str = "res-";
pub const OUTPUT_PREFIX: &str = "civil-remedy-notice-filings-";

const DATETIME_FORMATS: [&str; 6] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];
const DATE_FORMATS: [&str; 2] = ["%m/%d/%Y", "%Y-%m-%d"];

/// One per-year output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearOutput {
    pub year: i32,
    pub rows: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    pub files_read: usize,
    pub rows: usize,
    pub outputs: Vec<YearOutput>,
}

/// Parse a submission date in any of the portal's observed formats.
pub fn parse_submission_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .map(|dt| dt.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
        })
}

/// Per-range exports in `dir`, sorted by file name.
pub fn list_exports(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_export = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(EXPORT_PREFIX) && n.ends_with(".csv"));
        if is_export && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Concatenated rows with a union of column names in first-seen order.
#[derive(Default)]
struct Combined {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    /// Parsed year and cells aligned to `columns` (short rows are padded on write).
    rows: Vec<(i32, Vec<String>)>,
}

impl Combined {
    fn column(&mut self, name: &str) -> usize {
        if let Some(&i) = self.index.get(name) {
            return i;
        }
        self.columns.push(name.to_string());
        self.index.insert(name.to_string(), self.columns.len() - 1);
        self.columns.len() - 1
    }

    /// Append every row of one export. Returns the number of rows read.
    fn read_file(&mut self, path: &Path) -> Result<usize> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Ok(0);
        }

        let date_pos = headers
            .iter()
            .position(|h| h.trim() == SUBMISSION_DATE_COLUMN)
            .ok_or_else(|| HarvestError::MissingColumn {
                file: path.to_path_buf(),
                column: SUBMISSION_DATE_COLUMN.to_string(),
            })?;
        let mapping: Vec<usize> = headers.iter().map(|h| self.column(h.trim())).collect();

        let mut count = 0;
        for record in reader.records() {
            let record = record?;
            let raw_date = record.get(date_pos).unwrap_or("");
            let year = parse_submission_date(raw_date)
                .ok_or_else(|| HarvestError::BadSubmissionDate {
                    file: path.to_path_buf(),
                    value: raw_date.to_string(),
                })?
                .year();

            let mut cells = vec![String::new(); self.columns.len()];
            for (value, &col) in record.iter().zip(&mapping) {
                cells[col] = value.to_string();
            }
            self.rows.push((year, cells));
            count += 1;
        }
        Ok(count)
    }

    fn write_years(&self, out_dir: &Path) -> Result<Vec<YearOutput>> {
        let mut by_year: BTreeMap<i32, Vec<&[String]>> = BTreeMap::new();
        for (year, cells) in &self.rows {
            by_year.entry(*year).or_default().push(cells);
        }

        let mut header = self.columns.clone();
        header.push(YEAR_COLUMN.to_string());

        let mut outputs = Vec::new();
        for (year, rows) in by_year {
            let path = out_dir.join(format!("{OUTPUT_PREFIX}{year}.csv"));
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(&header)?;
            let year_text = year.to_string();
            for cells in &rows {
                let padding = self.columns.len() - cells.len();
                let record = cells
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::repeat("").take(padding))
                    .chain(std::iter::once(year_text.as_str()));
                writer.write_record(record)?;
            }
            writer.flush()?;
            debug!(year, rows = rows.len(), path = %path.display(), "wrote yearly file");
            outputs.push(YearOutput {
                year,
                rows: rows.len(),
                path,
            });
        }
        Ok(outputs)
    }
}

/// Combine every export in `data_dir` and write one file per year to `out_dir`.
pub fn aggregate(data_dir: &Path, out_dir: &Path, sink: &mut dyn ProgressSink) -> Result<AggregateReport> {
    let files = list_exports(data_dir)?;
    sink.emit(ProgressEvent::AggregateStarted { files: files.len() });
    if files.is_empty() {
        warn!(dir = %data_dir.display(), "no exports to aggregate");
        return Ok(AggregateReport::default());
    }

    let mut combined = Combined::default();
    for file in &files {
        let rows = combined.read_file(file)?;
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if rows == 0 {
            sink.emit(ProgressEvent::Warning {
                message: format!("{name} has no rows"),
            });
        }
        sink.emit(ProgressEvent::FileAggregated { file: name, rows });
    }

    std::fs::create_dir_all(out_dir)?;
    let outputs = combined.write_years(out_dir)?;
    for output in &outputs {
        sink.emit(ProgressEvent::YearWritten {
            year: output.year,
            rows: output.rows,
            path: output.path.display().to_string(),
        });
    }

    let report = AggregateReport {
        files_read: files.len(),
        rows: combined.rows.len(),
        outputs,
    };
    info!(
        files = report.files_read,
        rows = report.rows,
        years = report.outputs.len(),
        "aggregated exports"
    );
    Ok(report)
}
