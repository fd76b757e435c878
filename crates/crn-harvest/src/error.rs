//! Error types for the harvester library.

use std::path::PathBuf;

/// All errors the harvester library can produce.
///
/// Expected per-range failures ("too large to export", wait timeouts) are not
/// errors: the exporter reports them as `false` and the retry ladder picks
/// them up at a finer granularity.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("unknown granularity: {0} (expected day, 3-day, week, half-month, month, quarter or year)")]
    UnknownGranularity(String),

    #[error("invalid year span: {start}..={end}")]
    InvalidYearSpan { start: i32, end: i32 },

    #[error("invalid calendar date: {year}-{month}-{day}")]
    InvalidDate { year: i32, month: u32, day: u32 },

    #[error("date range {label} ends before it starts")]
    InvertedRange { label: String },

    #[error(
        "stale download artifacts in {}: {}. Please remove them and try again",
        dir.display(),
        files.join(", ")
    )]
    StaleDownloads { dir: PathBuf, files: Vec<String> },

    #[error("could not determine a download directory for this platform")]
    DownloadDirUnavailable,

    #[error("invalid value for {name}: {value}")]
    InvalidConfig { name: String, value: String },

    #[error("column `{column}` not found in {}", file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("unparseable submission date `{value}` in {}", file.display())]
    BadSubmissionDate { file: PathBuf, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, HarvestError>;
