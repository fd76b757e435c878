//! Record of ranges that could not be downloaded.

use crate::error::Result;
use crate::period::DateRange;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the missing-range manifest inside the working directory.
pub const MISSING_FILES_NAME: &str = "missing_files.csv";

#[derive(Debug, Serialize)]
struct MissingRecord<'a> {
    start_date: String,
    end_date: String,
    title: &'a str,
}

impl<'a> From<&'a DateRange> for MissingRecord<'a> {
    fn from(range: &'a DateRange) -> Self {
        Self {
            start_date: range.start_text(),
            end_date: range.end_text(),
            title: range.label(),
        }
    }
}

/// Write `{dir}/missing_files.csv` listing `ranges`.
pub fn write_missing(dir: &Path, ranges: &[DateRange]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(MISSING_FILES_NAME);

    let mut writer = csv::Writer::from_path(&path)?;
    if ranges.is_empty() {
        writer.write_record(["start_date", "end_date", "title"])?;
    }
    for range in ranges {
        writer.serialize(MissingRecord::from(range))?;
    }
    writer.flush()?;

    info!(path = %path.display(), count = ranges.len(), "wrote missing-range manifest");
    Ok(path)
}

/// Remove a manifest left by an earlier run. Returns whether one existed.
pub fn clear_missing(dir: &Path) -> Result<bool> {
    let path = dir.join(MISSING_FILES_NAME);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Plain-text table of missing ranges for the terminal.
pub fn render_table(ranges: &[DateRange]) -> String {
    let width = ranges
        .iter()
        .map(|r| r.label().len())
        .max()
        .unwrap_or(0)
        .max("title".len());

    let mut out = format!("{:>4}  {:<10}  {:<10}  {:<width$}\n", "", "start_date", "end_date", "title");
    for (i, range) in ranges.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<10}  {:<10}  {:<width$}\n",
            i,
            range.start_text(),
            range.end_text(),
            range.label()
        ));
    }
    out
}
