//! Startup check of the download directory.
//!
//! The exporter identifies its download by the portal's fixed file name and by
//! the absence of in-progress markers, so leftovers from an earlier run would
//! be mistaken for fresh exports.

use crate::error::{HarvestError, Result};
use std::path::Path;
use tracing::info;

/// Entries in `dir` that are unfinished downloads or leftover raw exports.
pub fn find_stale_artifacts(dir: &Path, markers: &[&str], raw_prefix: &str) -> Result<Vec<String>> {
    let mut stale = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        let in_progress = markers.iter().any(|m| name.ends_with(m));
        if in_progress || name.starts_with(raw_prefix) {
            stale.push(name);
        }
    }
    stale.sort();
    Ok(stale)
}

/// Fail with [`HarvestError::StaleDownloads`] unless `dir` is clean.
pub fn ensure_clean(dir: &Path, markers: &[&str], raw_prefix: &str) -> Result<()> {
    let files = find_stale_artifacts(dir, markers, raw_prefix)?;
    if !files.is_empty() {
        return Err(HarvestError::StaleDownloads {
            dir: dir.to_path_buf(),
            files,
        });
    }
    info!(dir = %dir.display(), "download directory is clean");
    Ok(())
}
