//! Downloading portal exports to disk.
//!
//! - [`preflight`]: refuse to start when the download directory has leftovers
//! - [`wait`]: deadline-bounded filesystem polling
//! - [`exporter`]: the per-range search/export/rename cycle

pub mod exporter;
pub mod preflight;
pub mod wait;

use crate::period::DateRange;
use async_trait::async_trait;

pub use exporter::{ExportOutcome, PortalExporter};

/// Fetches the filings of one date range into the working directory.
///
/// Returns `false` for every expected failure (export too large, a wait
/// timed out, the browser misbehaved); the retry ladder handles those.
#[async_trait]
pub trait RangeDownloader: Send {
    async fn download(&mut self, range: &DateRange) -> bool;
}
