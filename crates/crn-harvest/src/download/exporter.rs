//! One search/export cycle per date range.
//!
//! For each range the exporter fills the submission date fields, searches,
//! clicks export, and then either sees the portal's "too large to export"
//! notice or waits for the browser to finish writing the raw export. The raw
//! file is renamed after the range and moved into the working directory.
//! The search form is reset after every attempt, successful or not.

use super::wait::{wait_for_downloads, wait_for_file};
use super::RangeDownloader;
use crate::config::{Timeouts, IN_PROGRESS_MARKERS};
use crate::driver::{Locator, PortalDriver};
use crate::period::DateRange;
use crate::portal::PortalLayout;
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a single export attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExportOutcome {
    /// The export was saved at this path.
    Saved { path: PathBuf },
    /// The portal refused to export this many results.
    TooLarge,
    /// The results page never offered an export control.
    NoResults,
    /// A download was still in progress at the deadline.
    DownloadStalled,
    /// Downloads settled but the raw export never appeared.
    FileMissing,
    /// The browser or filesystem failed.
    Failed { reason: String },
}

impl ExportOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Drives the portal through a [`PortalDriver`] and files the exports.
pub struct PortalExporter<D> {
    driver: D,
    portal_url: String,
    download_dir: PathBuf,
    target_dir: PathBuf,
    layout: PortalLayout,
    timeouts: Timeouts,
}

impl<D: PortalDriver> PortalExporter<D> {
    pub fn new(
        driver: D,
        portal_url: impl Into<String>,
        download_dir: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            driver,
            portal_url: portal_url.into(),
            download_dir: download_dir.into(),
            target_dir: target_dir.into(),
            layout: PortalLayout::default(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_layout(mut self, layout: PortalLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Give the driver back, e.g. to close the browser.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Load the search page.
    pub async fn open(&mut self) -> anyhow::Result<()> {
        info!(url = %self.portal_url, "opening search portal");
        self.driver.navigate(&self.portal_url).await
    }

    /// Run one full cycle for `range`, including the form reset.
    pub async fn export(&mut self, range: &DateRange) -> ExportOutcome {
        let outcome = match self.attempt(range).await {
            Ok(outcome) => outcome,
            Err(e) => ExportOutcome::Failed {
                reason: format!("{e:#}"),
            },
        };
        match &outcome {
            ExportOutcome::Saved { path } => {
                debug!(label = range.label(), path = %path.display(), "export saved")
            }
            ExportOutcome::Failed { reason } => {
                warn!(label = range.label(), %reason, "export failed")
            }
            other => debug!(label = range.label(), outcome = ?other, "export not saved"),
        }
        self.reset().await;
        outcome
    }

    async fn attempt(&mut self, range: &DateRange) -> anyhow::Result<ExportOutcome> {
        self.discard_stray_exports()?;
        let layout = &self.layout;
        let t = self.timeouts;

        self.driver
            .fill(&layout.start_date_field, &range.start_text())
            .await?;
        self.driver
            .fill(&layout.end_date_field, &range.end_text())
            .await?;
        self.driver.click(&layout.search_button).await?;

        if !self
            .driver
            .wait_for(&Locator::css(&layout.export_link), t.results)
            .await?
        {
            return Ok(ExportOutcome::NoResults);
        }
        self.driver.click(&layout.export_link).await?;

        // Whichever resolves first wins: a notice within the short window
        // means no file is coming, otherwise assume a download started.
        if self
            .driver
            .wait_for(&Locator::text(&layout.too_large_text), t.too_large)
            .await?
        {
            return Ok(ExportOutcome::TooLarge);
        }

        if !wait_for_downloads(
            &self.download_dir,
            &IN_PROGRESS_MARKERS,
            t.settle,
            t.download_complete,
            t.poll,
        )
        .await?
        {
            self.discard_stray_exports()?;
            return Ok(ExportOutcome::DownloadStalled);
        }

        let raw = self.download_dir.join(&self.layout.raw_export_file);
        if !wait_for_file(&raw, t.file_ready, t.poll).await? {
            self.discard_stray_exports()?;
            return Ok(ExportOutcome::FileMissing);
        }

        let path = self.file_export(&raw, range)?;
        Ok(ExportOutcome::Saved { path })
    }

    /// Remove finished raw exports that no range can claim any more, such as
    /// one that landed after its range gave up or under a browser-deduplicated
    /// name. Files still being written are only reported. Returns the number
    /// of files removed.
    fn discard_stray_exports(&self) -> std::io::Result<usize> {
        let prefix = self.layout.raw_export_prefix();
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.download_dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            if IN_PROGRESS_MARKERS.iter().any(|m| name.ends_with(m)) {
                warn!(file = name, "raw export still being written by an abandoned attempt");
                continue;
            }
            warn!(file = name, "discarding raw export not claimed by any range");
            std::fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    /// Rename the raw export after the range and move it to the target dir.
    fn file_export(&self, raw: &Path, range: &DateRange) -> std::io::Result<PathBuf> {
        let file_name = format!("{}.csv", range.file_stem());
        let renamed = self.download_dir.join(&file_name);
        std::fs::rename(raw, &renamed)?;

        std::fs::create_dir_all(&self.target_dir)?;
        let dest = self.target_dir.join(&file_name);
        move_file(&renamed, &dest)?;
        Ok(dest)
    }

    /// Return to the search form. Falls back to reloading the portal when
    /// the edit-search control is unavailable.
    async fn reset(&mut self) {
        if let Err(e) = self.driver.click(&self.layout.edit_search_button).await {
            debug!(error = %e, "edit search unavailable, reloading portal");
            if let Err(e) = self.driver.navigate(&self.portal_url).await {
                warn!(error = %format!("{e:#}"), "failed to reload portal");
            }
        }
        if !self.timeouts.settle.is_zero() {
            tokio::time::sleep(self.timeouts.settle).await;
        }
    }
}

#[async_trait]
impl<D: PortalDriver> RangeDownloader for PortalExporter<D> {
    async fn download(&mut self, range: &DateRange) -> bool {
        self.export(range).await.is_saved()
    }
}

/// Move a file, copying across filesystems when a rename is not possible.
pub fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::Duration;

    /// What the fake portal does when export is clicked.
    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Download,
        TooLarge,
        NoResults,
        Silent,
        /// Saves the export under a name the exporter does not wait for.
        Misnamed,
    }

    struct FakePortal {
        download_dir: PathBuf,
        behavior: Behavior,
        too_large_shown: bool,
        edit_search_broken: bool,
        calls: Vec<String>,
    }

    impl FakePortal {
        fn new(download_dir: &Path, behavior: Behavior) -> Self {
            Self {
                download_dir: download_dir.to_path_buf(),
                behavior,
                too_large_shown: false,
                edit_search_broken: false,
                calls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PortalDriver for FakePortal {
        async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
            self.calls.push(format!("navigate {url}"));
            Ok(())
        }

        async fn fill(&mut self, selector: &str, text: &str) -> anyhow::Result<()> {
            self.calls.push(format!("fill {selector} {text}"));
            Ok(())
        }

        async fn click(&mut self, selector: &str) -> anyhow::Result<()> {
            self.calls.push(format!("click {selector}"));
            let layout = PortalLayout::default();
            if selector == layout.edit_search_button && self.edit_search_broken {
                anyhow::bail!("no such element");
            }
            if selector == layout.export_link {
                match self.behavior {
                    Behavior::Download => {
                        std::fs::write(
                            self.download_dir.join(&layout.raw_export_file),
                            "Submission Date\n01/02/2020\n",
                        )?;
                    }
                    Behavior::TooLarge => self.too_large_shown = true,
                    Behavior::Misnamed => {
                        std::fs::write(self.download_dir.join("FilingSearch (1).csv"), "late\n")?;
                    }
                    _ => {}
                }
            }
            Ok(())
        }

        async fn wait_for(&mut self, locator: &Locator, _timeout: Duration) -> anyhow::Result<bool> {
            Ok(match locator {
                Locator::Css(_) => self.behavior != Behavior::NoResults,
                Locator::Text(_) => self.too_large_shown,
            })
        }

        async fn close(self: Box<Self>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn march() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2020, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 3, 31).unwrap(),
            "2020-3",
        )
        .unwrap()
    }

    fn exporter(
        dirs: &(tempfile::TempDir, tempfile::TempDir),
        behavior: Behavior,
    ) -> PortalExporter<FakePortal> {
        PortalExporter::new(
            FakePortal::new(dirs.0.path(), behavior),
            "https://portal.test/search",
            dirs.0.path(),
            dirs.1.path().join("working"),
        )
        .with_timeouts(Timeouts::fast())
    }

    fn temp_dirs() -> (tempfile::TempDir, tempfile::TempDir) {
        (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap())
    }

    #[tokio::test]
    async fn test_successful_export_is_renamed_and_moved() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::Download);

        let outcome = exp.export(&march()).await;
        let dest = dirs.1.path().join("working").join("res-2020-3.csv");
        assert_eq!(outcome, ExportOutcome::Saved { path: dest.clone() });
        assert!(dest.exists());
        assert!(!dirs.0.path().join("FilingSearch.csv").exists());
        assert!(!dirs.0.path().join("res-2020-3.csv").exists());

        let layout = PortalLayout::default();
        let calls = &exp.driver().calls;
        assert_eq!(calls[0], format!("fill {} 03/01/2020", layout.start_date_field));
        assert_eq!(calls[1], format!("fill {} 03/31/2020", layout.end_date_field));
        assert_eq!(calls[2], format!("click {}", layout.search_button));
        assert_eq!(calls[3], format!("click {}", layout.export_link));
        assert_eq!(calls.last().unwrap(), &format!("click {}", layout.edit_search_button));
    }

    #[tokio::test]
    async fn test_too_large_reports_failure_without_file() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::TooLarge);

        assert!(!exp.download(&march()).await);
        assert!(!dirs.1.path().join("working").join("res-2020-3.csv").exists());
        let edit = format!("click {}", PortalLayout::default().edit_search_button);
        assert_eq!(exp.driver().calls.last().unwrap(), &edit);
    }

    #[tokio::test]
    async fn test_missing_export_control_still_resets_form() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::NoResults);

        assert_eq!(exp.export(&march()).await, ExportOutcome::NoResults);
        let layout = PortalLayout::default();
        let calls = &exp.driver().calls;
        assert!(!calls.contains(&format!("click {}", layout.export_link)));
        assert_eq!(calls.last().unwrap(), &format!("click {}", layout.edit_search_button));
    }

    #[tokio::test]
    async fn test_export_without_file_times_out() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::Silent);
        assert_eq!(exp.export(&march()).await, ExportOutcome::FileMissing);
    }

    #[tokio::test]
    async fn test_stuck_partial_download_stalls() {
        let dirs = temp_dirs();
        std::fs::write(dirs.0.path().join("FilingSearch.csv.part"), b"").unwrap();
        let mut exp = exporter(&dirs, Behavior::Download);
        assert_eq!(exp.export(&march()).await, ExportOutcome::DownloadStalled);
        // The finished raw file belongs to no range; the partial one is left alone
        assert!(!dirs.0.path().join("FilingSearch.csv").exists());
        assert!(dirs.0.path().join("FilingSearch.csv.part").exists());
    }

    #[tokio::test]
    async fn test_leftover_raw_export_is_not_claimed_by_next_range() {
        let dirs = temp_dirs();
        std::fs::write(
            dirs.0.path().join("FilingSearch.csv"),
            "Submission Date\n02/27/2020\n",
        )
        .unwrap();
        let mut exp = exporter(&dirs, Behavior::Silent);

        assert_eq!(exp.export(&march()).await, ExportOutcome::FileMissing);
        assert!(!dirs.1.path().join("working").join("res-2020-3.csv").exists());
        assert!(!dirs.0.path().join("FilingSearch.csv").exists());
    }

    #[tokio::test]
    async fn test_misnamed_export_is_discarded() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::Misnamed);

        assert_eq!(exp.export(&march()).await, ExportOutcome::FileMissing);
        assert_eq!(std::fs::read_dir(dirs.0.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_broken_reset_reloads_portal() {
        let dirs = temp_dirs();
        let mut exp = exporter(&dirs, Behavior::TooLarge);
        exp.driver.edit_search_broken = true;

        exp.export(&march()).await;
        assert_eq!(
            exp.driver().calls.last().unwrap(),
            "navigate https://portal.test/search"
        );
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_range_results_stay_below_info() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        for behavior in [Behavior::Download, Behavior::TooLarge, Behavior::NoResults] {
            let dirs = temp_dirs();
            exporter(&dirs, behavior).export(&march()).await;
        }

        // Anything at info would land in the middle of a `>> Downloading` line
        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn test_move_file_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.csv");
        let to = dir.path().join("b.csv");
        std::fs::write(&from, "new").unwrap();
        std::fs::write(&to, "old").unwrap();
        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "new");
    }
}
