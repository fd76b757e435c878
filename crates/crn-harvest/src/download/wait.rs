//! Filesystem polling with deadlines.

use crate::error::Result;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Poll `check` every `interval` until it returns true or `timeout` elapses.
///
/// The check always runs at least once. Errors from `check` abort the wait.
pub async fn poll_until<F>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check()? {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Names of entries in `dir` that end with one of `markers`.
pub fn in_progress_files(dir: &Path, markers: &[&str]) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if markers.iter().any(|m| name.ends_with(m)) {
            found.push(name);
        }
    }
    found.sort();
    Ok(found)
}

/// Wait until no in-progress download marker remains in `dir`.
///
/// Sleeps `settle` first so a download the browser has only just begun has
/// time to create its marker.
pub async fn wait_for_downloads(
    dir: &Path,
    markers: &[&str],
    settle: Duration,
    timeout: Duration,
    interval: Duration,
) -> Result<bool> {
    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    let done = poll_until(timeout, interval, || {
        Ok(in_progress_files(dir, markers)?.is_empty())
    })
    .await?;
    if !done {
        debug!(dir = %dir.display(), "downloads still in progress at deadline");
    }
    Ok(done)
}

/// Wait until `path` exists.
pub async fn wait_for_file(path: &Path, timeout: Duration, interval: Duration) -> Result<bool> {
    poll_until(timeout, interval, || Ok(path.exists())).await
}
