//! Configuration loading and resolution.
//!
//! Every setting resolves as explicit flag > `CRN_*` environment variable >
//! built-in default.

use crate::error::{HarvestError, Result};
use crate::period::YearSpan;
use crate::portal::{PortalLayout, DEFAULT_PORTAL_URL};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_START_YEAR: i32 = 2015;
pub const DEFAULT_END_YEAR: i32 = 2023;
pub const DEFAULT_TARGET_DIR: &str = "working_data";

pub const ENV_START_YEAR: &str = "CRN_START_YEAR";
pub const ENV_END_YEAR: &str = "CRN_END_YEAR";
pub const ENV_TARGET_DIR: &str = "CRN_TARGET_DIR";
pub const ENV_DOWNLOAD_DIR: &str = "CRN_DOWNLOAD_DIR";
pub const ENV_PORTAL_URL: &str = "CRN_PORTAL_URL";
pub const ENV_CHROMIUM_PATH: &str = "CRN_CHROMIUM_PATH";

/// Suffixes of files a browser is still writing. Firefox uses `.part`,
/// Chromium `.crdownload`.
pub const IN_PROGRESS_MARKERS: [&str; 2] = [".part", ".crdownload"];

/// Wall-clock deadlines for every wait in the export cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Lookup of a form element before filling or clicking it.
    pub element: Duration,
    /// Search results page (export control) to appear.
    pub results: Duration,
    /// "Too large to export" notice after clicking export.
    pub too_large: Duration,
    /// No in-progress markers left in the download directory.
    pub download_complete: Duration,
    /// Raw export file to appear once downloads settled.
    pub file_ready: Duration,
    /// Interval between polls.
    pub poll: Duration,
    /// Pause after export and after resetting the form.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            element: Duration::from_secs(5),
            results: Duration::from_secs(10),
            too_large: Duration::from_secs(5),
            download_complete: Duration::from_secs(300),
            file_ready: Duration::from_secs(5),
            poll: Duration::from_secs(1),
            settle: Duration::from_secs(1),
        }
    }
}

impl Timeouts {
    /// Millisecond-scale deadlines for tests and dry runs.
    pub fn fast() -> Self {
        Self {
            element: Duration::from_millis(50),
            results: Duration::from_millis(50),
            too_large: Duration::from_millis(20),
            download_complete: Duration::from_millis(200),
            file_ready: Duration::from_millis(50),
            poll: Duration::from_millis(5),
            settle: Duration::ZERO,
        }
    }
}

/// Values supplied on the command line. `None` falls through to env/default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub target_dir: Option<PathBuf>,
    pub download_dir: Option<PathBuf>,
    pub portal_url: Option<String>,
    pub chromium: Option<PathBuf>,
    pub headless: bool,
}

/// Fully resolved harvest configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub span: YearSpan,
    pub target_dir: PathBuf,
    pub download_dir: PathBuf,
    pub portal_url: String,
    pub chromium: Option<PathBuf>,
    pub headless: bool,
    pub layout: PortalLayout,
    pub timeouts: Timeouts,
}

impl HarvestConfig {
    /// Resolve against the process environment.
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        Self::resolve_with(overrides, |name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary environment lookup.
    pub fn resolve_with<F>(overrides: ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let span = resolve_span_with(overrides.start_year, overrides.end_year, &env)?;
        let target_dir = resolve_target_dir_with(overrides.target_dir, &env);
        let download_dir = resolve_download_dir_with(overrides.download_dir, &env)?;

        let portal_url = overrides
            .portal_url
            .or_else(|| env(ENV_PORTAL_URL))
            .unwrap_or_else(|| DEFAULT_PORTAL_URL.to_string());

        let chromium = overrides
            .chromium
            .or_else(|| env(ENV_CHROMIUM_PATH).map(PathBuf::from));

        Ok(Self {
            span,
            target_dir,
            download_dir,
            portal_url,
            chromium,
            headless: overrides.headless,
            layout: PortalLayout::default(),
            timeouts: Timeouts::default(),
        })
    }
}

/// Resolve the year span from flags and `CRN_START_YEAR`/`CRN_END_YEAR`.
pub fn resolve_span(start: Option<i32>, end: Option<i32>) -> Result<YearSpan> {
    resolve_span_with(start, end, |name| std::env::var(name).ok())
}

fn resolve_span_with<F>(start: Option<i32>, end: Option<i32>, env: F) -> Result<YearSpan>
where
    F: Fn(&str) -> Option<String>,
{
    let start = resolve_year(start, ENV_START_YEAR, DEFAULT_START_YEAR, &env)?;
    let end = resolve_year(end, ENV_END_YEAR, DEFAULT_END_YEAR, &env)?;
    YearSpan::new(start, end)
}

fn resolve_year<F>(explicit: Option<i32>, name: &str, default: i32, env: &F) -> Result<i32>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(year) = explicit {
        return Ok(year);
    }
    match env(name) {
        Some(raw) => raw.trim().parse().map_err(|_| HarvestError::InvalidConfig {
            name: name.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

/// Resolve the working directory that receives per-range exports.
pub fn resolve_target_dir(explicit: Option<PathBuf>) -> PathBuf {
    resolve_target_dir_with(explicit, |name| std::env::var(name).ok())
}

fn resolve_target_dir_with<F>(explicit: Option<PathBuf>, env: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    explicit
        .or_else(|| env(ENV_TARGET_DIR).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TARGET_DIR))
}

/// Resolve the directory the browser saves downloads into.
pub fn resolve_download_dir(explicit: Option<PathBuf>) -> Result<PathBuf> {
    resolve_download_dir_with(explicit, |name| std::env::var(name).ok())
}

fn resolve_download_dir_with<F>(explicit: Option<PathBuf>, env: F) -> Result<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = explicit.or_else(|| env(ENV_DOWNLOAD_DIR).map(PathBuf::from)) {
        return Ok(dir);
    }
    default_download_dir()
}

/// The platform's default download directory.
pub fn default_download_dir() -> Result<PathBuf> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or(HarvestError::DownloadDirUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn with_download_dir() -> ConfigOverrides {
        ConfigOverrides {
            download_dir: Some(PathBuf::from("/tmp/dl")),
            ..ConfigOverrides::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = HarvestConfig::resolve_with(with_download_dir(), env_of(&[])).unwrap();
        assert_eq!(cfg.span, YearSpan::new(2015, 2023).unwrap());
        assert_eq!(cfg.target_dir, PathBuf::from("working_data"));
        assert_eq!(cfg.portal_url, DEFAULT_PORTAL_URL);
        assert_eq!(cfg.timeouts, Timeouts::default());
        assert!(cfg.chromium.is_none());
    }

    #[test]
    fn test_env_overrides_default() {
        let env = env_of(&[
            (ENV_START_YEAR, "2019"),
            (ENV_END_YEAR, " 2020 "),
            (ENV_TARGET_DIR, "/data/crn"),
            (ENV_DOWNLOAD_DIR, "/data/dl"),
        ]);
        let cfg = HarvestConfig::resolve_with(ConfigOverrides::default(), env).unwrap();
        assert_eq!(cfg.span, YearSpan::new(2019, 2020).unwrap());
        assert_eq!(cfg.target_dir, PathBuf::from("/data/crn"));
        assert_eq!(cfg.download_dir, PathBuf::from("/data/dl"));
    }

    #[test]
    fn test_flag_overrides_env() {
        let env = env_of(&[(ENV_START_YEAR, "2019"), (ENV_TARGET_DIR, "/data/crn")]);
        let overrides = ConfigOverrides {
            start_year: Some(2021),
            end_year: Some(2022),
            target_dir: Some(PathBuf::from("out")),
            ..with_download_dir()
        };
        let cfg = HarvestConfig::resolve_with(overrides, env).unwrap();
        assert_eq!(cfg.span.start(), 2021);
        assert_eq!(cfg.target_dir, PathBuf::from("out"));
        assert_eq!(cfg.download_dir, PathBuf::from("/tmp/dl"));
    }

    #[test]
    fn test_invalid_env_year_is_an_error() {
        let env = env_of(&[(ENV_END_YEAR, "soon")]);
        let err = HarvestConfig::resolve_with(with_download_dir(), env).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidConfig { ref name, .. } if name == ENV_END_YEAR));
    }

    #[test]
    fn test_inverted_span_is_an_error() {
        let overrides = ConfigOverrides {
            start_year: Some(2023),
            end_year: Some(2020),
            ..with_download_dir()
        };
        let err = HarvestConfig::resolve_with(overrides, env_of(&[])).unwrap_err();
        assert!(matches!(err, HarvestError::InvalidYearSpan { start: 2023, end: 2020 }));
    }

    #[test]
    fn test_fast_timeouts_are_shorter() {
        let fast = Timeouts::fast();
        let slow = Timeouts::default();
        assert!(fast.download_complete < slow.download_complete);
        assert!(fast.poll < slow.poll);
    }
}
