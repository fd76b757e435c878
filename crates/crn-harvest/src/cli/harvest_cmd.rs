//! CLI handler for `crn-harvest harvest`.

use crate::aggregate;
use crate::cli::output::{self, ConsoleSink};
use crate::config::{ConfigOverrides, HarvestConfig, IN_PROGRESS_MARKERS};
use crate::download::{preflight, PortalExporter};
use crate::driver::chromium::{ChromiumDriver, ChromiumOptions};
use crate::driver::PortalDriver;
use crate::manifest;
use crate::retry;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args, Debug, Clone, Default)]
pub struct HarvestArgs {
    /// First year to harvest (inclusive) [env: CRN_START_YEAR, default: 2015]
    #[arg(long)]
    pub start_year: Option<i32>,
    /// Last year to harvest (inclusive) [env: CRN_END_YEAR, default: 2023]
    #[arg(long)]
    pub end_year: Option<i32>,
    /// Working directory for per-range exports and yearly files [env: CRN_TARGET_DIR]
    #[arg(long)]
    pub target_dir: Option<PathBuf>,
    /// Directory the browser saves downloads into [env: CRN_DOWNLOAD_DIR]
    #[arg(long)]
    pub download_dir: Option<PathBuf>,
    /// Search page of the portal [env: CRN_PORTAL_URL]
    #[arg(long)]
    pub portal_url: Option<String>,
    /// Chromium/Chrome binary [env: CRN_CHROMIUM_PATH]
    #[arg(long)]
    pub chromium: Option<PathBuf>,
    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,
    /// Stop after downloading; do not build the yearly files
    #[arg(long)]
    pub skip_aggregate: bool,
}

impl HarvestArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            start_year: self.start_year,
            end_year: self.end_year,
            target_dir: self.target_dir.clone(),
            download_dir: self.download_dir.clone(),
            portal_url: self.portal_url.clone(),
            chromium: self.chromium.clone(),
            headless: !self.headed,
        }
    }
}

/// Run the harvest command.
pub async fn run(args: HarvestArgs) -> Result<()> {
    let config = HarvestConfig::resolve(args.overrides())?;
    info!(
        start = config.span.start(),
        end = config.span.end(),
        target = %config.target_dir.display(),
        downloads = %config.download_dir.display(),
        "starting harvest"
    );

    std::fs::create_dir_all(&config.download_dir).with_context(|| {
        format!("cannot create download directory {}", config.download_dir.display())
    })?;
    preflight::ensure_clean(
        &config.download_dir,
        &IN_PROGRESS_MARKERS,
        config.layout.raw_export_prefix(),
    )?;
    std::fs::create_dir_all(&config.target_dir).with_context(|| {
        format!("cannot create target directory {}", config.target_dir.display())
    })?;

    let driver = ChromiumDriver::launch(ChromiumOptions {
        executable: config.chromium.clone(),
        headless: config.headless,
        download_dir: config.download_dir.clone(),
        element_timeout: config.timeouts.element,
    })
    .await?;

    let mut exporter = PortalExporter::new(
        driver,
        config.portal_url.clone(),
        config.download_dir.clone(),
        config.target_dir.clone(),
    )
    .with_layout(config.layout.clone())
    .with_timeouts(config.timeouts);

    let mut sink = ConsoleSink::new();
    let outcome = async {
        exporter.open().await?;
        let report = retry::run_ladder(&mut exporter, config.span, &mut sink).await?;
        anyhow::Ok(report)
    }
    .await;

    if let Err(e) = Box::new(exporter.into_driver()).close().await {
        warn!("failed to close browser: {e:#}");
    }
    let report = outcome?;

    if report.is_complete() {
        manifest::clear_missing(&config.target_dir)?;
        if !output::is_quiet() && !output::is_json() {
            println!("\nAll files downloaded successfully");
        }
    } else {
        let path = manifest::write_missing(&config.target_dir, &report.missing)?;
        if !output::is_json() {
            println!("\n >> Failed to download the following files:");
            print!("{}", manifest::render_table(&report.missing));
            println!("  Written to {}", path.display());
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "type": "harvest_report",
            "attempted": report.attempted(),
            "passes": report.passes,
            "missing": report.missing.iter().map(|r| r.label()).collect::<Vec<_>>(),
        }));
    }

    if args.skip_aggregate {
        return Ok(());
    }

    if !output::is_quiet() && !output::is_json() {
        println!("\n  Building yearly files...");
    }
    let aggregated = aggregate::aggregate(&config.target_dir, &config.target_dir, &mut sink)?;
    drop(sink);
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "type": "aggregate_report",
            "report": aggregated,
        }));
    }
    Ok(())
}
