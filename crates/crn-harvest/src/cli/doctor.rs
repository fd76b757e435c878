//! Environment readiness check.

use crate::cli::output;
use crate::config::{self, IN_PROGRESS_MARKERS};
use crate::download::preflight;
use crate::driver::chromium::find_chromium;
use crate::portal::PortalLayout;
use anyhow::Result;
use std::path::PathBuf;

/// Check Chromium availability and the state of the download directory.
pub fn run(download_dir: Option<PathBuf>) -> Result<()> {
    let chromium = find_chromium();
    let download_dir = config::resolve_download_dir(download_dir);
    let layout = PortalLayout::default();

    let stale = match &download_dir {
        Ok(dir) if dir.exists() => Some(preflight::find_stale_artifacts(
            dir,
            &IN_PROGRESS_MARKERS,
            layout.raw_export_prefix(),
        )?),
        _ => None,
    };
    let ready = chromium.is_some()
        && download_dir.is_ok()
        && stale.as_ref().map_or(true, |files| files.is_empty());

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium,
            "download_dir": download_dir.as_ref().ok(),
            "stale_files": stale,
            "ready": ready,
        }));
        return Ok(());
    }

    println!("crn-harvest doctor");
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!("[!!] Chromium NOT found. Install Chrome/Chromium or set CRN_CHROMIUM_PATH."),
    }

    match (&download_dir, &stale) {
        (Err(e), _) => println!("[!!] Download directory: {e}"),
        (Ok(dir), None) => println!("[OK] Download directory {} (will be created)", dir.display()),
        (Ok(dir), Some(files)) if files.is_empty() => {
            println!("[OK] Download directory {} is clean", dir.display())
        }
        (Ok(dir), Some(files)) => {
            println!("[!!] Download directory {} has leftover files:", dir.display());
            for file in files {
                println!("       {file}");
            }
        }
    }

    println!();
    if ready {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }
    Ok(())
}
