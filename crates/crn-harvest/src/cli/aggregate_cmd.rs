//! CLI handler for `crn-harvest aggregate`.

use crate::aggregate;
use crate::cli::output::{self, ConsoleSink};
use crate::config;
use anyhow::Result;
use std::path::PathBuf;

/// Combine `res-*.csv` exports into one file per year.
///
/// `data_dir` defaults to the target directory.
pub fn run(target_dir: Option<PathBuf>, data_dir: Option<PathBuf>) -> Result<()> {
    let target_dir = config::resolve_target_dir(target_dir);
    let data_dir = data_dir.unwrap_or_else(|| target_dir.clone());

    let mut sink = ConsoleSink::new();
    let report = aggregate::aggregate(&data_dir, &target_dir, &mut sink)?;
    drop(sink);

    if output::is_json() {
        output::print_json(&serde_json::to_value(&report)?);
        return Ok(());
    }
    if output::is_quiet() {
        return Ok(());
    }

    if report.files_read == 0 {
        println!("  No exports found in {}", data_dir.display());
    } else {
        println!(
            "\n  {} rows from {} files into {} yearly files",
            report.rows,
            report.files_read,
            report.outputs.len()
        );
    }
    Ok(())
}
