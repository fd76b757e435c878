//! CLI handler for `crn-harvest periods <granularity>`.

use crate::cli::output;
use crate::config;
use crate::period::{self, Granularity};
use anyhow::Result;

/// Print the ranges one pass at `granularity` would search.
pub fn run(granularity: Granularity, start_year: Option<i32>, end_year: Option<i32>) -> Result<()> {
    let span = config::resolve_span(start_year, end_year)?;
    let ranges = period::generate(span, granularity)?;

    if output::is_json() {
        let items: Vec<serde_json::Value> = ranges
            .iter()
            .map(|r| {
                serde_json::json!({
                    "label": r.label(),
                    "start_date": r.start_text(),
                    "end_date": r.end_text(),
                })
            })
            .collect();
        output::print_json(&serde_json::json!({
            "granularity": granularity,
            "count": ranges.len(),
            "ranges": items,
        }));
        return Ok(());
    }

    for range in &ranges {
        println!(
            "  {:<14} {}  {}",
            range.label(),
            range.start_text(),
            range.end_text()
        );
    }
    if !output::is_quiet() {
        println!("\n  {} {granularity} ranges", ranges.len());
    }
    Ok(())
}
