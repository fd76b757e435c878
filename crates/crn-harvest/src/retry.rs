//! Adaptive date partitioning.
//!
//! The portal refuses to export large result sets, so a harvest starts with
//! one search per month and re-partitions only the months that failed into
//! weeks, then the failed weeks into 3-day blocks, then into single days.
//! A range is only ever retried at a strictly finer granularity; a day that
//! still fails is reported as missing.
//!
//! Week and 3-day boundaries do not nest, so a failed week is not fully
//! covered by the 3-day blocks inside it. The uncovered days are carried
//! into the next pass as failures of their own and retried as single days.

use crate::download::RangeDownloader;
use crate::error::Result;
use crate::period::{generate, DateRange, Granularity, YearSpan};
use crate::progress::{ProgressEvent, ProgressSink};
use chrono::Datelike;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Granularity of the first pass.
pub const INITIAL_GRANULARITY: Granularity = Granularity::Month;

/// Granularities tried, in order, for ranges that failed the previous pass.
pub const RETRY_LADDER: [Granularity; 3] = [Granularity::Week, Granularity::ThreeDay, Granularity::Day];

/// Outcome of one granularity pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub granularity: Granularity,
    pub attempted: usize,
    pub failed: usize,
    /// Parts of failed parents no candidate covered, carried unattempted.
    pub carried: usize,
}

/// Outcome of a whole harvest.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LadderReport {
    pub passes: Vec<PassSummary>,
    /// Ranges that still failed after the last pass.
    pub missing: Vec<DateRange>,
}

impl LadderReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.passes.iter().map(|p| p.attempted).sum()
    }
}

/// Keep the ranges lying entirely within at least one failed range.
pub fn retry_candidates(ranges: Vec<DateRange>, failed: &[DateRange]) -> Vec<DateRange> {
    ranges
        .into_iter()
        .filter(|r| failed.iter().any(|f| f.contains(r)))
        .collect()
}

/// Sub-spans of `parent` not covered by any of `candidates` lying inside it.
///
/// Gaps are labelled `{parent}-{first day}..{last day}`.
pub fn uncovered_spans(parent: &DateRange, candidates: &[DateRange]) -> Result<Vec<DateRange>> {
    let mut inside: Vec<&DateRange> = candidates.iter().filter(|c| parent.contains(c)).collect();
    inside.sort_by_key(|c| c.start());

    let mut gaps = Vec::new();
    let mut push_gap = |start: chrono::NaiveDate, end: chrono::NaiveDate| -> Result<()> {
        let label = format!("{}-{}..{}", parent.label(), start.day(), end.day());
        gaps.push(DateRange::new(start, end, label)?);
        Ok(())
    };

    // Next uncovered day; `None` once the parent is exhausted
    let mut cursor = Some(parent.start());
    for candidate in inside {
        let Some(from) = cursor else { break };
        if candidate.start() > from {
            if let Some(to) = candidate.start().pred_opt() {
                push_gap(from, to)?;
            }
        }
        if candidate.end() >= from {
            cursor = candidate.end().succ_opt().filter(|d| *d <= parent.end());
        }
    }
    if let Some(from) = cursor {
        push_gap(from, parent.end())?;
    }
    Ok(gaps)
}

/// Attempt every range once and return the ones that failed.
pub async fn run_pass<R>(
    downloader: &mut R,
    ranges: &[DateRange],
    sink: &mut dyn ProgressSink,
) -> Vec<DateRange>
where
    R: RangeDownloader + ?Sized,
{
    let mut failed = Vec::new();
    for range in ranges {
        sink.emit(ProgressEvent::RangeStarted {
            label: range.label().to_string(),
        });
        let success = downloader.download(range).await;
        sink.emit(ProgressEvent::RangeFinished {
            label: range.label().to_string(),
            success,
        });
        if !success {
            failed.push(range.clone());
        }
    }
    failed
}

/// Run the month pass and then the retry ladder over `span`.
pub async fn run_ladder<R>(
    downloader: &mut R,
    span: YearSpan,
    sink: &mut dyn ProgressSink,
) -> Result<LadderReport>
where
    R: RangeDownloader + ?Sized,
{
    let mut report = LadderReport::default();

    let ranges = generate(span, INITIAL_GRANULARITY)?;
    let mut failed = attempt_pass(downloader, INITIAL_GRANULARITY, 0, &ranges, 0, sink, &mut report).await;

    for (retry, granularity) in (1u32..).zip(RETRY_LADDER) {
        if failed.is_empty() {
            break;
        }
        let candidates = retry_candidates(generate(span, granularity)?, &failed);
        let mut gaps = Vec::new();
        for parent in &failed {
            gaps.extend(uncovered_spans(parent, &candidates)?);
        }
        info!(
            %granularity,
            parents = failed.len(),
            candidates = candidates.len(),
            uncovered = gaps.len(),
            "retrying failed ranges at finer granularity"
        );
        for gap in &gaps {
            debug!(label = gap.label(), "no candidate covers these days, carrying them forward");
        }

        let carried = gaps.len();
        failed = attempt_pass(downloader, granularity, retry, &candidates, carried, sink, &mut report).await;
        failed.extend(gaps);
        failed.sort_by_key(|r| (r.start(), r.end()));
    }

    if failed.is_empty() {
        info!(attempted = report.attempted(), "all ranges downloaded");
    } else {
        warn!(missing = failed.len(), "ranges still missing after day granularity");
    }
    report.missing = failed;
    Ok(report)
}

async fn attempt_pass<R>(
    downloader: &mut R,
    granularity: Granularity,
    retry: u32,
    ranges: &[DateRange],
    carried: usize,
    sink: &mut dyn ProgressSink,
    report: &mut LadderReport,
) -> Vec<DateRange>
where
    R: RangeDownloader + ?Sized,
{
    sink.emit(ProgressEvent::PassStarted {
        granularity,
        retry,
        candidates: ranges.len(),
    });
    let failed = run_pass(downloader, ranges, sink).await;
    sink.emit(ProgressEvent::PassCompleted {
        granularity,
        attempted: ranges.len(),
        failed: failed.len(),
    });
    report.passes.push(PassSummary {
        granularity,
        attempted: ranges.len(),
        failed: failed.len(),
        carried,
    });
    failed
}
