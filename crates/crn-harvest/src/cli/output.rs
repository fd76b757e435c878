//! Terminal output helpers shared by every subcommand.

use crate::progress::{ProgressEvent, ProgressSink};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;

pub const ENV_JSON: &str = "CRN_JSON";
pub const ENV_QUIET: &str = "CRN_QUIET";

fn flag(name: &str) -> bool {
    std::env::var(name).is_ok_and(|v| v == "1")
}

/// Whether `--json` was given.
pub fn is_json() -> bool {
    flag(ENV_JSON)
}

/// Whether `--quiet` was given.
pub fn is_quiet() -> bool {
    flag(ENV_QUIET)
}

/// Print a JSON value on one line.
pub fn print_json(value: &serde_json::Value) {
    println!("{value}");
}

/// Prints harvest progress as it happens.
///
/// Text mode mirrors the per-range `>> Downloading ... Done.` lines and shows
/// a bar while exports are aggregated. JSON mode prints each event as one line.
#[derive(Default)]
pub struct ConsoleSink {
    json: bool,
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            json: is_json(),
            quiet: is_quiet(),
            bar: None,
        }
    }

    fn finish_bar(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Terminal text for an event, exactly as printed to stdout.
///
/// Range lines are split in two: the start prints without a newline and the
/// result completes it. Events without text (or shown through the progress
/// bar) yield `None`.
pub fn render_text(event: &ProgressEvent) -> Option<String> {
    match event {
        ProgressEvent::PassStarted {
            granularity, retry, ..
        } if *retry > 0 => Some(format!(
            "\n>>>>> Trying again to download missing files - period length: {granularity}\n"
        )),
        ProgressEvent::RangeStarted { label } => Some(format!(">> Downloading {label}... ")),
        ProgressEvent::RangeFinished { success, .. } => {
            Some(if *success { "Done.\n" } else { "Failed!\n" }.to_string())
        }
        ProgressEvent::YearWritten { rows, path, .. } => Some(format!("  {path} ({rows} rows)\n")),
        _ => None,
    }
}

impl ProgressSink for ConsoleSink {
    fn emit(&mut self, event: ProgressEvent) {
        if self.json {
            if let Ok(line) = serde_json::to_string(&event) {
                println!("{line}");
            }
            return;
        }
        if let ProgressEvent::Warning { message } = &event {
            match &self.bar {
                Some(bar) => bar.suspend(|| eprintln!("  warning: {message}")),
                None => eprintln!("  warning: {message}"),
            }
            return;
        }
        if self.quiet {
            return;
        }

        match &event {
            ProgressEvent::AggregateStarted { files } if *files > 0 => {
                let bar = ProgressBar::new(*files as u64);
                bar.set_style(
                    ProgressStyle::with_template("  {bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                self.bar = Some(bar);
            }
            ProgressEvent::FileAggregated { file, .. } => {
                if let Some(bar) = &self.bar {
                    bar.set_message(file.clone());
                    bar.inc(1);
                }
            }
            ProgressEvent::YearWritten { .. } => self.finish_bar(),
            _ => {}
        }

        if let Some(text) = render_text(&event) {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(text.as_bytes());
            let _ = stdout.flush();
        }
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        self.finish_bar();
    }
}
