// Copyright 2026 crn-harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and sinks for harvest telemetry.
//!
//! The retry ladder and the aggregator emit `ProgressEvent`s as they work.
//! Events are delivered synchronously to a `ProgressSink`: the binary prints
//! them (plain text or JSON lines), tests collect them.

use crate::period::Granularity;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// A granularity pass is starting.
    PassStarted {
        granularity: Granularity,
        /// Zero for the initial month pass.
        retry: u32,
        candidates: usize,
    },
    /// A single range download is starting.
    RangeStarted { label: String },
    /// A single range download finished.
    RangeFinished { label: String, success: bool },
    /// A granularity pass finished.
    PassCompleted {
        granularity: Granularity,
        attempted: usize,
        failed: usize,
    },
    /// The aggregator found this many exports to combine.
    AggregateStarted { files: usize },
    /// An exported CSV was read by the aggregator.
    FileAggregated { file: String, rows: usize },
    /// A per-year output file was written.
    YearWritten { year: i32, rows: usize, path: String },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Receives progress events.
pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Keeps every event, in order.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    pub events: Vec<ProgressEvent>,
}

impl ProgressSink for CollectingSink {
    fn emit(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }
}

impl CollectingSink {
    /// Labels of every range started, in order.
    pub fn started_labels(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::RangeStarted { label } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }
}
