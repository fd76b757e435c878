// Copyright 2026 crn-harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! crn-harvest: bulk export of Florida civil remedy notice filings.
//!
//! The portal only exports result sets below an undisclosed size, so the
//! harvester searches month by month and re-partitions any month the portal
//! refuses into weeks, 3-day blocks and finally single days. Exports are
//! renamed per range and combined into one CSV per calendar year at the end.
//!
//! - [`period`] - date-range generation per granularity
//! - [`retry`] - the month → week → 3-day → day retry ladder
//! - [`download`] - preflight, filesystem waits, and the per-range exporter
//! - [`driver`] - browser automation trait and its Chromium implementation
//! - [`aggregate`] - per-year CSV output
//! - [`manifest`] - record of permanently missing ranges

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod download;
pub mod driver;
pub mod error;
pub mod manifest;
pub mod period;
pub mod portal;
pub mod progress;
pub mod retry;

pub use error::{HarvestError, Result};
pub use period::{generate, DateRange, Granularity, YearSpan};
pub use retry::{run_ladder, LadderReport};
