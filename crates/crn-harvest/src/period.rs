//! Date-range partitioning for portal searches.
//!
//! The portal's search form takes a submission start and end date. A search
//! window is a [`DateRange`]; [`generate`] cuts a span of years into windows
//! of a given [`Granularity`].

use crate::error::{HarvestError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Date format expected by the portal's search fields and used in the
/// missing-range manifest.
pub const PORTAL_DATE_FORMAT: &str = "%m/%d/%Y";

/// Size of a search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    Day,
    #[serde(rename = "3-day")]
    ThreeDay,
    Week,
    HalfMonth,
    Month,
    Quarter,
    Year,
}

impl Granularity {
    /// Every granularity, finest first.
    pub const ALL: [Granularity; 7] = [
        Self::Day,
        Self::ThreeDay,
        Self::Week,
        Self::HalfMonth,
        Self::Month,
        Self::Quarter,
        Self::Year,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::ThreeDay => "3-day",
            Self::Week => "week",
            Self::HalfMonth => "half-month",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "3-day" | "3day" => Ok(Self::ThreeDay),
            "week" => Ok(Self::Week),
            "half-month" | "half_month" => Ok(Self::HalfMonth),
            "month" => Ok(Self::Month),
            "quarter" => Ok(Self::Quarter),
            "year" => Ok(Self::Year),
            _ => Err(HarvestError::UnknownGranularity(s.to_string())),
        }
    }
}

/// Inclusive span of calendar years to harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawYearSpan")]
pub struct YearSpan {
    start: i32,
    end: i32,
}

#[derive(Deserialize)]
struct RawYearSpan {
    start: i32,
    end: i32,
}

impl TryFrom<RawYearSpan> for YearSpan {
    type Error = HarvestError;

    fn try_from(raw: RawYearSpan) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl YearSpan {
    pub fn new(start: i32, end: i32) -> Result<Self> {
        let valid = |y: i32| (1..=9999).contains(&y);
        if !valid(start) || !valid(end) || start > end {
            return Err(HarvestError::InvalidYearSpan { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start..=self.end
    }
}

/// A labelled search window. `start <= end` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
    label: String,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
    label: String,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = HarvestError;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end, raw.label)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if start > end {
            return Err(HarvestError::InvertedRange { label });
        }
        Ok(Self { start, end, label })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start date as typed into the portal (`MM/DD/YYYY`).
    pub fn start_text(&self) -> String {
        self.start.format(PORTAL_DATE_FORMAT).to_string()
    }

    /// End date as typed into the portal (`MM/DD/YYYY`).
    pub fn end_text(&self) -> String {
        self.end.format(PORTAL_DATE_FORMAT).to_string()
    }

    /// File stem the exported CSV is renamed to.
    pub fn file_stem(&self) -> String {
        format!("res-{}", self.label)
    }

    /// Inclusive containment: `other` lies entirely within `self`.
    pub fn contains(&self, other: &DateRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} - {})", self.label, self.start_text(), self.end_text())
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(HarvestError::InvalidDate { year, month, day })
}

/// Number of days in a calendar month.
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = ymd(year, month, 1)?;
    let next = if month == 12 {
        ymd(year + 1, 1, 1)?
    } else {
        ymd(year, month + 1, 1)?
    };
    Ok(next.signed_duration_since(first).num_days() as u32)
}

/// Cut `span` into ordered search windows of the given granularity.
///
/// Sub-month granularities are laid out per calendar month:
/// - week: 1-7, 8-14, 15-21, 22-end
/// - 3-day: nine blocks of three days from the 1st, then 28-end labelled `3D10`
/// - half-month: 1-15, 16-end
pub fn generate(span: YearSpan, granularity: Granularity) -> Result<Vec<DateRange>> {
    let mut periods = Vec::new();
    for year in span.years() {
        match granularity {
            Granularity::Year => {
                periods.push(DateRange::new(ymd(year, 1, 1)?, ymd(year, 12, 31)?, year.to_string())?);
            }
            Granularity::Quarter => {
                for quarter in 1..=4u32 {
                    let last_month = quarter * 3;
                    periods.push(DateRange::new(
                        ymd(year, last_month - 2, 1)?,
                        ymd(year, last_month, days_in_month(year, last_month)?)?,
                        format!("{year}-Q{quarter}"),
                    )?);
                }
            }
            _ => {
                for month in 1..=12u32 {
                    for (first, last, label) in month_windows(year, month, granularity)? {
                        periods.push(DateRange::new(
                            ymd(year, month, first)?,
                            ymd(year, month, last)?,
                            label,
                        )?);
                    }
                }
            }
        }
    }
    Ok(periods)
}

/// Day bounds and labels for the windows of one month.
fn month_windows(year: i32, month: u32, granularity: Granularity) -> Result<Vec<(u32, u32, String)>> {
    let last = days_in_month(year, month)?;
    let prefix = format!("{year}-{month}");

    let windows = match granularity {
        Granularity::Month => vec![(1, last, prefix)],
        Granularity::HalfMonth => vec![
            (1, 15, format!("{prefix}-H1")),
            (16, last, format!("{prefix}-H2")),
        ],
        Granularity::Week => {
            let mut w: Vec<_> = (0..3u32)
                .map(|i| (i * 7 + 1, i * 7 + 7, format!("{prefix}-W{}", i + 1)))
                .collect();
            w.push((22, last, format!("{prefix}-W4")));
            w
        }
        Granularity::ThreeDay => {
            let mut w: Vec<_> = (0..9u32)
                .map(|i| (i * 3 + 1, i * 3 + 3, format!("{prefix}-3D{i}")))
                .collect();
            w.push((28, last, format!("{prefix}-3D10")));
            w
        }
        Granularity::Day => (1..=last).map(|d| (d, d, format!("{prefix}-{d}"))).collect(),
        Granularity::Quarter | Granularity::Year => Vec::new(),
    };
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start: i32, end: i32) -> YearSpan {
        YearSpan::new(start, end).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Assert ranges are ordered, contiguous and cover Jan 1 .. Dec 31 of the span.
    fn assert_contiguous(ranges: &[DateRange], s: YearSpan) {
        assert_eq!(ranges.first().unwrap().start(), date(s.start(), 1, 1));
        assert_eq!(ranges.last().unwrap().end(), date(s.end(), 12, 31));
        for pair in ranges.windows(2) {
            assert_eq!(
                pair[0].end().succ_opt().unwrap(),
                pair[1].start(),
                "gap or overlap between {} and {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_month_count_and_coverage() {
        for (start, end) in [(2020, 2020), (2015, 2023), (1999, 2001)] {
            let s = span(start, end);
            let months = generate(s, Granularity::Month).unwrap();
            assert_eq!(months.len(), 12 * (end - start + 1) as usize);
            assert_contiguous(&months, s);
        }
    }

    #[test]
    fn test_quarter_scenario() {
        let quarters = generate(span(2020, 2020), Granularity::Quarter).unwrap();
        let got: Vec<_> = quarters
            .iter()
            .map(|r| (r.start_text(), r.end_text(), r.label().to_string()))
            .collect();
        let expected = [
            ("01/01/2020", "03/31/2020", "2020-Q1"),
            ("04/01/2020", "06/30/2020", "2020-Q2"),
            ("07/01/2020", "09/30/2020", "2020-Q3"),
            ("10/01/2020", "12/31/2020", "2020-Q4"),
        ];
        assert_eq!(got.len(), 4);
        for (g, e) in got.iter().zip(expected) {
            assert_eq!((g.0.as_str(), g.1.as_str(), g.2.as_str()), e);
        }
    }

    #[test]
    fn test_start_never_after_end() {
        for g in Granularity::ALL {
            for r in generate(span(2019, 2020), g).unwrap() {
                assert!(r.start() <= r.end(), "{g}: {r}");
            }
        }
    }

    #[test]
    fn test_contiguous_for_every_granularity() {
        let s = span(2019, 2020);
        for g in Granularity::ALL {
            assert_contiguous(&generate(s, g).unwrap(), s);
        }
    }

    #[test]
    fn test_idempotent() {
        for g in Granularity::ALL {
            let a = generate(span(2016, 2017), g).unwrap();
            let b = generate(span(2016, 2017), g).unwrap();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_week_layout() {
        let weeks = generate(span(2021, 2021), Granularity::Week).unwrap();
        assert_eq!(weeks.len(), 48);
        let feb: Vec<_> = weeks.iter().filter(|r| r.label().starts_with("2021-2-")).collect();
        assert_eq!(feb.len(), 4);
        assert_eq!(feb[1].label(), "2021-2-W2");
        assert_eq!((feb[1].start(), feb[1].end()), (date(2021, 2, 8), date(2021, 2, 14)));
        assert_eq!((feb[3].start(), feb[3].end()), (date(2021, 2, 22), date(2021, 2, 28)));
    }

    #[test]
    fn test_three_day_layout_in_february() {
        let blocks = generate(span(2021, 2021), Granularity::ThreeDay).unwrap();
        assert_eq!(blocks.len(), 120);
        let feb: Vec<_> = blocks.iter().filter(|r| r.label().starts_with("2021-2-")).collect();
        assert_eq!(feb.len(), 10);
        assert_eq!(feb[0].label(), "2021-2-3D0");
        assert_eq!(feb[8].label(), "2021-2-3D8");
        assert_eq!((feb[8].start(), feb[8].end()), (date(2021, 2, 25), date(2021, 2, 27)));
        assert_eq!(feb[9].label(), "2021-2-3D10");
        assert_eq!((feb[9].start(), feb[9].end()), (date(2021, 2, 28), date(2021, 2, 28)));
    }

    #[test]
    fn test_day_count_respects_leap_years() {
        assert_eq!(generate(span(2020, 2020), Granularity::Day).unwrap().len(), 366);
        assert_eq!(generate(span(2021, 2021), Granularity::Day).unwrap().len(), 365);
        let days = generate(span(2020, 2020), Granularity::Day).unwrap();
        assert_eq!(days[59].label(), "2020-2-29");
    }

    #[test]
    fn test_half_month_and_year_labels() {
        let halves = generate(span(2020, 2020), Granularity::HalfMonth).unwrap();
        assert_eq!(halves.len(), 24);
        assert_eq!(halves[3].label(), "2020-2-H2");
        assert_eq!(halves[3].end(), date(2020, 2, 29));

        let years = generate(span(2018, 2020), Granularity::Year).unwrap();
        let labels: Vec<_> = years.iter().map(|r| r.label()).collect();
        assert_eq!(labels, ["2018", "2019", "2020"]);
    }

    #[test]
    fn test_month_labels_are_unpadded() {
        let months = generate(span(2020, 2020), Granularity::Month).unwrap();
        assert_eq!(months[2].label(), "2020-3");
        assert_eq!(months[2].start_text(), "03/01/2020");
        assert_eq!(months[2].file_stem(), "res-2020-3");
    }

    #[test]
    fn test_parse_granularity() {
        assert_eq!("3-day".parse::<Granularity>().unwrap(), Granularity::ThreeDay);
        assert_eq!("half_month".parse::<Granularity>().unwrap(), Granularity::HalfMonth);
        assert_eq!("Month".parse::<Granularity>().unwrap(), Granularity::Month);
        for g in Granularity::ALL {
            assert_eq!(g.as_str().parse::<Granularity>().unwrap(), g);
        }
        let err = "fortnight".parse::<Granularity>().unwrap_err();
        assert!(matches!(err, HarvestError::UnknownGranularity(ref s) if s == "fortnight"));
    }

    #[test]
    fn test_year_span_validation() {
        assert!(YearSpan::new(2021, 2020).is_err());
        assert!(YearSpan::new(0, 2020).is_err());
        assert!(YearSpan::new(2020, 2020).is_ok());
    }

    #[test]
    fn test_contains_is_inclusive() {
        let month = DateRange::new(date(2020, 3, 1), date(2020, 3, 31), "2020-3").unwrap();
        let first_week = DateRange::new(date(2020, 3, 1), date(2020, 3, 7), "2020-3-W1").unwrap();
        let straddle = DateRange::new(date(2020, 2, 28), date(2020, 3, 2), "x").unwrap();
        assert!(month.contains(&first_week));
        assert!(month.contains(&month));
        assert!(!month.contains(&straddle));
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let range: DateRange =
            serde_json::from_str(r#"{"start":"2020-03-01","end":"2020-03-07","label":"2020-3-W1"}"#)
                .unwrap();
        assert_eq!(range.end(), date(2020, 3, 7));
        assert!(serde_json::from_str::<DateRange>(
            r#"{"start":"2020-03-07","end":"2020-03-01","label":"x"}"#
        )
        .is_err());

        assert_eq!(
            serde_json::from_str::<YearSpan>(r#"{"start":2019,"end":2020}"#).unwrap(),
            span(2019, 2020)
        );
        assert!(serde_json::from_str::<YearSpan>(r#"{"start":2021,"end":2020}"#).is_err());
    }

    #[test]
    fn test_granularity_serializes_as_cli_name() {
        assert_eq!(serde_json::to_string(&Granularity::ThreeDay).unwrap(), "\"3-day\"");
        assert_eq!(serde_json::to_string(&Granularity::HalfMonth).unwrap(), "\"half-month\"");
    }
}
