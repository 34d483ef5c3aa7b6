//! Daily series normalization.
//!
//! A feed arrives as an irregular list of `(date, value)` rows. [`normalize`]
//! turns it into a [`Series`] holding exactly one point per calendar day from
//! the first valid date up to `today`, with interior gaps filled by linear
//! interpolation.
//!
//! Interpolation is linear by position: a gap of `k` missing points between
//! two known values is split into `k + 1` equal steps. Because the series is
//! daily-continuous this is the same as interpolating over time.

use crate::core::observation::{Observation, RawObservation};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("feed contains no observations")]
    EmptyFeed,
    #[error("none of the {rows} observations has a parseable date")]
    NoParseableDates { rows: usize },
}

/// What to do with rows before the first real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeadingNulls {
    /// Leave them in the series as `None`.
    #[default]
    Keep,
    /// Remove them, so the series starts at the first real value.
    Drop,
}

/// What to do with rows after the last real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingNulls {
    /// Leave them as `None`; a stale feed shows up as a trailing gap.
    #[default]
    Keep,
    /// Carry the last real value forward to `today`.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeOptions {
    pub leading: LeadingNulls,
    pub trailing: TrailingNulls,
}

/// One row of a series. `id` is a dense 1-based row number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub id: usize,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Date-ordered observations with dense row ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Builds a series from already-coerced observations without filling
    /// gaps. Rows are sorted by date; duplicate dates are averaged.
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        Self::from_sorted(collapse_by_date(observations).into_iter().collect())
    }

    fn from_sorted(rows: Vec<(NaiveDate, Option<f64>)>) -> Self {
        let points = rows
            .into_iter()
            .enumerate()
            .map(|(idx, (date, value))| SeriesPoint {
                id: idx + 1,
                date,
                value,
            })
            .collect();
        Self { points }
    }

    pub fn points(&self) -> &[SeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Value recorded for `date`, if the date is present and non-null.
    pub fn value_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .and_then(|idx| self.points[idx].value)
    }

    /// Non-null values in date order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(|p| p.value)
    }

    /// Number of null points.
    pub fn null_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_none()).count()
    }

    /// Restricts the series to a calendar year and/or month. `None` keeps all.
    pub fn filter_period(&self, year: Option<i32>, month: Option<u32>) -> Series {
        let rows = self
            .points
            .iter()
            .filter(|p| year.is_none_or(|y| p.date.year() == y))
            .filter(|p| month.is_none_or(|m| p.date.month() == m))
            .map(|p| (p.date, p.value))
            .collect();
        Self::from_sorted(rows)
    }

    /// Distinct years covered, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.points.iter().map(|p| p.date.year()).collect();
        years.dedup();
        years
    }
}

fn collapse_by_date(
    observations: impl IntoIterator<Item = Observation>,
) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for obs in observations {
        let entry = sums.entry(obs.date).or_insert((0.0, 0));
        if let Some(v) = obs.value {
            entry.0 += v;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, (count > 0).then(|| sum / count as f64)))
        .collect()
}

/// Normalizes a raw feed into a daily-continuous series ending at `today`.
///
/// Rows with an unparseable date are dropped; unparseable values become gaps.
/// Rows dated after `today` fall outside the range and are ignored, so a feed
/// that only has future rows gives an empty series. Several rows on the same
/// date are averaged over their non-null values.
pub fn normalize(
    raw: &[RawObservation],
    today: NaiveDate,
    options: &NormalizeOptions,
) -> Result<Series, SeriesError> {
    if raw.is_empty() {
        return Err(SeriesError::EmptyFeed);
    }

    let parsed: Vec<Observation> = raw.iter().filter_map(RawObservation::coerce).collect();
    let dropped = raw.len() - parsed.len();
    if parsed.is_empty() {
        return Err(SeriesError::NoParseableDates { rows: raw.len() });
    }
    if dropped > 0 {
        debug!(dropped, "Dropped observations with unparseable dates");
    }

    let start = parsed
        .iter()
        .map(|o| o.date)
        .min()
        .ok_or(SeriesError::NoParseableDates { rows: raw.len() })?;
    if start > today {
        debug!(%start, %today, "Every observation is after today");
        return Ok(Series::default());
    }

    let known = collapse_by_date(parsed.into_iter().filter(|o| o.date <= today));

    let dates: Vec<NaiveDate> = start.iter_days().take_while(|d| *d <= today).collect();
    let mut values: Vec<Option<f64>> = dates
        .iter()
        .map(|d| known.get(d).copied().flatten())
        .collect();
    let synthesized = dates.len() - known.len();

    interpolate_linear(&mut values);

    if options.trailing == TrailingNulls::Hold {
        hold_last(&mut values);
    }

    let first_value = values.iter().position(Option::is_some);
    let skip = match options.leading {
        LeadingNulls::Keep => 0,
        LeadingNulls::Drop => first_value.unwrap_or(values.len()),
    };

    debug!(
        %start,
        %today,
        synthesized,
        leading_dropped = skip,
        "Normalized daily series"
    );

    let rows = dates.into_iter().zip(values).skip(skip).collect();
    Ok(Series::from_sorted(rows))
}

/// Fills `None` runs that have a known value on both sides.
pub fn interpolate_linear(values: &mut [Option<f64>]) {
    let mut previous: Option<(usize, f64)> = None;
    for idx in 0..values.len() {
        let Some(current) = values[idx] else {
            continue;
        };
        if let Some((prev_idx, prev)) = previous
            && idx - prev_idx > 1
        {
            let span = (idx - prev_idx) as f64;
            for (step, slot) in values[prev_idx + 1..idx].iter_mut().enumerate() {
                let fraction = (step + 1) as f64 / span;
                *slot = Some(prev + (current - prev) * fraction);
            }
        }
        previous = Some((idx, current));
    }
}

fn hold_last(values: &mut [Option<f64>]) {
    let Some(last_idx) = values.iter().rposition(Option::is_some) else {
        return;
    };
    let last = values[last_idx];
    for slot in &mut values[last_idx + 1..] {
        *slot = last;
    }
}
