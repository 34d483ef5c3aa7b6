//! Cross-series alignment and Pearson correlation.
//!
//! Two series are aligned with an inner join on the calendar date, so only
//! days present in both contribute. Degenerate inputs (fewer than two usable
//! rows, or a constant column) produce [`Coefficient::Undefined`] rather than
//! an error or a NaN.

use crate::core::observation::Observation;
use crate::core::series::Series;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;

/// A correlation cell: a value in `[-1, 1]` or undefined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coefficient {
    Defined(f64),
    Undefined,
}

impl Coefficient {
    pub fn value(&self) -> Option<f64> {
        match self {
            Coefficient::Defined(v) => Some(*v),
            Coefficient::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Coefficient::Defined(_))
    }
}

impl Display for Coefficient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Coefficient::Defined(v) => write!(f, "{v:.3}"),
            Coefficient::Undefined => write!(f, "undefined"),
        }
    }
}

/// Either one coefficient or one per group.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationResult {
    Single(Coefficient),
    Grouped(BTreeMap<String, Coefficient>),
}

/// One row of an inner join on date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedRow {
    pub date: NaiveDate,
    pub left: Option<f64>,
    pub right: Option<f64>,
}

/// An observation tagged with the category it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedObservation {
    pub group: String,
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// A timestamped quote for a category, before reduction to one per day.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub group: String,
    pub timestamp: NaiveDateTime,
    pub value: Option<f64>,
}

/// Pairwise coefficients between named series.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub cells: Vec<Vec<Coefficient>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<Coefficient> {
        let r = self.labels.iter().position(|l| l == row)?;
        let c = self.labels.iter().position(|l| l == col)?;
        Some(self.cells[r][c])
    }
}

/// Pearson correlation of two equally long samples.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Coefficient {
    if xs.len() != ys.len() || xs.len() < 2 {
        return Coefficient::Undefined;
    }
    if xs.iter().any(|v| !v.is_finite()) || ys.iter().any(|v| !v.is_finite()) {
        return Coefficient::Undefined;
    }
    // Exact check first: the mean of identical values can drift by an ulp.
    if xs.iter().all(|v| *v == xs[0]) || ys.iter().all(|v| *v == ys[0]) {
        return Coefficient::Undefined;
    }

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= 0.0 || var_y <= 0.0 {
        return Coefficient::Undefined;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        Coefficient::Defined(r.clamp(-1.0, 1.0))
    } else {
        Coefficient::Undefined
    }
}

/// Joins two series on date, keeping only dates present in both.
pub fn inner_join(left: &Series, right: &Series) -> Vec<JoinedRow> {
    let right_by_date: HashMap<NaiveDate, Option<f64>> =
        right.points().iter().map(|p| (p.date, p.value)).collect();

    left.points()
        .iter()
        .filter_map(|p| {
            right_by_date.get(&p.date).map(|right| JoinedRow {
                date: p.date,
                left: p.value,
                right: *right,
            })
        })
        .collect()
}

fn coefficient_of(rows: &[JoinedRow]) -> Coefficient {
    // Rows with a gap on either side carry no information.
    let (xs, ys): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|r| match (r.left, r.right) {
            (Some(l), Some(r)) if l.is_finite() && r.is_finite() => Some((l, r)),
            _ => None,
        })
        .unzip();
    pearson(&xs, &ys)
}

/// Correlates two series over their common dates.
pub fn correlate(left: &Series, right: &Series) -> Coefficient {
    coefficient_of(&inner_join(left, right))
}

/// Correlates `left` with every group of `right` independently.
///
/// Each group is joined with `left` on date on its own, so groups never mix.
/// Every group present in `right` appears in the result, undefined when its
/// overlap with `left` is too small or constant.
pub fn correlate_by_group(
    left: &Series,
    right: &[GroupedObservation],
) -> BTreeMap<String, Coefficient> {
    let mut partitions: BTreeMap<&str, Vec<&GroupedObservation>> = BTreeMap::new();
    for obs in right {
        partitions.entry(obs.group.as_str()).or_default().push(obs);
    }

    let left_by_date: HashMap<NaiveDate, Option<f64>> =
        left.points().iter().map(|p| (p.date, p.value)).collect();

    partitions
        .into_iter()
        .map(|(group, observations)| {
            let rows: Vec<JoinedRow> = observations
                .iter()
                .filter_map(|obs| {
                    left_by_date.get(&obs.date).map(|l| JoinedRow {
                        date: obs.date,
                        left: *l,
                        right: obs.value,
                    })
                })
                .collect();
            (group.to_string(), coefficient_of(&rows))
        })
        .collect()
}

/// Keeps the latest quote per `(group, calendar day)`.
///
/// Output is ordered by group, then date.
pub fn latest_per_group_day(quotes: &[Quote]) -> Vec<GroupedObservation> {
    let mut latest: BTreeMap<(&str, NaiveDate), &Quote> = BTreeMap::new();
    for quote in quotes {
        let key = (quote.group.as_str(), quote.timestamp.date());
        match latest.get(&key) {
            Some(current) if current.timestamp >= quote.timestamp => {}
            _ => {
                latest.insert(key, quote);
            }
        }
    }

    latest
        .into_iter()
        .map(|((group, date), quote)| GroupedObservation {
            group: group.to_string(),
            date,
            value: quote.value,
        })
        .collect()
}

/// Builds a series for one group of grouped observations.
pub fn group_series(observations: &[GroupedObservation], group: &str) -> Series {
    Series::from_observations(
        observations
            .iter()
            .filter(|o| o.group == group)
            .map(|o| Observation::new(o.date, o.value)),
    )
}

/// Pairwise correlation of named series, each pair joined on its own.
pub fn correlation_matrix(columns: &[(String, Series)]) -> CorrelationMatrix {
    let labels = columns.iter().map(|(name, _)| name.clone()).collect();
    let mut cells = vec![vec![Coefficient::Undefined; columns.len()]; columns.len()];

    for i in 0..columns.len() {
        for j in i..columns.len() {
            let coefficient = correlate(&columns[i].1, &columns[j].1);
            cells[i][j] = coefficient;
            cells[j][i] = coefficient;
        }
    }

    CorrelationMatrix { labels, cells }
}
