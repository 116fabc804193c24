//! Statistical measures over sparse monthly series
//!
//! All functions are pure. Measures that need a minimum number of observations
//! return `ScoringError::InsufficientData` so the calling calculator can
//! substitute its configured default and record the fallback.

use super::error::{ScoringError, ScoringResult};
use super::types::{is_next_month, RevenueSeries, VolatilitySummary};
use chrono::NaiveDate;

/// A month-over-month change between two literally consecutive months
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyChange {
    pub month: NaiveDate,
    pub change: f64,
}

/// Relative change `(current - previous) / previous`; `None` when `previous` is zero
pub fn relative_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some((current - previous) / previous)
    }
}

/// Growth rate in percent; `None` when `previous` is zero
pub fn growth_rate(current: f64, previous: f64) -> Option<f64> {
    relative_change(previous, current).map(|c| c * 100.0)
}

/// Month-over-month changes of a chronologically sorted series
///
/// A change is only produced for calendar-adjacent months; gaps break the chain.
pub fn month_over_month_changes(points: &[(NaiveDate, f64)]) -> Vec<MonthlyChange> {
    points
        .windows(2)
        .filter(|pair| is_next_month(pair[0].0, pair[1].0))
        .filter_map(|pair| {
            relative_change(pair[0].1, pair[1].1).map(|change| MonthlyChange {
                month: pair[1].0,
                change,
            })
        })
        .collect()
}

/// Per-source changes pooled across every source of the series
pub fn pooled_source_changes(series: &RevenueSeries) -> Vec<f64> {
    series
        .sources()
        .iter()
        .flat_map(|source| month_over_month_changes(&series.source_points(source)))
        .map(|c| c.change)
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Sample standard deviation (n - 1); `None` below two observations
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance =
        values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

pub fn volatility_summary(changes: &[f64]) -> Option<VolatilitySummary> {
    Some(VolatilitySummary {
        observations: changes.len(),
        mean: mean(changes)?,
        median: median(changes)?,
        std_dev: sample_stdev(changes),
        min: changes.iter().copied().fold(f64::INFINITY, f64::min),
        max: changes.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Stability score `100 * max(0, 1 - stdev / target_stdev)`
pub fn stability_score(changes: &[f64], target_stdev: f64) -> ScoringResult<f64> {
    let stdev = sample_stdev(changes).ok_or_else(|| {
        ScoringError::insufficient(
            "stability",
            format!("{} month-over-month observations, need at least 2", changes.len()),
        )
    })?;
    Ok((100.0 * (1.0 - stdev / target_stdev).max(0.0)).clamp(0.0, 100.0))
}

/// Diversification score from per-source revenue amounts of one period
///
/// Normalized `1 - HHI` over the sources with positive revenue: an even split
/// across N > 1 sources scores 100 and a single source scores 0.
pub fn diversification_score<'a>(amounts: impl IntoIterator<Item = &'a f64>) -> ScoringResult<f64> {
    let positive: Vec<f64> = amounts.into_iter().copied().filter(|a| *a > 0.0).collect();
    let total: f64 = positive.iter().sum();
    if total <= 0.0 {
        return Err(ScoringError::insufficient(
            "diversification",
            "no revenue in the latest period",
        ));
    }

    let n = positive.len();
    if n == 1 {
        return Ok(0.0);
    }

    let hhi: f64 = positive.iter().map(|a| (a / total).powi(2)).sum();
    let min_hhi = 1.0 / n as f64;
    Ok((100.0 * (1.0 - hhi) / (1.0 - min_hhi)).clamp(0.0, 100.0))
}

/// Magnitude score `100 * min(1, total / reference)`
pub fn magnitude_score(total_revenue: f64, reference_revenue: f64) -> f64 {
    if reference_revenue <= 0.0 || total_revenue <= 0.0 {
        return 0.0;
    }
    (100.0 * (total_revenue / reference_revenue).min(1.0)).clamp(0.0, 100.0)
}

/// Fraction of peer values strictly lower than `value` (0.0-1.0)
///
/// Ties share the lower rank. Fewer than two peers is insufficient data.
pub fn percentile_rank(value: f64, peers: &[f64]) -> ScoringResult<f64> {
    if peers.len() < 2 {
        return Err(ScoringError::insufficient(
            "percentile_rank",
            format!("{} peer values, need at least 2", peers.len()),
        ));
    }
    let lower = peers.iter().filter(|p| **p < value).count();
    Ok(lower as f64 / peers.len() as f64)
}
