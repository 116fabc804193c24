//! Core data structures for the scoring engine
//!
//! Raw rows arrive from a `SourceAdapter` in a fixed schema. They are normalized
//! into month-bucketed series (sorted, duplicates summed, schema validated)
//! before any statistic is computed.

use super::error::{ScoringError, ScoringResult};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One revenue row as returned by the upstream warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueRow {
    /// First day of the month (UTC calendar month)
    pub month: NaiveDate,
    pub source: String,
    pub amount_usd: f64,
}

/// One user-activity row as returned by the upstream warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserMetricsRow {
    pub month: NaiveDate,
    pub active_addresses: u64,
    pub transaction_count: u64,
    pub transaction_volume_usd: f64,
}

/// Latest market data for fair-value scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub market_cap_usd: f64,
    #[serde(default)]
    pub price_usd: Option<f64>,
}

/// External security assessment (audit firm feed)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityAssessment {
    /// Base score on a 0-100 scale
    #[serde(default)]
    pub security_score: Option<f64>,
    /// Fraction of deployed contracts covered by audits (0.0-1.0)
    #[serde(default)]
    pub audit_coverage: Option<f64>,
    #[serde(default)]
    pub audit_status: Option<String>,
    #[serde(default)]
    pub last_audit_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_vulnerabilities: u32,
    #[serde(default)]
    pub critical_vulnerabilities: u32,
    #[serde(default)]
    pub high_vulnerabilities: u32,
}

/// Everything the source adapter returns for one protocol
#[derive(Debug, Clone, Default)]
pub struct RawProtocolData {
    pub revenue: Vec<RevenueRow>,
    pub users: Vec<UserMetricsRow>,
    pub market: Option<MarketSnapshot>,
    pub security: Option<SecurityAssessment>,
}

/// Returns true when `later` is exactly the calendar month after `earlier`
pub fn is_next_month(earlier: NaiveDate, later: NaiveDate) -> bool {
    earlier.checked_add_months(Months::new(1)) == Some(later)
}

fn check_month(protocol_id: &str, month: NaiveDate) -> ScoringResult<()> {
    if month.day() != 1 {
        return Err(ScoringError::upstream(
            protocol_id,
            format!("month {} is not a first-of-month date", month),
        ));
    }
    Ok(())
}

/// Month-bucketed revenue per source
///
/// Months are kept in a `BTreeMap` so iteration is always chronological and
/// sources within a month are iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RevenueSeries {
    months: BTreeMap<NaiveDate, BTreeMap<String, f64>>,
}

impl RevenueSeries {
    /// Normalize raw rows: validate schema, sort by month, sum duplicate (month, source) rows
    pub fn from_rows(protocol_id: &str, rows: &[RevenueRow]) -> ScoringResult<Self> {
        if rows.is_empty() {
            return Err(ScoringError::upstream(protocol_id, "empty revenue series"));
        }

        let mut months: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
        for row in rows {
            check_month(protocol_id, row.month)?;
            if row.source.trim().is_empty() {
                return Err(ScoringError::upstream(
                    protocol_id,
                    format!("revenue row for {} has an empty source name", row.month),
                ));
            }
            if !row.amount_usd.is_finite() || row.amount_usd < 0.0 {
                return Err(ScoringError::upstream(
                    protocol_id,
                    format!(
                        "revenue amount {} for {}/{} must be a non-negative number",
                        row.amount_usd, row.month, row.source
                    ),
                ));
            }
            *months
                .entry(row.month)
                .or_default()
                .entry(row.source.clone())
                .or_insert(0.0) += row.amount_usd;
        }

        Ok(Self { months })
    }

    pub(crate) fn from_buckets(months: BTreeMap<NaiveDate, BTreeMap<String, f64>>) -> Self {
        Self { months }
    }

    pub(crate) fn buckets(&self) -> &BTreeMap<NaiveDate, BTreeMap<String, f64>> {
        &self.months
    }

    pub fn months(&self) -> Vec<NaiveDate> {
        self.months.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.months.is_empty()
    }

    /// True if the source has a row in at least one month
    pub fn has_source(&self, source: &str) -> bool {
        self.months.values().any(|m| m.contains_key(source))
    }

    /// All source names seen in any month, sorted
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .months
            .values()
            .flat_map(|m| m.keys().cloned())
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }

    pub fn amount(&self, month: NaiveDate, source: &str) -> Option<f64> {
        self.months.get(&month).and_then(|m| m.get(source)).copied()
    }

    pub fn amounts_in(&self, month: NaiveDate) -> Option<&BTreeMap<String, f64>> {
        self.months.get(&month)
    }

    pub fn total_for(&self, month: NaiveDate) -> f64 {
        self.months
            .get(&month)
            .map(|m| m.values().sum())
            .unwrap_or(0.0)
    }

    /// Per-month totals in chronological order
    pub fn monthly_totals(&self) -> Vec<(NaiveDate, f64)> {
        self.months
            .iter()
            .map(|(month, sources)| (*month, sources.values().sum()))
            .collect()
    }

    /// Months in which the source has a row, with its amount
    pub fn source_points(&self, source: &str) -> Vec<(NaiveDate, f64)> {
        self.months
            .iter()
            .filter_map(|(month, sources)| sources.get(source).map(|v| (*month, *v)))
            .collect()
    }

    /// Most recent month whose total revenue is positive
    pub fn latest_month_with_revenue(&self) -> Option<NaiveDate> {
        self.months
            .iter()
            .rev()
            .find(|(_, sources)| sources.values().sum::<f64>() > 0.0)
            .map(|(month, _)| *month)
    }

    /// Flattened rows (month, source order) for reporting
    pub fn to_rows(&self) -> Vec<RevenueRow> {
        self.months
            .iter()
            .flat_map(|(month, sources)| {
                sources.iter().map(move |(source, amount)| RevenueRow {
                    month: *month,
                    source: source.clone(),
                    amount_usd: *amount,
                })
            })
            .collect()
    }
}

/// Month-bucketed user activity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserMetricsSeries {
    rows: Vec<UserMetricsRow>,
}

impl UserMetricsSeries {
    /// Normalize raw rows: validate schema, sort by month, sum duplicate months
    ///
    /// `volume_divisor` rescales raw token-unit volumes (1.0 leaves them untouched).
    pub fn from_rows(
        protocol_id: &str,
        rows: &[UserMetricsRow],
        volume_divisor: f64,
    ) -> ScoringResult<Self> {
        if rows.is_empty() {
            return Err(ScoringError::upstream(protocol_id, "empty user metrics series"));
        }

        let mut by_month: BTreeMap<NaiveDate, UserMetricsRow> = BTreeMap::new();
        for row in rows {
            check_month(protocol_id, row.month)?;
            if !row.transaction_volume_usd.is_finite() || row.transaction_volume_usd < 0.0 {
                return Err(ScoringError::upstream(
                    protocol_id,
                    format!(
                        "transaction volume {} for {} must be a non-negative number",
                        row.transaction_volume_usd, row.month
                    ),
                ));
            }
            let volume = row.transaction_volume_usd / volume_divisor;
            match by_month.get_mut(&row.month) {
                Some(existing) => {
                    let overflow = || {
                        ScoringError::upstream(
                            protocol_id,
                            format!("user counts for {} overflow when summing duplicate rows", row.month),
                        )
                    };
                    existing.active_addresses = existing
                        .active_addresses
                        .checked_add(row.active_addresses)
                        .ok_or_else(overflow)?;
                    existing.transaction_count = existing
                        .transaction_count
                        .checked_add(row.transaction_count)
                        .ok_or_else(overflow)?;
                    existing.transaction_volume_usd += volume;
                }
                None => {
                    by_month.insert(
                        row.month,
                        UserMetricsRow {
                            month: row.month,
                            active_addresses: row.active_addresses,
                            transaction_count: row.transaction_count,
                            transaction_volume_usd: volume,
                        },
                    );
                }
            }
        }

        Ok(Self {
            rows: by_month.into_values().collect(),
        })
    }

    pub fn rows(&self) -> &[UserMetricsRow] {
        &self.rows
    }

    /// The last two rows when they are literally consecutive calendar months
    pub fn latest_consecutive_pair(&self) -> Option<(&UserMetricsRow, &UserMetricsRow)> {
        let n = self.rows.len();
        if n < 2 {
            return None;
        }
        let (previous, current) = (&self.rows[n - 2], &self.rows[n - 1]);
        if is_next_month(previous.month, current.month) {
            Some((previous, current))
        } else {
            None
        }
    }
}

/// Where the magnitude denominator came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSource {
    ConfiguredOverride,
    CategoryPeerMedian,
    GlobalDefault,
}

/// Where the fair-value benchmark ratio came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchmarkSource {
    CategoryPeerAverage,
    CategorySetting,
    GlobalDefault,
}

/// A default substituted for a statistic that lacked data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fallback {
    pub field: String,
    pub reason: String,
    pub default_value: f64,
}

impl Fallback {
    pub fn from_error(field: &str, err: &ScoringError, default_value: f64) -> Self {
        Self {
            field: field.to_string(),
            reason: err.to_string(),
            default_value,
        }
    }
}

/// Descriptive statistics of the pooled month-over-month changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilitySummary {
    pub observations: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: Option<f64>,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqsComponents {
    pub score: f64,
    pub stability_score: f64,
    pub diversification_score: f64,
    pub magnitude_score: f64,
    pub stability_weight: f64,
    pub diversification_weight: f64,
    pub target_stdev: f64,
    pub change_observations: usize,
    pub change_stdev: Option<f64>,
    pub latest_period: Option<NaiveDate>,
    pub latest_revenue_usd: f64,
    pub reference_revenue_usd: f64,
    pub reference_source: ReferenceSource,
    pub revenue_by_source: BTreeMap<String, f64>,
    pub volatility: Option<VolatilitySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthComponent {
    pub growth_rate_pct: Option<f64>,
    pub percentile_rank: Option<f64>,
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UgsComponents {
    pub score: f64,
    pub latest_month: Option<NaiveDate>,
    pub active_addresses: GrowthComponent,
    pub transaction_count: GrowthComponent,
    pub transaction_volume: GrowthComponent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FvsComponents {
    pub score: f64,
    pub market_cap_usd: Option<f64>,
    #[serde(default)]
    pub price_usd: Option<f64>,
    pub annualized_revenue_usd: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub ps_ratio_threshold: f64,
    pub benchmark_ps_ratio: f64,
    pub benchmark_source: BenchmarkSource,
    pub overvalued_ps_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyComponents {
    pub score: f64,
    pub assessed: bool,
    pub base_score: Option<f64>,
    pub audit_coverage: Option<f64>,
    #[serde(default)]
    pub audit_status: Option<String>,
    #[serde(default)]
    pub last_audit_date: Option<NaiveDate>,
    #[serde(default)]
    pub total_vulnerabilities: u32,
    pub critical_vulnerabilities: u32,
    pub high_vulnerabilities: u32,
    pub vulnerability_penalty: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub eqs: f64,
    pub ugs: f64,
    pub fvs: f64,
    pub ss: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            eqs: 0.25,
            ugs: 0.25,
            fvs: 0.25,
            ss: 0.25,
        }
    }
}

/// Every intermediate value behind a score record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub category: String,
    pub eqs: EqsComponents,
    pub ugs: UgsComponents,
    pub fvs: FvsComponents,
    pub ss: SafetyComponents,
    pub composite_weights: CompositeWeights,
    pub fallbacks: Vec<Fallback>,
}

/// Immutable result of one scoring run for one protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub protocol_id: String,
    pub eqs: f64,
    pub ugs: f64,
    pub fvs: f64,
    pub ss: f64,
    pub how3_score: f64,
    pub calculated_at: DateTime<Utc>,
    pub components: ScoreComponents,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn row(month: NaiveDate, source: &str, amount: f64) -> RevenueRow {
        RevenueRow {
            month,
            source: source.to_string(),
            amount_usd: amount,
        }
    }

    #[test]
    fn test_unsorted_rows_are_sorted_and_duplicates_summed() {
        let rows = vec![
            row(d(2024, 5), "fm", 10.0),
            row(d(2024, 4), "ocr", 5.0),
            row(d(2024, 5), "fm", 2.5),
        ];
        let series = RevenueSeries::from_rows("p", &rows).unwrap();

        assert_eq!(series.months(), vec![d(2024, 4), d(2024, 5)]);
        assert_eq!(series.amount(d(2024, 5), "fm"), Some(12.5));
        assert_eq!(series.sources(), vec!["fm".to_string(), "ocr".to_string()]);
    }

    #[test]
    fn test_empty_revenue_is_upstream_error() {
        let err = RevenueSeries::from_rows("p", &[]).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let err = RevenueSeries::from_rows("p", &[row(d(2024, 1), "fees", -1.0)]).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn test_mid_month_date_rejected() {
        let mid = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let err = RevenueSeries::from_rows("p", &[row(mid, "fees", 1.0)]).unwrap_err();
        assert!(err.to_string().contains("first-of-month"));
    }

    #[test]
    fn test_latest_month_with_revenue_skips_empty_months() {
        let rows = vec![
            row(d(2024, 1), "fees", 10.0),
            row(d(2024, 2), "fees", 0.0),
        ];
        let series = RevenueSeries::from_rows("p", &rows).unwrap();
        assert_eq!(series.latest_month_with_revenue(), Some(d(2024, 1)));
    }

    #[test]
    fn test_next_month_across_year_boundary() {
        assert!(is_next_month(d(2023, 12), d(2024, 1)));
        assert!(!is_next_month(d(2023, 11), d(2024, 1)));
    }

    #[test]
    fn test_user_series_pair_requires_consecutive_months() {
        let make = |month| UserMetricsRow {
            month,
            active_addresses: 10,
            transaction_count: 20,
            transaction_volume_usd: 30.0,
        };
        let gapped = UserMetricsSeries::from_rows("p", &[make(d(2024, 1)), make(d(2024, 3))], 1.0)
            .unwrap();
        assert!(gapped.latest_consecutive_pair().is_none());

        let adjacent =
            UserMetricsSeries::from_rows("p", &[make(d(2024, 3)), make(d(2024, 2))], 1.0).unwrap();
        let (prev, cur) = adjacent.latest_consecutive_pair().unwrap();
        assert_eq!(prev.month, d(2024, 2));
        assert_eq!(cur.month, d(2024, 3));
    }

    #[test]
    fn test_duplicate_user_rows_are_summed() {
        let rows = vec![
            UserMetricsRow {
                month: d(2024, 2),
                active_addresses: 10,
                transaction_count: 100,
                transaction_volume_usd: 1.5,
            },
            UserMetricsRow {
                month: d(2024, 1),
                active_addresses: 1,
                transaction_count: 1,
                transaction_volume_usd: 1.0,
            },
            UserMetricsRow {
                month: d(2024, 2),
                active_addresses: 5,
                transaction_count: 50,
                transaction_volume_usd: 2.5,
            },
        ];
        let series = UserMetricsSeries::from_rows("p", &rows, 1.0).unwrap();

        assert_eq!(series.rows().len(), 2);
        let february = &series.rows()[1];
        assert_eq!(february.month, d(2024, 2));
        assert_eq!(february.active_addresses, 15);
        assert_eq!(february.transaction_count, 150);
        assert_eq!(february.transaction_volume_usd, 4.0);
    }

    #[test]
    fn test_duplicate_user_rows_overflow_is_upstream_error() {
        let row = UserMetricsRow {
            month: d(2024, 1),
            active_addresses: u64::MAX,
            transaction_count: 1,
            transaction_volume_usd: 1.0,
        };
        let err = UserMetricsSeries::from_rows("p", &[row.clone(), row], 1.0).unwrap_err();

        assert!(err.is_upstream());
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_volume_divisor_rescales_volume() {
        let rows = vec![UserMetricsRow {
            month: d(2024, 1),
            active_addresses: 1,
            transaction_count: 1,
            transaction_volume_usd: 5e18,
        }];
        let series = UserMetricsSeries::from_rows("p", &rows, 1e18).unwrap();
        assert!((series.rows()[0].transaction_volume_usd - 5.0).abs() < 1e-9);
    }
}
