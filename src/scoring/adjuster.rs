//! Revenue reattribution
//!
//! Applies the configured `revenue_mapping` rules to a normalized revenue series.
//! Rules run in declaration order so chains (`a → b`, `b → c`) compose left to
//! right. Monthly totals are conserved.

use super::error::{ScoringError, ScoringResult};
use super::protocol_config::EqsSettings;
use super::types::RevenueSeries;
use chrono::NaiveDate;

/// Revenue series after reattribution, plus the reference override to forward
#[derive(Debug, Clone, PartialEq)]
pub struct AdjustedRevenueSeries {
    pub series: RevenueSeries,
    /// Denominator override for magnitude normalization (does not alter the series)
    pub reference_revenue: Option<f64>,
}

impl AdjustedRevenueSeries {
    pub fn total_for(&self, month: NaiveDate) -> f64 {
        self.series.total_for(month)
    }
}

pub struct RevenueAdjuster;

impl RevenueAdjuster {
    /// Apply reattribution rules to `raw`
    ///
    /// Fails with a config error when a rule names a source that never appears
    /// in the raw series: a mapping that matches nothing is treated as a typo.
    pub fn adjust(
        protocol_id: &str,
        raw: &RevenueSeries,
        config: &EqsSettings,
    ) -> ScoringResult<AdjustedRevenueSeries> {
        for (index, rule) in config.revenue_mapping.iter().enumerate() {
            for source in [&rule.from, &rule.to] {
                if !raw.has_source(source) {
                    return Err(ScoringError::config(
                        protocol_id,
                        &format!("eqs.revenue_mapping[{}]", index),
                        format!("source '{}' does not appear in any month of the revenue series", source),
                    ));
                }
            }
        }

        let mut buckets = raw.buckets().clone();
        for rule in &config.revenue_mapping {
            let mut moved = 0.0;
            for sources in buckets.values_mut() {
                let Some(amount) = sources.get_mut(&rule.from) else {
                    continue;
                };
                let from_amount = std::mem::replace(amount, 0.0);
                *sources.entry(rule.to.clone()).or_insert(0.0) += from_amount;
                moved += from_amount;
            }
            log::debug!(
                "{}: reattributed {:.2} USD from '{}' to '{}'",
                protocol_id,
                moved,
                rule.from,
                rule.to
            );
        }

        Ok(AdjustedRevenueSeries {
            series: RevenueSeries::from_buckets(buckets),
            reference_revenue: config.reference_override,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::protocol_config::{ProtocolSettings, Reattribution};
    use crate::scoring::types::RevenueRow;

    fn d(m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, 1).unwrap()
    }

    fn series(rows: &[(u32, &str, f64)]) -> RevenueSeries {
        let rows: Vec<RevenueRow> = rows
            .iter()
            .map(|(m, s, a)| RevenueRow {
                month: d(*m),
                source: s.to_string(),
                amount_usd: *a,
            })
            .collect();
        RevenueSeries::from_rows("test", &rows).unwrap()
    }

    fn settings(mapping: &[(&str, &str)]) -> EqsSettings {
        let mut eqs = ProtocolSettings::builtin("test").eqs;
        eqs.revenue_mapping = mapping
            .iter()
            .map(|(from, to)| Reattribution {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect();
        eqs
    }

    #[test]
    fn test_ocr_into_fm() {
        let raw = series(&[(1, "ocr", 100.0), (1, "fm", 50.0)]);
        let adjusted = RevenueAdjuster::adjust("test", &raw, &settings(&[("ocr", "fm")])).unwrap();

        assert_eq!(adjusted.series.amount(d(1), "ocr"), Some(0.0));
        assert_eq!(adjusted.series.amount(d(1), "fm"), Some(150.0));
    }

    #[test]
    fn test_chained_rules_compose_left_to_right() {
        let raw = series(&[(1, "a", 10.0), (1, "b", 20.0), (1, "c", 30.0)]);
        let adjusted =
            RevenueAdjuster::adjust("test", &raw, &settings(&[("a", "b"), ("b", "c")])).unwrap();

        assert_eq!(adjusted.series.amount(d(1), "a"), Some(0.0));
        assert_eq!(adjusted.series.amount(d(1), "b"), Some(0.0));
        assert_eq!(adjusted.series.amount(d(1), "c"), Some(60.0));
    }

    #[test]
    fn test_target_created_in_months_where_absent() {
        let raw = series(&[(1, "ocr", 100.0), (1, "fm", 50.0), (2, "ocr", 80.0)]);
        let adjusted = RevenueAdjuster::adjust("test", &raw, &settings(&[("ocr", "fm")])).unwrap();

        assert_eq!(adjusted.series.amount(d(2), "fm"), Some(80.0));
        assert_eq!(adjusted.total_for(d(2)), 80.0);
    }

    #[test]
    fn test_monthly_totals_conserved() {
        let raw = series(&[
            (1, "ocr", 100.0),
            (1, "fm", 50.0),
            (1, "vrf", 7.0),
            (2, "fm", 60.0),
            (2, "vrf", 3.5),
        ]);
        let adjusted =
            RevenueAdjuster::adjust("test", &raw, &settings(&[("ocr", "fm"), ("vrf", "fm")]))
                .unwrap();

        for (month, total) in raw.monthly_totals() {
            assert!((adjusted.total_for(month) - total).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_source_is_config_error() {
        let raw = series(&[(1, "ocr", 100.0), (1, "fm", 50.0)]);
        let err = RevenueAdjuster::adjust("test", &raw, &settings(&[("orc", "fm")])).unwrap_err();

        assert!(err.is_config());
        assert!(err.to_string().contains("'orc'"));
    }

    #[test]
    fn test_reference_override_forwarded_untouched() {
        let raw = series(&[(1, "fees", 100.0)]);
        let mut eqs = settings(&[]);
        eqs.reference_override = Some(1_000.0);
        let adjusted = RevenueAdjuster::adjust("test", &raw, &eqs).unwrap();

        assert_eq!(adjusted.reference_revenue, Some(1_000.0));
        assert_eq!(adjusted.series, raw);
    }
}
