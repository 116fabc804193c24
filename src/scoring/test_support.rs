//! Fixtures shared by unit tests

use super::types::{
    BenchmarkSource, CompositeWeights, EqsComponents, Fallback, FvsComponents, GrowthComponent,
    ReferenceSource, SafetyComponents, ScoreComponents, ScoreRecord, UgsComponents,
};
use chrono::{TimeZone, Utc};
use std::collections::BTreeMap;

fn growth(score: f64, weight: f64) -> GrowthComponent {
    GrowthComponent {
        growth_rate_pct: Some(12.5),
        percentile_rank: Some(score / 100.0),
        score,
        weight,
    }
}

/// A complete record with every sub-score set to `score`
pub fn sample_record(protocol_id: &str, calculated_at_ms: i64, score: f64) -> ScoreRecord {
    let calculated_at = Utc.timestamp_millis_opt(calculated_at_ms).unwrap();

    ScoreRecord {
        protocol_id: protocol_id.to_string(),
        eqs: score,
        ugs: score,
        fvs: score,
        ss: score,
        how3_score: score,
        calculated_at,
        components: ScoreComponents {
            category: "Lending".to_string(),
            eqs: EqsComponents {
                score,
                stability_score: 80.0,
                diversification_score: 45.5,
                magnitude_score: 100.0,
                stability_weight: 0.7,
                diversification_weight: 0.3,
                target_stdev: 1.0,
                change_observations: 11,
                change_stdev: Some(0.2),
                latest_period: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
                latest_revenue_usd: 7_250_000.25,
                reference_revenue_usd: 5_000_000.0,
                reference_source: ReferenceSource::GlobalDefault,
                revenue_by_source: BTreeMap::from([
                    ("borrow".to_string(), 5_000_000.25),
                    ("flash".to_string(), 2_250_000.0),
                ]),
                volatility: None,
            },
            ugs: UgsComponents {
                score,
                latest_month: chrono::NaiveDate::from_ymd_opt(2024, 6, 1),
                active_addresses: growth(score, 0.4),
                transaction_count: growth(score, 0.3),
                transaction_volume: growth(score, 0.3),
            },
            fvs: FvsComponents {
                score,
                market_cap_usd: Some(1.5e9),
                price_usd: Some(42.0),
                annualized_revenue_usd: Some(1.2e8),
                ps_ratio: Some(12.5),
                ps_ratio_threshold: 10.0,
                benchmark_ps_ratio: 30.0,
                benchmark_source: BenchmarkSource::CategorySetting,
                overvalued_ps_ratio: 50.0,
            },
            ss: SafetyComponents {
                score,
                assessed: true,
                base_score: Some(90.0),
                audit_coverage: None,
                audit_status: Some("audited".to_string()),
                last_audit_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 15),
                total_vulnerabilities: 4,
                critical_vulnerabilities: 0,
                high_vulnerabilities: 1,
                vulnerability_penalty: 5.0,
            },
            composite_weights: CompositeWeights::default(),
            fallbacks: vec![Fallback {
                field: "eqs.stability".to_string(),
                reason: "Insufficient data for stability: 1 month-over-month observations, need at least 2".to_string(),
                default_value: 50.0,
            }],
        },
    }
}
