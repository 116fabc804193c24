//! Earnings Quality Score
//!
//! `EQS = (w_s * stability + w_d * diversification) * magnitude / 100`

use super::clamp_score;
use crate::scoring::adjuster::AdjustedRevenueSeries;
use crate::scoring::protocol_config::{EqsSettings, EqsWeights};
use crate::scoring::statistics::{
    diversification_score, magnitude_score, pooled_source_changes, sample_stdev,
    stability_score, volatility_summary,
};
use crate::scoring::types::{EqsComponents, Fallback, ReferenceSource};

pub struct EarningsQualityCalculator;

impl EarningsQualityCalculator {
    /// Score an adjusted revenue series
    ///
    /// `category_reference` is the median latest-month revenue of the
    /// protocol's category peers, when enough peers exist.
    pub fn calculate(
        adjusted: &AdjustedRevenueSeries,
        settings: &EqsSettings,
        category_reference: Option<f64>,
        fallbacks: &mut Vec<Fallback>,
    ) -> EqsComponents {
        let series = &adjusted.series;

        let changes = pooled_source_changes(series);
        let stability = match stability_score(&changes, settings.target_stdev) {
            Ok(score) => score,
            Err(e) => {
                fallbacks.push(Fallback::from_error(
                    "eqs.stability",
                    &e,
                    settings.default_stability_score,
                ));
                settings.default_stability_score
            }
        };

        let latest_period = series.latest_month_with_revenue();
        let revenue_by_source = latest_period
            .and_then(|month| series.amounts_in(month))
            .cloned()
            .unwrap_or_default();

        let diversification = match diversification_score(revenue_by_source.values()) {
            Ok(score) => score,
            Err(e) => {
                fallbacks.push(Fallback::from_error(
                    "eqs.diversification",
                    &e,
                    settings.default_diversification_score,
                ));
                settings.default_diversification_score
            }
        };

        let latest_revenue_usd: f64 = revenue_by_source.values().sum();
        let (reference_revenue_usd, reference_source) = resolve_reference(
            adjusted.reference_revenue,
            category_reference,
            settings.default_reference_revenue,
        );
        let magnitude = magnitude_score(latest_revenue_usd, reference_revenue_usd);

        EqsComponents {
            score: combine_eqs(&settings.weights, stability, diversification, magnitude),
            stability_score: stability,
            diversification_score: diversification,
            magnitude_score: magnitude,
            stability_weight: settings.weights.stability,
            diversification_weight: settings.weights.diversification,
            target_stdev: settings.target_stdev,
            change_observations: changes.len(),
            change_stdev: sample_stdev(&changes),
            latest_period,
            latest_revenue_usd,
            reference_revenue_usd,
            reference_source,
            revenue_by_source,
            volatility: volatility_summary(&changes),
        }
    }
}

/// Weighted blend of stability and diversification, scaled by magnitude
pub fn combine_eqs(
    weights: &EqsWeights,
    stability: f64,
    diversification: f64,
    magnitude: f64,
) -> f64 {
    clamp_score(
        (weights.stability * stability + weights.diversification * diversification) * magnitude
            / 100.0,
    )
}

/// Configured override, then category-peer median, then the global default
fn resolve_reference(
    configured: Option<f64>,
    category_reference: Option<f64>,
    default_reference: f64,
) -> (f64, ReferenceSource) {
    if let Some(reference) = configured {
        (reference, ReferenceSource::ConfiguredOverride)
    } else if let Some(reference) = category_reference.filter(|r| *r > 0.0) {
        (reference, ReferenceSource::CategoryPeerMedian)
    } else {
        (default_reference, ReferenceSource::GlobalDefault)
    }
}
