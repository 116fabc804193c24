//! Fair Value Score
//!
//! Compares the price-to-sales ratio (market cap over annualized revenue) with
//! a benchmark multiple. At or below `ps_ratio_threshold` the protocol scores
//! 100; at or above the overvalued bound it scores 0; linear in between.

use super::clamp_score;
use crate::scoring::error::ScoringError;
use crate::scoring::protocol_config::FvsSettings;
use crate::scoring::types::{BenchmarkSource, Fallback, FvsComponents, MarketSnapshot, RevenueSeries};
use chrono::Months;

const TRAILING_MONTHS: u32 = 12;

/// Revenue summed over the trailing 12 calendar months
///
/// The window ends at the most recent month of the series. Months without rows
/// contribute zero; nothing is extrapolated.
pub fn annualized_revenue(series: &RevenueSeries) -> Option<f64> {
    let totals = series.monthly_totals();
    let (latest, _) = *totals.last()?;
    let window_start = latest.checked_sub_months(Months::new(TRAILING_MONTHS - 1))?;

    Some(
        totals
            .iter()
            .filter(|(month, _)| *month >= window_start)
            .map(|(_, total)| *total)
            .sum(),
    )
}

/// Market cap over annualized revenue; `None` unless both are positive
pub fn ps_ratio(market: Option<&MarketSnapshot>, annualized_revenue: Option<f64>) -> Option<f64> {
    let market_cap = market.map(|m| m.market_cap_usd).filter(|c| c.is_finite() && *c > 0.0)?;
    let revenue = annualized_revenue.filter(|r| r.is_finite() && *r > 0.0)?;
    Some(market_cap / revenue)
}

/// Ratio at which the score reaches 0
pub fn overvalued_ratio(threshold: f64, benchmark: f64) -> f64 {
    if benchmark > threshold {
        2.0 * benchmark - threshold
    } else {
        2.0 * threshold
    }
}

/// Piecewise-linear, non-increasing mapping of a P/S ratio onto [0, 100]
pub fn ratio_score(ratio: f64, threshold: f64, overvalued: f64) -> f64 {
    if ratio <= threshold {
        100.0
    } else if ratio >= overvalued {
        0.0
    } else {
        clamp_score(100.0 * (overvalued - ratio) / (overvalued - threshold))
    }
}

pub struct FairValueCalculator;

impl FairValueCalculator {
    pub fn calculate(
        market: Option<&MarketSnapshot>,
        annualized_revenue_usd: Option<f64>,
        settings: &FvsSettings,
        category_peer_average: Option<f64>,
        fallbacks: &mut Vec<Fallback>,
    ) -> FvsComponents {
        let (benchmark_ps_ratio, benchmark_source) =
            if let Some(average) = category_peer_average.filter(|a| *a > 0.0) {
                (average, BenchmarkSource::CategoryPeerAverage)
            } else if let Some(multiple) = settings.category_benchmark_ps_ratio {
                (multiple, BenchmarkSource::CategorySetting)
            } else {
                (settings.default_benchmark_ps_ratio, BenchmarkSource::GlobalDefault)
            };

        let threshold = settings.ps_ratio_threshold;
        let overvalued_ps_ratio = overvalued_ratio(threshold, benchmark_ps_ratio);
        let ratio = ps_ratio(market, annualized_revenue_usd);

        let score = match ratio {
            Some(r) => ratio_score(r, threshold, overvalued_ps_ratio),
            None => {
                let reason = if market.is_none() {
                    "no market data"
                } else {
                    "market cap or annualized revenue is not positive"
                };
                fallbacks.push(Fallback::from_error(
                    "fvs.ps_ratio",
                    &ScoringError::insufficient("ps_ratio", reason),
                    settings.default_score,
                ));
                settings.default_score
            }
        };

        FvsComponents {
            score,
            market_cap_usd: market.map(|m| m.market_cap_usd),
            price_usd: market.and_then(|m| m.price_usd),
            annualized_revenue_usd,
            ps_ratio: ratio,
            ps_ratio_threshold: threshold,
            benchmark_ps_ratio,
            benchmark_source,
            overvalued_ps_ratio,
        }
    }
}
