//! User Growth Score
//!
//! Latest month-over-month growth of active addresses, transaction count and
//! transaction volume, each percentile-ranked against the peer set and blended
//! with the configured weights.

use super::clamp_score;
use crate::scoring::error::ScoringError;
use crate::scoring::protocol_config::UgsSettings;
use crate::scoring::statistics::{growth_rate, percentile_rank};
use crate::scoring::types::{Fallback, GrowthComponent, UgsComponents, UserMetricsSeries};
use chrono::NaiveDate;

/// Latest growth rates (percent) of one protocol
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserGrowth {
    pub latest_month: Option<NaiveDate>,
    pub active_addresses: Option<f64>,
    pub transaction_count: Option<f64>,
    pub transaction_volume: Option<f64>,
}

impl UserGrowth {
    /// Growth between the two most recent months; `None` across a gap or from zero
    pub fn from_series(series: &UserMetricsSeries) -> Self {
        let latest_month = series.rows().last().map(|row| row.month);
        match series.latest_consecutive_pair() {
            Some((previous, current)) => Self {
                latest_month,
                active_addresses: growth_rate(
                    current.active_addresses as f64,
                    previous.active_addresses as f64,
                ),
                transaction_count: growth_rate(
                    current.transaction_count as f64,
                    previous.transaction_count as f64,
                ),
                transaction_volume: growth_rate(
                    current.transaction_volume_usd,
                    previous.transaction_volume_usd,
                ),
            },
            None => Self {
                latest_month,
                ..Self::default()
            },
        }
    }
}

/// Growth rates of every protocol in a run, one vector per metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserGrowthPeers {
    pub active_addresses: Vec<f64>,
    pub transaction_count: Vec<f64>,
    pub transaction_volume: Vec<f64>,
}

impl UserGrowthPeers {
    pub fn push(&mut self, growth: &UserGrowth) {
        self.active_addresses.extend(growth.active_addresses);
        self.transaction_count.extend(growth.transaction_count);
        self.transaction_volume.extend(growth.transaction_volume);
    }
}

pub struct UserGrowthCalculator;

impl UserGrowthCalculator {
    pub fn calculate(
        growth: &UserGrowth,
        peers: &UserGrowthPeers,
        settings: &UgsSettings,
        fallbacks: &mut Vec<Fallback>,
    ) -> UgsComponents {
        let default = settings.default_component_score;
        let weights = &settings.weights;

        let active_addresses = component(
            "ugs.active_addresses",
            growth.active_addresses,
            &peers.active_addresses,
            weights.active_addresses,
            default,
            fallbacks,
        );
        let transaction_count = component(
            "ugs.transaction_count",
            growth.transaction_count,
            &peers.transaction_count,
            weights.transaction_count,
            default,
            fallbacks,
        );
        let transaction_volume = component(
            "ugs.transaction_volume",
            growth.transaction_volume,
            &peers.transaction_volume,
            weights.transaction_volume,
            default,
            fallbacks,
        );

        let score = clamp_score(
            [&active_addresses, &transaction_count, &transaction_volume]
                .iter()
                .map(|c| c.weight * c.score)
                .sum(),
        );

        UgsComponents {
            score,
            latest_month: growth.latest_month,
            active_addresses,
            transaction_count,
            transaction_volume,
        }
    }
}

fn component(
    field: &str,
    growth: Option<f64>,
    peers: &[f64],
    weight: f64,
    default: f64,
    fallbacks: &mut Vec<Fallback>,
) -> GrowthComponent {
    let ranked = growth
        .ok_or_else(|| {
            ScoringError::insufficient(
                "growth_rate",
                "no consecutive month pair with a non-zero previous value",
            )
        })
        .and_then(|rate| percentile_rank(rate, peers));

    match ranked {
        Ok(rank) => GrowthComponent {
            growth_rate_pct: growth,
            percentile_rank: Some(rank),
            score: clamp_score(rank * 100.0),
            weight,
        },
        Err(e) => {
            fallbacks.push(Fallback::from_error(field, &e, default));
            GrowthComponent {
                growth_rate_pct: growth,
                percentile_rank: None,
                score: default,
                weight,
            }
        }
    }
}
