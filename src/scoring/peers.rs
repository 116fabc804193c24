//! Cross-protocol peer statistics for one scoring run
//!
//! Built once from every prepared protocol of a run and shared read-only
//! (`Arc<PeerSet>`) by the scoring workers. The subject protocol is part of its
//! own peer set.

use super::calculators::fvs::ps_ratio;
use super::calculators::UserGrowthPeers;
use super::engine::PreparedProtocol;
use super::statistics::{mean, median};
use std::collections::HashMap;

/// Category statistics need at least this many contributing protocols
pub const MIN_CATEGORY_PEERS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct PeerSet {
    members: usize,
    growth: UserGrowthPeers,
    category_revenues: HashMap<String, Vec<f64>>,
    category_ps_ratios: HashMap<String, Vec<f64>>,
}

impl PeerSet {
    pub fn from_prepared<'a>(protocols: impl IntoIterator<Item = &'a PreparedProtocol>) -> Self {
        let mut peers = PeerSet::default();
        for protocol in protocols {
            peers.add(protocol);
        }
        log::debug!(
            "Peer set built from {} protocols across {} categories",
            peers.members,
            peers.category_revenues.len()
        );
        peers
    }

    fn add(&mut self, protocol: &PreparedProtocol) {
        self.members += 1;
        self.growth.push(&protocol.growth);

        let category = protocol.settings.metadata.category.clone();
        let series = &protocol.adjusted.series;
        if let Some(month) = series.latest_month_with_revenue() {
            self.category_revenues
                .entry(category.clone())
                .or_default()
                .push(series.total_for(month));
        }
        if let Some(ratio) = ps_ratio(protocol.market.as_ref(), protocol.annualized_revenue) {
            self.category_ps_ratios.entry(category).or_default().push(ratio);
        }
    }

    pub fn len(&self) -> usize {
        self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members == 0
    }

    pub fn growth(&self) -> &UserGrowthPeers {
        &self.growth
    }

    /// Median latest-month revenue of the category's protocols with revenue
    pub fn category_reference_revenue(&self, category: &str) -> Option<f64> {
        self.category_revenues
            .get(category)
            .filter(|values| values.len() >= MIN_CATEGORY_PEERS)
            .and_then(|values| median(values))
    }

    /// Average P/S ratio of the category's protocols with market data
    pub fn category_average_ps_ratio(&self, category: &str) -> Option<f64> {
        self.category_ps_ratios
            .get(category)
            .filter(|values| values.len() >= MIN_CATEGORY_PEERS)
            .and_then(|values| mean(values))
    }
}
