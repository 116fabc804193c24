//! How3 protocol scoring engine
//!
//! Turns per-protocol monthly series (revenue by source, user activity) plus
//! market and security inputs into four 0-100 sub-scores and a composite:
//!
//! - **EQS** (Earnings Quality): stability, diversification and magnitude of revenue
//! - **UGS** (User Growth): percentile-ranked growth of users, transactions, volume
//! - **FVS** (Fair Value): price-to-sales ratio against a category benchmark
//! - **SS** (Safety): security assessment minus vulnerability penalties
//! - **How3**: weighted mean of the four (default 25 % each)
//!
//! ```text
//! ConfigStore → SourceAdapter → RevenueAdjuster → statistics → calculators
//!             → CompositeAggregator → ScoreRecord → ReportStore
//! ```

pub mod adjuster;
pub mod aggregator;
pub mod calculators;
pub mod engine;
pub mod error;
pub mod peers;
pub mod protocol_config;
pub mod scheduler;
pub mod source;
pub mod statistics;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use adjuster::{AdjustedRevenueSeries, RevenueAdjuster};
pub use aggregator::CompositeAggregator;
pub use engine::{PreparedProtocol, ProtocolFailure, ScoringEngine, ScoringRunReport};
pub use error::{ScoringError, ScoringResult};
pub use peers::PeerSet;
pub use protocol_config::{ConfigStore, ProtocolSettings};
pub use source::{InMemorySource, JsonDirectorySource, SourceAdapter};
pub use types::{
    CompositeWeights, Fallback, MarketSnapshot, RawProtocolData, RevenueRow, RevenueSeries,
    ScoreComponents, ScoreRecord, SecurityAssessment, UserMetricsRow, UserMetricsSeries,
};
