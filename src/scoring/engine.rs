//! Scoring Engine - orchestration of one scoring run
//!
//! ## Architecture
//!
//! ```text
//! ConfigStore ──► SourceAdapter::fetch()
//!                     ↓
//!          PreparedProtocol::prepare()   (normalize, reattribute, derive growth)
//!                     ↓
//!              PeerSet::from_prepared()  (whole run, shared via Arc)
//!                     ↓
//!          PreparedProtocol::score()     (EQS, UGS, FVS, SS → How3)
//!                     ↓
//!               ScoringRunReport
//! ```
//!
//! Every protocol is fetched, prepared and scored on its own tokio task. A
//! failure (config, upstream data) produces no record for that protocol and
//! leaves the rest of the run untouched.

use super::adjuster::{AdjustedRevenueSeries, RevenueAdjuster};
use super::aggregator::{CompositeAggregator, SubScores};
use super::calculators::{
    annualized_revenue, EarningsQualityCalculator, FairValueCalculator, SafetyCalculator,
    UserGrowth, UserGrowthCalculator,
};
use super::error::{ScoringError, ScoringResult};
use super::peers::PeerSet;
use super::protocol_config::{ConfigStore, ProtocolSettings};
use super::source::SourceAdapter;
use super::types::{
    MarketSnapshot, RawProtocolData, RevenueSeries, ScoreRecord, SecurityAssessment,
    UserMetricsSeries,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Clock used to stamp records (injectable for tests)
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Normalized, adjusted inputs of one protocol, ready for scoring
#[derive(Debug, Clone)]
pub struct PreparedProtocol {
    pub settings: Arc<ProtocolSettings>,
    pub adjusted: AdjustedRevenueSeries,
    pub growth: UserGrowth,
    pub annualized_revenue: Option<f64>,
    pub market: Option<MarketSnapshot>,
    pub security: Option<SecurityAssessment>,
}

impl PreparedProtocol {
    /// Validate settings, normalize raw rows and apply revenue adjustments
    ///
    /// Configuration problems surface here, before any statistic is computed.
    pub fn prepare(settings: Arc<ProtocolSettings>, raw: RawProtocolData) -> ScoringResult<Self> {
        settings.validate()?;
        let id = settings.metadata.id.as_str();

        let revenue = RevenueSeries::from_rows(id, &raw.revenue)?;
        let users =
            UserMetricsSeries::from_rows(id, &raw.users, settings.ugs.transaction_volume_divisor)?;
        let adjusted = RevenueAdjuster::adjust(id, &revenue, &settings.eqs)?;

        Ok(Self {
            growth: UserGrowth::from_series(&users),
            annualized_revenue: annualized_revenue(&adjusted.series),
            adjusted,
            market: raw.market,
            security: raw.security,
            settings,
        })
    }

    pub fn protocol_id(&self) -> &str {
        &self.settings.metadata.id
    }

    /// Compute all sub-scores against `peers` and assemble the record
    pub fn score(&self, peers: &PeerSet, calculated_at: DateTime<Utc>) -> ScoringResult<ScoreRecord> {
        let settings = &self.settings;
        let category = settings.metadata.category.as_str();
        let mut fallbacks = Vec::new();

        let eqs = EarningsQualityCalculator::calculate(
            &self.adjusted,
            &settings.eqs,
            peers.category_reference_revenue(category),
            &mut fallbacks,
        );
        let ugs =
            UserGrowthCalculator::calculate(&self.growth, peers.growth(), &settings.ugs, &mut fallbacks);
        let fvs = FairValueCalculator::calculate(
            self.market.as_ref(),
            self.annualized_revenue,
            &settings.fvs,
            peers.category_average_ps_ratio(category),
            &mut fallbacks,
        );
        let ss = SafetyCalculator::calculate(self.security.as_ref(), &settings.ss, &mut fallbacks);

        CompositeAggregator::build_record(
            self.protocol_id(),
            category,
            SubScores { eqs, ugs, fvs, ss },
            settings.composite,
            fallbacks,
            calculated_at,
        )
    }
}

/// A protocol that produced no record in a run
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolFailure {
    pub protocol_id: String,
    pub error: ScoringError,
}

/// Outcome of a multi-protocol run
#[derive(Debug, Clone, Default)]
pub struct ScoringRunReport {
    pub calculated_at: Option<DateTime<Utc>>,
    /// Records sorted by protocol id
    pub records: Vec<ScoreRecord>,
    /// Adjusted revenue of every scored protocol, for transparency exports
    pub adjusted_revenue: BTreeMap<String, RevenueSeries>,
    pub failures: Vec<ProtocolFailure>,
}

impl ScoringRunReport {
    pub fn record(&self, protocol_id: &str) -> Option<&ScoreRecord> {
        self.records.iter().find(|r| r.protocol_id == protocol_id)
    }

    pub fn failure(&self, protocol_id: &str) -> Option<&ProtocolFailure> {
        self.failures.iter().find(|f| f.protocol_id == protocol_id)
    }
}

pub struct ScoringEngine {
    config: Arc<ConfigStore>,
    source: Arc<dyn SourceAdapter>,
    now_fn: Clock,
}

impl ScoringEngine {
    pub fn new(config: Arc<ConfigStore>, source: Arc<dyn SourceAdapter>) -> Self {
        Self::new_with_clock(config, source, Box::new(Utc::now))
    }

    /// Create an engine with a custom clock (deterministic timestamps in tests)
    pub fn new_with_clock(
        config: Arc<ConfigStore>,
        source: Arc<dyn SourceAdapter>,
        now_fn: Clock,
    ) -> Self {
        Self {
            config,
            source,
            now_fn,
        }
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    /// Fetch and prepare one protocol
    pub async fn prepare(&self, protocol_id: &str) -> ScoringResult<PreparedProtocol> {
        prepare_protocol(
            Arc::clone(&self.source),
            self.config.settings_for(protocol_id),
        )
        .await
    }

    /// Score a single protocol on its own
    ///
    /// The peer set holds only the protocol itself, so percentile ranks and
    /// category statistics fall back to their configured defaults.
    pub async fn score_protocol(&self, protocol_id: &str) -> ScoringResult<ScoreRecord> {
        let prepared = self.prepare(protocol_id).await?;
        let peers = PeerSet::from_prepared([&prepared]);
        let record = prepared.score(&peers, (self.now_fn)())?;
        log_record(&record);
        Ok(record)
    }

    /// Score every configured protocol
    pub async fn score_configured(&self) -> ScoringRunReport {
        let ids = self.config.protocol_ids();
        self.score_all(&ids).await
    }

    /// Score `protocol_ids` against each other
    pub async fn score_all(&self, protocol_ids: &[String]) -> ScoringRunReport {
        let calculated_at = (self.now_fn)();
        let mut report = ScoringRunReport {
            calculated_at: Some(calculated_at),
            ..Default::default()
        };

        log::info!(
            "🚀 Scoring {} protocols from {} source",
            protocol_ids.len(),
            self.source.source_type()
        );

        // Phase 1: fetch + prepare on independent tasks
        let mut preparing = JoinSet::new();
        let mut preparing_ids = HashMap::new();
        for id in protocol_ids {
            let source = Arc::clone(&self.source);
            let settings = self.config.settings_for(id);
            let task_id = id.clone();
            let handle = preparing.spawn(async move {
                let result = prepare_protocol(source, settings).await;
                (task_id, result)
            });
            preparing_ids.insert(handle.id(), id.clone());
        }

        let mut prepared = Vec::new();
        while let Some(joined) = preparing.join_next().await {
            match joined {
                Ok((_, Ok(protocol))) => prepared.push(Arc::new(protocol)),
                Ok((protocol_id, Err(error))) => {
                    log::error!("❌ {}: {}", protocol_id, error);
                    report.failures.push(ProtocolFailure { protocol_id, error });
                }
                Err(e) => report.failures.push(task_failure(&preparing_ids, "preparation", e)),
            }
        }

        // Phase 2: shared peer statistics
        let peers = Arc::new(PeerSet::from_prepared(prepared.iter().map(|p| p.as_ref())));

        // Phase 3: score on independent tasks
        let mut scoring = JoinSet::new();
        let mut scoring_ids = HashMap::new();
        for protocol in &prepared {
            let id = protocol.protocol_id().to_string();
            let protocol = Arc::clone(protocol);
            let peers = Arc::clone(&peers);
            let handle = scoring.spawn(async move {
                let result = protocol.score(&peers, calculated_at);
                (protocol, result)
            });
            scoring_ids.insert(handle.id(), id);
        }

        while let Some(joined) = scoring.join_next().await {
            match joined {
                Ok((protocol, Ok(record))) => {
                    log_record(&record);
                    report
                        .adjusted_revenue
                        .insert(record.protocol_id.clone(), protocol.adjusted.series.clone());
                    report.records.push(record);
                }
                Ok((protocol, Err(error))) => {
                    log::error!("❌ {}: {}", protocol.protocol_id(), error);
                    report.failures.push(ProtocolFailure {
                        protocol_id: protocol.protocol_id().to_string(),
                        error,
                    });
                }
                Err(e) => report.failures.push(task_failure(&scoring_ids, "scoring", e)),
            }
        }

        report.records.sort_by(|a, b| a.protocol_id.cmp(&b.protocol_id));
        report.failures.sort_by(|a, b| a.protocol_id.cmp(&b.protocol_id));

        log::info!(
            "📊 Scoring run complete: {} scored, {} failed",
            report.records.len(),
            report.failures.len()
        );
        report
    }
}

async fn prepare_protocol(
    source: Arc<dyn SourceAdapter>,
    settings: Arc<ProtocolSettings>,
) -> ScoringResult<PreparedProtocol> {
    // Fail on configuration before touching the source
    settings.validate()?;
    let raw = source.fetch(&settings.metadata.id).await?;
    PreparedProtocol::prepare(settings, raw)
}

/// Failure entry for a task that panicked or was cancelled before returning its protocol
fn task_failure(
    ids: &HashMap<tokio::task::Id, String>,
    phase: &str,
    error: JoinError,
) -> ProtocolFailure {
    let protocol_id = ids
        .get(&error.id())
        .cloned()
        .unwrap_or_else(|| format!("task-{}", error.id()));
    log::error!("❌ {}: {} task failed: {}", protocol_id, phase, error);
    ProtocolFailure {
        error: ScoringError::task_failed(&protocol_id, format!("{} task failed: {}", phase, error)),
        protocol_id,
    }
}

fn log_record(record: &ScoreRecord) {
    log::info!(
        "✅ {}: How3 {:.1} (EQS {:.1}, UGS {:.1}, FVS {:.1}, SS {:.1})",
        record.protocol_id,
        record.how3_score,
        record.eqs,
        record.ugs,
        record.fvs,
        record.ss
    );
    if !record.components.fallbacks.is_empty() {
        log::warn!(
            "⚠️  {}: {} defaults substituted ({})",
            record.protocol_id,
            record.components.fallbacks.len(),
            record
                .components
                .fallbacks
                .iter()
                .map(|f| f.field.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}
