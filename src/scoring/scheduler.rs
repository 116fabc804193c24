//! Periodic scoring scheduler
//!
//! Scores are precomputed: every `interval_secs` the scheduler scores all
//! protocols against each other and saves each produced record. A protocol
//! that fails to score or to save is logged and skipped; the cycle continues.

use super::engine::ScoringEngine;
use crate::store::ReportStore;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};

/// Counts of one scheduler cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub scored: usize,
    pub failed: usize,
    pub saved: usize,
}

/// Score `protocol_ids` once and persist every record
pub async fn run_scoring_cycle(
    engine: &ScoringEngine,
    store: &dyn ReportStore,
    protocol_ids: &[String],
) -> CycleSummary {
    let report = engine.score_all(protocol_ids).await;
    let mut summary = CycleSummary {
        scored: report.records.len(),
        failed: report.failures.len(),
        saved: 0,
    };

    for record in &report.records {
        match store.save(record).await {
            Ok(()) => summary.saved += 1,
            Err(e) => log::error!(
                "❌ Failed to save score for {} to {}: {}",
                record.protocol_id,
                store.backend_type(),
                e
            ),
        }
    }

    log::info!(
        "📊 Cycle complete: {} scored, {} failed, {} saved ({})",
        summary.scored,
        summary.failed,
        summary.saved,
        store.backend_type()
    );
    summary
}

/// Scoring scheduler task - runs a cycle immediately, then every `interval_secs`
///
/// An empty `protocol_ids` means every configured protocol. Runs until cancelled.
pub async fn scoring_scheduler_task(
    engine: Arc<ScoringEngine>,
    store: Arc<dyn ReportStore>,
    protocol_ids: Vec<String>,
    interval_secs: u64,
) {
    let protocol_ids = if protocol_ids.is_empty() {
        engine.config().protocol_ids()
    } else {
        protocol_ids
    };

    log::info!(
        "⏰ Starting scoring scheduler ({} protocols, interval: {}s)",
        protocol_ids.len(),
        interval_secs
    );

    let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        timer.tick().await;
        run_scoring_cycle(&engine, store.as_ref(), &protocol_ids).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::protocol_config::ConfigStore;
    use crate::scoring::source::InMemorySource;
    use crate::scoring::types::{RawProtocolData, RevenueRow, UserMetricsRow};
    use crate::store::JsonReportStore;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn raw(amount: f64) -> RawProtocolData {
        let month = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        RawProtocolData {
            revenue: vec![RevenueRow {
                month,
                source: "fees".to_string(),
                amount_usd: amount,
            }],
            users: vec![UserMetricsRow {
                month,
                active_addresses: 5,
                transaction_count: 5,
                transaction_volume_usd: 5.0,
            }],
            market: None,
            security: None,
        }
    }

    #[tokio::test]
    async fn test_cycle_saves_successes_and_skips_failures() {
        let config = Arc::new(
            ConfigStore::from_json_str(r#"{ "version": 1, "protocols": { "a": {}, "b": {}, "c": {} } }"#)
                .unwrap(),
        );
        // "c" has no data upstream
        let source = InMemorySource::new().with("a", raw(10.0)).with("b", raw(20.0));
        let engine = ScoringEngine::new(config, Arc::new(source));

        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path()).unwrap();

        let ids = engine.config().protocol_ids();
        let summary = run_scoring_cycle(&engine, &store, &ids).await;

        assert_eq!(
            summary,
            CycleSummary {
                scored: 2,
                failed: 1,
                saved: 2
            }
        );
        assert!(store.latest("a").await.unwrap().is_some());
        assert!(store.latest("c").await.unwrap().is_none());
    }
}
