//! Integration tests: scoring runs persisted through both report store backends
//!
//! Records come from real engine runs with an advancing clock, so each run
//! produces a distinct `(protocol_id, calculated_at)` key.

#[cfg(test)]
mod report_store_tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use how3::scoring::{
        ConfigStore, InMemorySource, RawProtocolData, RevenueRow, ScoreRecord, ScoringEngine,
        UserMetricsRow,
    };
    use how3::store::{JsonReportStore, ReportStore, SqliteReportStore, StoreError};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    const SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/sql");

    const CONFIG: &str = r#"{
        "version": 1,
        "protocols": {
            "aave": { "category": "Lending" },
            "compound": { "category": "Lending" }
        }
    }"#;

    fn raw(base: f64, users: u64) -> RawProtocolData {
        let month = |m: u32| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        RawProtocolData {
            revenue: (1..=3)
                .flat_map(|m| {
                    [("interest", base * m as f64), ("liquidation", base / 4.0)].map(
                        |(source, amount_usd)| RevenueRow {
                            month: month(m),
                            source: source.to_string(),
                            amount_usd,
                        },
                    )
                })
                .collect(),
            users: vec![
                UserMetricsRow {
                    month: month(2),
                    active_addresses: users,
                    transaction_count: users * 4,
                    transaction_volume_usd: users as f64 * 100.0,
                },
                UserMetricsRow {
                    month: month(3),
                    active_addresses: users + 50,
                    transaction_count: users * 5,
                    transaction_volume_usd: users as f64 * 90.0,
                },
            ],
            market: None,
            security: None,
        }
    }

    /// Engine whose clock advances one hour per scoring run
    fn engine() -> ScoringEngine {
        let config = Arc::new(ConfigStore::from_json_str(CONFIG).unwrap());
        let source = InMemorySource::new()
            .with("aave", raw(1_000_000.0, 1_000))
            .with("compound", raw(400_000.0, 600));
        let start = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        let runs = Arc::new(AtomicI64::new(0));
        ScoringEngine::new_with_clock(
            config,
            Arc::new(source),
            Box::new(move || start + Duration::hours(runs.fetch_add(1, Ordering::SeqCst))),
        )
    }

    async fn two_runs() -> (Vec<ScoreRecord>, Vec<ScoreRecord>) {
        let engine = engine();
        let ids = engine.config().protocol_ids();
        let first = engine.score_all(&ids).await.records;
        let second = engine.score_all(&ids).await.records;
        (first, second)
    }

    fn assert_same_record(stored: &ScoreRecord, expected: &ScoreRecord) {
        assert_eq!(stored.protocol_id, expected.protocol_id);
        assert_eq!(stored.calculated_at, expected.calculated_at);
        assert!((stored.how3_score - expected.how3_score).abs() < 1e-9);
        assert!((stored.eqs - expected.eqs).abs() < 1e-9);
        assert_eq!(stored.components.category, expected.components.category);
        assert_eq!(
            stored.components.fallbacks.len(),
            expected.components.fallbacks.len()
        );
    }

    async fn check_latest_and_history(store: &dyn ReportStore) {
        let (first, second) = two_runs().await;
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);

        for record in first.iter().chain(second.iter()) {
            store.save(record).await.unwrap();
        }

        for (older, newer) in first.iter().zip(second.iter()) {
            let latest = store.latest(&older.protocol_id).await.unwrap().unwrap();
            assert_same_record(&latest, newer);

            let history = store.history(&older.protocol_id).await.unwrap();
            assert_eq!(history.len(), 2);
            assert_same_record(&history[0], older);
            assert_same_record(&history[1], newer);
        }

        assert!(store.latest("maple").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_keeps_history() {
        let dir = tempdir().unwrap();
        let store = SqliteReportStore::open(dir.path().join("db").join("how3.db"), SCHEMA_DIR).unwrap();
        check_latest_and_history(&store).await;
        assert_eq!(store.backend_type(), "SQLite");
    }

    #[tokio::test]
    async fn test_json_store_keeps_history() {
        let dir = tempdir().unwrap();
        let store = JsonReportStore::new(dir.path().join("reports")).unwrap();
        check_latest_and_history(&store).await;
    }

    #[tokio::test]
    async fn test_records_are_never_overwritten() {
        let (first, _) = two_runs().await;
        let record = &first[0];

        let dir = tempdir().unwrap();
        let sqlite = SqliteReportStore::open(dir.path().join("how3.db"), SCHEMA_DIR).unwrap();
        let json = JsonReportStore::new(dir.path().join("reports")).unwrap();

        for store in [&sqlite as &dyn ReportStore, &json as &dyn ReportStore] {
            store.save(record).await.unwrap();
            let err = store.save(record).await.unwrap_err();
            assert!(matches!(err, StoreError::Database(_) | StoreError::Io(_)));
            assert_eq!(store.history(&record.protocol_id).await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_leaderboard_orders_latest_scores() {
        let (first, second) = two_runs().await;
        let dir = tempdir().unwrap();
        let store = SqliteReportStore::open(dir.path().join("how3.db"), SCHEMA_DIR).unwrap();
        for record in first.iter().chain(second.iter()) {
            store.save(record).await.unwrap();
        }

        let board = store.leaderboard().unwrap();
        assert_eq!(board.len(), 2);
        assert!(board[0].how3_score >= board[1].how3_score);
        for entry in &board {
            assert_eq!(entry.calculated_at, second[0].calculated_at);
        }
    }
}
