//! How3 Runtime - scheduled scoring service
//!
//! - Loads the protocol configuration artifact
//! - Opens the report store (SQLite with migrations, or JSON files)
//! - Scores every protocol against its peers on a fixed interval
//!
//! Usage:
//!   cargo run --release --bin how3_runtime
//!
//! Environment variables:
//!   HOW3_CONFIG_PATH - Protocol configuration (default: config/protocol_config.json)
//!   HOW3_DATA_DIR - Source data root (default: data)
//!   HOW3_STORE_BACKEND - sqlite | json (default: sqlite)
//!   HOW3_DB_PATH - SQLite database path (default: how3.db)
//!   HOW3_UPDATE_INTERVAL_SECS - Scoring interval (default: 86400)
//!   ENABLE_SCHEDULER - Master switch (default: true)

use dotenv::dotenv;
use how3::config::RuntimeConfig;
use how3::scoring::scheduler::scoring_scheduler_task;
use how3::scoring::{ConfigStore, JsonDirectorySource, ScoringEngine, SourceAdapter};
use how3::store::{JsonReportStore, ReportStore, SqliteReportStore, StoreBackend};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("🚀 How3 Runtime - scheduled protocol scoring");

    let config = RuntimeConfig::from_env();

    if !config.scheduler_enabled {
        info!("⚠️  Scheduler is DISABLED (set ENABLE_SCHEDULER=true to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    }

    info!("✅ Scheduler ENABLED");
    info!("   ├─ Protocol config: {}", config.config_path);
    info!("   ├─ Source data: {}", config.data_dir);
    info!("   ├─ Store backend: {}", config.store_backend);
    info!("   └─ Interval: {}s", config.update_interval_secs);

    let protocol_config = Arc::new(ConfigStore::load(&config.config_path)?);

    let store: Arc<dyn ReportStore> = match config.store_backend {
        StoreBackend::Sqlite => {
            info!("🔧 Initializing database at {}...", config.db_path);
            Arc::new(SqliteReportStore::open(&config.db_path, &config.schema_dir)?)
        }
        StoreBackend::Json => Arc::new(JsonReportStore::new(&config.report_dir)?),
    };

    let source: Arc<dyn SourceAdapter> = Arc::new(JsonDirectorySource::new(&config.data_dir));
    let engine = Arc::new(ScoringEngine::new(protocol_config, source));
    info!("✅ ScoringEngine created");

    let scheduler = tokio::spawn(scoring_scheduler_task(
        engine,
        store,
        config.protocols.clone(),
        config.update_interval_secs,
    ));
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    scheduler.abort();
    info!("✅ How3 runtime stopped");
    Ok(())
}
