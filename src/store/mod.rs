//! Report persistence
//!
//! Score records are immutable and keyed by `(protocol_id, calculated_at)`.
//! The newest record of a protocol supersedes older ones; history is kept.
//!
//! Backends:
//! - `SqliteReportStore`: `score_records` table, migrations from `sql/`
//! - `JsonReportStore`: one JSON file per record under `<root>/<protocol>/`

pub mod export;
pub mod json_store;
pub mod sqlite_store;

pub use json_store::JsonReportStore;
pub use sqlite_store::{run_schema_migrations, SqliteReportStore};

use crate::scoring::ScoreRecord;
use async_trait::async_trait;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    Database(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Keyed record store for score reports
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Persist one record; all-or-nothing
    async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError>;

    /// Most recent record of a protocol
    async fn latest(&self, protocol_id: &str) -> Result<Option<ScoreRecord>, StoreError>;

    /// Every record of a protocol, oldest first
    async fn history(&self, protocol_id: &str) -> Result<Vec<ScoreRecord>, StoreError>;

    /// Backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// Store backend selected by `HOW3_STORE_BACKEND`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Json,
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "json" => Ok(StoreBackend::Json),
            other => Err(format!("unknown store backend '{}' (expected sqlite or json)", other)),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Json => write!(f, "json"),
        }
    }
}
