//! SQLite report store
//!
//! Tables are created by the idempotent migrations in `sql/` (see
//! `sql/01_score_records.sql`). Each save runs in its own transaction.

use super::{ReportStore, StoreError};
use crate::scoring::{ScoreComponents, ScoreRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Run schema migrations from SQL files
///
/// Executes every `.sql` file of `schema_dir` in file-name order (`01_`, `02_`,
/// ...). Files must use `IF NOT EXISTS` so reruns are no-ops.
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: impl AsRef<Path>,
) -> Result<(), StoreError> {
    let schema_path = schema_dir.as_ref();
    if !schema_path.is_dir() {
        return Err(StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Schema directory not found: {}", schema_path.display()),
        )));
    }

    conn.pragma_update(None, "journal_mode", "WAL")?;
    log::debug!("📊 Enabled WAL mode for SQLite database");

    let mut sql_files: Vec<_> = fs::read_dir(schema_path)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    sql_files.sort();

    log::info!("🔧 Running schema migrations from: {}", schema_path.display());
    for path in sql_files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        log::info!("   ├─ Executing: {}", filename);
        conn.execute_batch(&fs::read_to_string(&path)?)?;
    }
    log::info!("✅ All schema migrations completed successfully");

    Ok(())
}

pub struct SqliteReportStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteReportStore {
    /// Open (or create) the database and apply migrations from `schema_dir`
    pub fn open(db_path: impl AsRef<Path>, schema_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut conn = Connection::open(db_path)?;
        run_schema_migrations(&mut conn, schema_dir)?;

        log::info!("✅ SQLite report store ready at {}", db_path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))
    }

    /// Latest record of every protocol, best How3 score first
    pub fn leaderboard(&self) -> Result<Vec<ScoreRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT protocol_id, calculated_at, eqs, ugs, fvs, ss, how3_score, components_json
             FROM score_records AS r
             WHERE calculated_at_ms = (
                 SELECT MAX(calculated_at_ms) FROM score_records WHERE protocol_id = r.protocol_id
             )
             ORDER BY how3_score DESC, protocol_id ASC",
        )?;
        let rows = stmt.query_map([], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(row?)?);
        }
        Ok(records)
    }
}

/// Raw column values of one `score_records` row
struct StoredRow {
    protocol_id: String,
    calculated_at: String,
    eqs: f64,
    ugs: f64,
    fvs: f64,
    ss: f64,
    how3_score: f64,
    components_json: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StoredRow> {
    Ok(StoredRow {
        protocol_id: row.get(0)?,
        calculated_at: row.get(1)?,
        eqs: row.get(2)?,
        ugs: row.get(3)?,
        fvs: row.get(4)?,
        ss: row.get(5)?,
        how3_score: row.get(6)?,
        components_json: row.get(7)?,
    })
}

fn decode(row: StoredRow) -> Result<ScoreRecord, StoreError> {
    let calculated_at = DateTime::parse_from_rfc3339(&row.calculated_at)
        .map_err(|e| {
            StoreError::Database(format!("bad calculated_at '{}': {}", row.calculated_at, e))
        })?
        .with_timezone(&Utc);
    let components: ScoreComponents = serde_json::from_str(&row.components_json)?;

    Ok(ScoreRecord {
        protocol_id: row.protocol_id,
        eqs: row.eqs,
        ugs: row.ugs,
        fvs: row.fvs,
        ss: row.ss,
        how3_score: row.how3_score,
        calculated_at,
        components,
    })
}

const SELECT_RECORD: &str = "SELECT protocol_id, calculated_at, eqs, ugs, fvs, ss, how3_score, components_json
     FROM score_records WHERE protocol_id = ?1";

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn save(&self, record: &ScoreRecord) -> Result<(), StoreError> {
        let components_json = serde_json::to_string(&record.components)?;
        let mut conn = self.lock()?;

        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO score_records
             (protocol_id, category, calculated_at, calculated_at_ms, eqs, ugs, fvs, ss,
              how3_score, fallback_count, components_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.protocol_id,
                record.components.category,
                record.calculated_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
                record.calculated_at.timestamp_millis(),
                record.eqs,
                record.ugs,
                record.fvs,
                record.ss,
                record.how3_score,
                record.components.fallbacks.len() as i64,
                components_json,
            ],
        )?;
        tx.commit()?;

        log::debug!(
            "✅ Score record written: {} @ {}",
            record.protocol_id,
            record.calculated_at
        );
        Ok(())
    }

    async fn latest(&self, protocol_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{} ORDER BY calculated_at_ms DESC LIMIT 1", SELECT_RECORD),
                params![protocol_id],
                read_row,
            )
            .optional()?;
        row.map(decode).transpose()
    }

    async fn history(&self, protocol_id: &str) -> Result<Vec<ScoreRecord>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY calculated_at_ms ASC", SELECT_RECORD))?;
        let rows = stmt.query_map(params![protocol_id], read_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(decode(row?)?);
        }
        Ok(records)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
