//! Runtime configuration from environment variables
//!
//! Covers process-level settings only (paths, backend, schedule). Scoring
//! parameters live in the protocol configuration artifact loaded by
//! `scoring::ConfigStore`.

use crate::store::StoreBackend;
use std::env;
use std::str::FromStr;

/// Daily update frequency
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Protocol configuration artifact (JSON)
    pub config_path: String,

    /// Root of the JSON source adapter (`<data_dir>/<protocol>/*.json`)
    pub data_dir: String,

    /// SQLite database file for score records
    pub db_path: String,

    /// Directory of `.sql` migration files
    pub schema_dir: String,

    /// Output directory for JSON/CSV reports and the JSON store
    pub report_dir: String,

    pub store_backend: StoreBackend,

    /// Seconds between scheduled scoring cycles
    pub update_interval_secs: u64,

    pub scheduler_enabled: bool,

    /// Protocols to score; empty means every configured protocol
    pub protocols: Vec<String>,
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `HOW3_CONFIG_PATH` (default: config/protocol_config.json)
    /// - `HOW3_DATA_DIR` (default: data)
    /// - `HOW3_DB_PATH` (default: how3.db)
    /// - `HOW3_SCHEMA_DIR` (default: sql)
    /// - `HOW3_REPORT_DIR` (default: scores)
    /// - `HOW3_STORE_BACKEND` (default: sqlite; or json)
    /// - `HOW3_UPDATE_INTERVAL_SECS` (default: 86400)
    /// - `HOW3_PROTOCOLS` (default: all configured, comma-separated)
    /// - `ENABLE_SCHEDULER` (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            config_path: string("HOW3_CONFIG_PATH", "config/protocol_config.json"),
            data_dir: string("HOW3_DATA_DIR", "data"),
            db_path: string("HOW3_DB_PATH", "how3.db"),
            schema_dir: string("HOW3_SCHEMA_DIR", "sql"),
            report_dir: string("HOW3_REPORT_DIR", "scores"),
            store_backend: parsed(&lookup, "HOW3_STORE_BACKEND", StoreBackend::Sqlite),
            update_interval_secs: parsed(
                &lookup,
                "HOW3_UPDATE_INTERVAL_SECS",
                DEFAULT_UPDATE_INTERVAL_SECS,
            ),
            scheduler_enabled: parsed(&lookup, "ENABLE_SCHEDULER", true),
            protocols: lookup("HOW3_PROTOCOLS")
                .map(|list| {
                    list.split(',')
                        .map(|id| id.trim().to_lowercase())
                        .filter(|id| !id.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️  Invalid {}={:?}, using default {:?}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = config_from(&[]);

        assert_eq!(config.config_path, "config/protocol_config.json");
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.db_path, "how3.db");
        assert_eq!(config.schema_dir, "sql");
        assert_eq!(config.report_dir, "scores");
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.update_interval_secs, 86_400);
        assert!(config.scheduler_enabled);
        assert!(config.protocols.is_empty());
    }

    #[test]
    fn test_custom_config() {
        let config = config_from(&[
            ("HOW3_DB_PATH", "/tmp/test.db"),
            ("HOW3_STORE_BACKEND", "json"),
            ("HOW3_UPDATE_INTERVAL_SECS", "3600"),
            ("ENABLE_SCHEDULER", "false"),
            ("HOW3_PROTOCOLS", "Chainlink, aave,,"),
        ]);

        assert_eq!(config.db_path, "/tmp/test.db");
        assert_eq!(config.store_backend, StoreBackend::Json);
        assert_eq!(config.update_interval_secs, 3_600);
        assert!(!config.scheduler_enabled);
        assert_eq!(config.protocols, vec!["chainlink", "aave"]);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("HOW3_STORE_BACKEND", "postgres"),
            ("HOW3_UPDATE_INTERVAL_SECS", "daily"),
        ]);

        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.update_interval_secs, DEFAULT_UPDATE_INTERVAL_SECS);
    }
}
