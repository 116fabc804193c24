//! Source adapters: the boundary to the upstream analytics warehouse
//!
//! Adapters return already-aggregated monthly rows in a fixed schema. All
//! retrieval happens here, before any computation starts.

use super::error::{ScoringError, ScoringResult};
use super::types::{MarketSnapshot, RawProtocolData, RevenueRow, SecurityAssessment, UserMetricsRow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Provider of raw per-protocol series
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch revenue, user metrics, market and security inputs for one protocol
    async fn fetch(&self, protocol_id: &str) -> ScoringResult<RawProtocolData>;

    /// Adapter type for logging
    fn source_type(&self) -> &'static str;
}

/// Reads `<root>/<protocol>/{revenue,users,market,security}.json`
///
/// `revenue.json` and `users.json` are required. `market.json` and
/// `security.json` are optional; a missing file means no data.
pub struct JsonDirectorySource {
    root: PathBuf,
}

impl JsonDirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_optional<T: DeserializeOwned>(
        &self,
        protocol_id: &str,
        file: &str,
    ) -> ScoringResult<Option<T>> {
        let path = self.root.join(protocol_id).join(file);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ScoringError::upstream(
                    protocol_id,
                    format!("cannot read {}: {}", path.display(), e),
                ))
            }
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            ScoringError::upstream(
                protocol_id,
                format!("malformed {}: {}", path.display(), e),
            )
        })
    }

    async fn read_required<T: DeserializeOwned>(
        &self,
        protocol_id: &str,
        file: &str,
    ) -> ScoringResult<T> {
        self.read_optional(protocol_id, file).await?.ok_or_else(|| {
            ScoringError::upstream(
                protocol_id,
                format!("missing {} under {}", file, self.root.join(protocol_id).display()),
            )
        })
    }
}

#[async_trait]
impl SourceAdapter for JsonDirectorySource {
    async fn fetch(&self, protocol_id: &str) -> ScoringResult<RawProtocolData> {
        let revenue: Vec<RevenueRow> = self.read_required(protocol_id, "revenue.json").await?;
        let users: Vec<UserMetricsRow> = self.read_required(protocol_id, "users.json").await?;
        let market: Option<MarketSnapshot> = self.read_optional(protocol_id, "market.json").await?;
        let security: Option<SecurityAssessment> =
            self.read_optional(protocol_id, "security.json").await?;

        log::debug!(
            "📥 {}: {} revenue rows, {} user rows, market={}, security={}",
            protocol_id,
            revenue.len(),
            users.len(),
            market.is_some(),
            security.is_some()
        );

        Ok(RawProtocolData {
            revenue,
            users,
            market,
            security,
        })
    }

    fn source_type(&self) -> &'static str {
        "JSON directory"
    }
}

/// Fixed in-memory data, keyed by protocol id
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    protocols: HashMap<String, RawProtocolData>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, protocol_id: &str, data: RawProtocolData) {
        self.protocols.insert(protocol_id.to_string(), data);
    }

    pub fn with(mut self, protocol_id: &str, data: RawProtocolData) -> Self {
        self.insert(protocol_id, data);
        self
    }
}

#[async_trait]
impl SourceAdapter for InMemorySource {
    async fn fetch(&self, protocol_id: &str) -> ScoringResult<RawProtocolData> {
        self.protocols
            .get(protocol_id)
            .cloned()
            .ok_or_else(|| ScoringError::upstream(protocol_id, "no data for protocol"))
    }

    fn source_type(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reads_required_and_optional_files() {
        let dir = tempdir().unwrap();
        let protocol_dir = dir.path().join("aave");
        std::fs::create_dir_all(&protocol_dir).unwrap();
        std::fs::write(
            protocol_dir.join("revenue.json"),
            r#"[{ "month": "2024-01-01", "source": "interest", "amount_usd": 1200.5 }]"#,
        )
        .unwrap();
        std::fs::write(
            protocol_dir.join("users.json"),
            r#"[{ "month": "2024-01-01", "active_addresses": 10, "transaction_count": 20, "transaction_volume_usd": 30.0 }]"#,
        )
        .unwrap();

        let source = JsonDirectorySource::new(dir.path());
        let data = source.fetch("aave").await.unwrap();

        assert_eq!(data.revenue.len(), 1);
        assert_eq!(data.revenue[0].source, "interest");
        assert_eq!(data.users[0].transaction_count, 20);
        assert!(data.market.is_none());
        assert!(data.security.is_none());
    }

    #[tokio::test]
    async fn test_missing_revenue_is_upstream_error() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ghost")).unwrap();

        let err = JsonDirectorySource::new(dir.path())
            .fetch("ghost")
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("revenue.json"));
    }

    #[tokio::test]
    async fn test_malformed_market_is_upstream_error() {
        let dir = tempdir().unwrap();
        let protocol_dir = dir.path().join("gmx");
        std::fs::create_dir_all(&protocol_dir).unwrap();
        std::fs::write(protocol_dir.join("revenue.json"), "[]").unwrap();
        std::fs::write(protocol_dir.join("users.json"), "[]").unwrap();
        std::fs::write(protocol_dir.join("market.json"), "{ \"cap\": 1 }").unwrap();

        let err = JsonDirectorySource::new(dir.path()).fetch("gmx").await.unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[tokio::test]
    async fn test_in_memory_unknown_protocol() {
        let source = InMemorySource::new();
        assert!(source.fetch("nope").await.unwrap_err().is_upstream());
    }
}
