//! Protocol configuration store
//!
//! Loads the versioned JSON configuration artifact, resolves every protocol's
//! adjustment blocks against `default_settings` (then built-in defaults) and
//! validates the result eagerly. A configuration that loads is safe to share
//! read-only across every worker of a scoring run.
//!
//! ```json
//! {
//!   "version": 1,
//!   "default_settings": { "eqs": { "weights": { "stability": 0.7, "diversification": 0.3 } } },
//!   "categories": { "Oracle": { "avg_revenue_multiple": 40 } },
//!   "protocols": {
//!     "chainlink": {
//!       "name": "Chainlink",
//!       "category": "Oracle",
//!       "adjustments": { "eqs": { "revenue_mapping": [{ "from": "ocr", "to": "fm" }] } }
//!     }
//!   }
//! }
//! ```

use super::error::{ScoringError, ScoringResult};
use super::types::CompositeWeights;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const WEIGHT_EPSILON: f64 = 1e-6;

const DEFAULT_STABILITY_WEIGHT: f64 = 0.7;
const DEFAULT_DIVERSIFICATION_WEIGHT: f64 = 0.3;
const DEFAULT_REFERENCE_REVENUE: f64 = 5_000_000.0;
const DEFAULT_TARGET_STDEV: f64 = 1.0;
const DEFAULT_STABILITY_SCORE: f64 = 50.0;
const DEFAULT_DIVERSIFICATION_SCORE: f64 = 0.0;
const DEFAULT_UGS_COMPONENT_SCORE: f64 = 50.0;
const DEFAULT_PS_RATIO_THRESHOLD: f64 = 10.0;
const DEFAULT_BENCHMARK_PS_RATIO: f64 = 30.0;
const DEFAULT_FVS_SCORE: f64 = 50.0;
const DEFAULT_SAFETY_SCORE: f64 = 50.0;
const DEFAULT_CRITICAL_PENALTY: f64 = 15.0;
const DEFAULT_HIGH_PENALTY: f64 = 5.0;

/// Move all revenue of `from` into `to`, zeroing `from`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reattribution {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EqsWeights {
    pub stability: f64,
    pub diversification: f64,
}

impl Default for EqsWeights {
    fn default() -> Self {
        Self {
            stability: DEFAULT_STABILITY_WEIGHT,
            diversification: DEFAULT_DIVERSIFICATION_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UgsWeights {
    pub active_addresses: f64,
    pub transaction_count: f64,
    pub transaction_volume: f64,
}

impl Default for UgsWeights {
    fn default() -> Self {
        Self {
            active_addresses: 0.4,
            transaction_count: 0.3,
            transaction_volume: 0.3,
        }
    }
}

// Raw adjustment blocks as written in the artifact. Every field is optional;
// resolution fills gaps from `default_settings`, then from built-in constants.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EqsAdjustments {
    pub revenue_mapping: Option<Vec<Reattribution>>,
    pub weights: Option<EqsWeights>,
    pub reference_revenue: Option<f64>,
    pub target_stdev: Option<f64>,
    pub default_stability_score: Option<f64>,
    pub default_diversification_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UgsAdjustments {
    pub weights: Option<UgsWeights>,
    pub default_component_score: Option<f64>,
    pub transaction_volume_divisor: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FvsAdjustments {
    pub ps_ratio_threshold: Option<f64>,
    pub benchmark_ps_ratio: Option<f64>,
    pub default_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SafetyAdjustments {
    pub default_score: Option<f64>,
    pub critical_penalty: Option<f64>,
    pub high_penalty: Option<f64>,
}

/// Per-score-type adjustment blocks; `default_settings` has the same shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdjustmentBlocks {
    pub eqs: EqsAdjustments,
    pub ugs: UgsAdjustments,
    pub fvs: FvsAdjustments,
    pub ss: SafetyAdjustments,
    pub composite: Option<CompositeWeights>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategorySettings {
    pub avg_revenue_multiple: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolEntry {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub adjustments: AdjustmentBlocks,
}

/// The configuration artifact as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDocument {
    pub version: u32,
    #[serde(default)]
    pub default_settings: AdjustmentBlocks,
    #[serde(default)]
    pub categories: HashMap<String, CategorySettings>,
    #[serde(default)]
    pub protocols: BTreeMap<String, ProtocolEntry>,
}

// Resolved, validated settings consumed by the engine.

#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolMetadata {
    pub id: String,
    pub name: String,
    pub symbol: Option<String>,
    pub category: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EqsSettings {
    pub revenue_mapping: Vec<Reattribution>,
    pub weights: EqsWeights,
    /// Protocol-level reference baseline; overrides peer and global references
    pub reference_override: Option<f64>,
    pub default_reference_revenue: f64,
    pub target_stdev: f64,
    pub default_stability_score: f64,
    pub default_diversification_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UgsSettings {
    pub weights: UgsWeights,
    pub default_component_score: f64,
    pub transaction_volume_divisor: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FvsSettings {
    pub ps_ratio_threshold: f64,
    pub default_benchmark_ps_ratio: f64,
    /// `avg_revenue_multiple` of the protocol's category, if configured
    pub category_benchmark_ps_ratio: Option<f64>,
    pub default_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetySettings {
    pub default_score: f64,
    pub critical_penalty: f64,
    pub high_penalty: f64,
}

/// Fully resolved settings for one protocol
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolSettings {
    pub metadata: ProtocolMetadata,
    pub eqs: EqsSettings,
    pub ugs: UgsSettings,
    pub fvs: FvsSettings,
    pub ss: SafetySettings,
    pub composite: CompositeWeights,
}

impl ProtocolSettings {
    /// Built-in defaults for a protocol with no configuration at all
    pub fn builtin(protocol_id: &str) -> Self {
        resolve(
            protocol_id,
            &ProtocolEntry::default(),
            &AdjustmentBlocks::default(),
            &HashMap::new(),
        )
    }

    /// Validate every weight group, score default and positive parameter
    pub fn validate(&self) -> ScoringResult<()> {
        let id = self.metadata.id.as_str();

        check_weights(
            id,
            "composite",
            &[
                self.composite.eqs,
                self.composite.ugs,
                self.composite.fvs,
                self.composite.ss,
            ],
        )?;
        check_weights(
            id,
            "eqs.weights",
            &[self.eqs.weights.stability, self.eqs.weights.diversification],
        )?;
        check_weights(
            id,
            "ugs.weights",
            &[
                self.ugs.weights.active_addresses,
                self.ugs.weights.transaction_count,
                self.ugs.weights.transaction_volume,
            ],
        )?;

        for (index, rule) in self.eqs.revenue_mapping.iter().enumerate() {
            let field = format!("eqs.revenue_mapping[{}]", index);
            if rule.from.trim().is_empty() || rule.to.trim().is_empty() {
                return Err(ScoringError::config(id, &field, "source names must not be empty"));
            }
            if rule.from == rule.to {
                return Err(ScoringError::config(
                    id,
                    &field,
                    format!("source '{}' is mapped onto itself", rule.from),
                ));
            }
        }

        if let Some(reference) = self.eqs.reference_override {
            check_positive(id, "eqs.reference_revenue", reference)?;
        }
        check_positive(id, "default_settings.eqs.reference_revenue", self.eqs.default_reference_revenue)?;
        check_positive(id, "eqs.target_stdev", self.eqs.target_stdev)?;
        check_score(id, "eqs.default_stability_score", self.eqs.default_stability_score)?;
        check_score(
            id,
            "eqs.default_diversification_score",
            self.eqs.default_diversification_score,
        )?;

        check_score(id, "ugs.default_component_score", self.ugs.default_component_score)?;
        check_positive(id, "ugs.transaction_volume_divisor", self.ugs.transaction_volume_divisor)?;

        check_positive(id, "fvs.ps_ratio_threshold", self.fvs.ps_ratio_threshold)?;
        check_positive(id, "fvs.benchmark_ps_ratio", self.fvs.default_benchmark_ps_ratio)?;
        if let Some(multiple) = self.fvs.category_benchmark_ps_ratio {
            check_positive(id, "categories.avg_revenue_multiple", multiple)?;
        }
        check_score(id, "fvs.default_score", self.fvs.default_score)?;

        check_score(id, "ss.default_score", self.ss.default_score)?;
        check_non_negative(id, "ss.critical_penalty", self.ss.critical_penalty)?;
        check_non_negative(id, "ss.high_penalty", self.ss.high_penalty)?;

        Ok(())
    }
}

pub(crate) fn check_weights(protocol: &str, field: &str, weights: &[f64]) -> ScoringResult<()> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ScoringError::config(
            protocol,
            field,
            format!("weights must be non-negative numbers, got {:?}", weights),
        ));
    }
    let total: f64 = weights.iter().sum();
    if (total - 1.0).abs() > WEIGHT_EPSILON {
        return Err(ScoringError::config(
            protocol,
            field,
            format!("weights must sum to 1.0, got {}", total),
        ));
    }
    Ok(())
}

fn check_score(protocol: &str, field: &str, value: f64) -> ScoringResult<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ScoringError::config(
            protocol,
            field,
            format!("score must be within [0, 100], got {}", value),
        ));
    }
    Ok(())
}

fn check_positive(protocol: &str, field: &str, value: f64) -> ScoringResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ScoringError::config(
            protocol,
            field,
            format!("value must be a positive number, got {}", value),
        ));
    }
    Ok(())
}

fn check_non_negative(protocol: &str, field: &str, value: f64) -> ScoringResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ScoringError::config(
            protocol,
            field,
            format!("value must be a non-negative number, got {}", value),
        ));
    }
    Ok(())
}

/// Resolve one protocol entry against the default block and category table
fn resolve(
    protocol_id: &str,
    entry: &ProtocolEntry,
    defaults: &AdjustmentBlocks,
    categories: &HashMap<String, CategorySettings>,
) -> ProtocolSettings {
    let own = &entry.adjustments;
    let category = entry
        .category
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());

    let metadata = ProtocolMetadata {
        id: protocol_id.to_string(),
        name: entry.name.clone().unwrap_or_else(|| protocol_id.to_string()),
        symbol: entry.symbol.clone(),
        category: category.clone(),
        description: entry.description.clone(),
    };

    let eqs = EqsSettings {
        revenue_mapping: own
            .eqs
            .revenue_mapping
            .clone()
            .or_else(|| defaults.eqs.revenue_mapping.clone())
            .unwrap_or_default(),
        weights: own.eqs.weights.or(defaults.eqs.weights).unwrap_or_default(),
        reference_override: own.eqs.reference_revenue,
        default_reference_revenue: defaults
            .eqs
            .reference_revenue
            .unwrap_or(DEFAULT_REFERENCE_REVENUE),
        target_stdev: own
            .eqs
            .target_stdev
            .or(defaults.eqs.target_stdev)
            .unwrap_or(DEFAULT_TARGET_STDEV),
        default_stability_score: own
            .eqs
            .default_stability_score
            .or(defaults.eqs.default_stability_score)
            .unwrap_or(DEFAULT_STABILITY_SCORE),
        default_diversification_score: own
            .eqs
            .default_diversification_score
            .or(defaults.eqs.default_diversification_score)
            .unwrap_or(DEFAULT_DIVERSIFICATION_SCORE),
    };

    let ugs = UgsSettings {
        weights: own.ugs.weights.or(defaults.ugs.weights).unwrap_or_default(),
        default_component_score: own
            .ugs
            .default_component_score
            .or(defaults.ugs.default_component_score)
            .unwrap_or(DEFAULT_UGS_COMPONENT_SCORE),
        transaction_volume_divisor: own
            .ugs
            .transaction_volume_divisor
            .or(defaults.ugs.transaction_volume_divisor)
            .unwrap_or(1.0),
    };

    let fvs = FvsSettings {
        ps_ratio_threshold: own
            .fvs
            .ps_ratio_threshold
            .or(defaults.fvs.ps_ratio_threshold)
            .unwrap_or(DEFAULT_PS_RATIO_THRESHOLD),
        default_benchmark_ps_ratio: own
            .fvs
            .benchmark_ps_ratio
            .or(defaults.fvs.benchmark_ps_ratio)
            .unwrap_or(DEFAULT_BENCHMARK_PS_RATIO),
        category_benchmark_ps_ratio: categories
            .get(&category)
            .and_then(|c| c.avg_revenue_multiple),
        default_score: own
            .fvs
            .default_score
            .or(defaults.fvs.default_score)
            .unwrap_or(DEFAULT_FVS_SCORE),
    };

    let ss = SafetySettings {
        default_score: own
            .ss
            .default_score
            .or(defaults.ss.default_score)
            .unwrap_or(DEFAULT_SAFETY_SCORE),
        critical_penalty: own
            .ss
            .critical_penalty
            .or(defaults.ss.critical_penalty)
            .unwrap_or(DEFAULT_CRITICAL_PENALTY),
        high_penalty: own
            .ss
            .high_penalty
            .or(defaults.ss.high_penalty)
            .unwrap_or(DEFAULT_HIGH_PENALTY),
    };

    ProtocolSettings {
        metadata,
        eqs,
        ugs,
        fvs,
        ss,
        composite: own.composite.or(defaults.composite).unwrap_or_default(),
    }
}

/// Loaded, validated, immutable protocol configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    version: u32,
    default_settings: AdjustmentBlocks,
    categories: HashMap<String, CategorySettings>,
    protocols: BTreeMap<String, Arc<ProtocolSettings>>,
}

impl ConfigStore {
    /// Load and validate the configuration artifact from disk
    pub fn load(path: impl AsRef<Path>) -> ScoringResult<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ScoringError::config("*", &path.display().to_string(), format!("cannot read: {}", e))
        })?;
        let store = Self::from_json_str(&json)?;
        log::info!(
            "📋 Loaded protocol configuration v{} with {} protocols from {}",
            store.version,
            store.protocols.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn from_json_str(json: &str) -> ScoringResult<Self> {
        let document: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| ScoringError::config("*", "document", format!("invalid JSON: {}", e)))?;
        Self::from_document(document)
    }

    /// Resolve and validate every protocol; fails fast on the first invalid block
    pub fn from_document(document: ConfigDocument) -> ScoringResult<Self> {
        if document.version != SUPPORTED_CONFIG_VERSION {
            return Err(ScoringError::config(
                "*",
                "version",
                format!(
                    "unsupported configuration version {} (expected {})",
                    document.version, SUPPORTED_CONFIG_VERSION
                ),
            ));
        }

        // The default block must be valid on its own: unknown protocols resolve to it.
        resolve(
            "default_settings",
            &ProtocolEntry::default(),
            &document.default_settings,
            &document.categories,
        )
        .validate()?;

        let mut protocols = BTreeMap::new();
        for (id, entry) in &document.protocols {
            let settings = resolve(id, entry, &document.default_settings, &document.categories);
            settings.validate()?;
            protocols.insert(id.clone(), Arc::new(settings));
        }

        Ok(Self {
            version: document.version,
            default_settings: document.default_settings,
            categories: document.categories,
            protocols,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn contains(&self, protocol_id: &str) -> bool {
        self.protocols.contains_key(protocol_id)
    }

    /// Configured protocol identifiers in sorted order
    pub fn protocol_ids(&self) -> Vec<String> {
        self.protocols.keys().cloned().collect()
    }

    /// Settings for a protocol; unknown protocols fall back to `default_settings`
    pub fn settings_for(&self, protocol_id: &str) -> Arc<ProtocolSettings> {
        match self.protocols.get(protocol_id) {
            Some(settings) => Arc::clone(settings),
            None => {
                log::debug!(
                    "No configuration entry for {}, using default_settings",
                    protocol_id
                );
                Arc::new(resolve(
                    protocol_id,
                    &ProtocolEntry::default(),
                    &self.default_settings,
                    &self.categories,
                ))
            }
        }
    }
}
