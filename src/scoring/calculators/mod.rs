//! Sub-score calculators
//!
//! Each calculator is a stateless unit struct with a `calculate` function that
//! returns its components (score included). Recoverable data gaps are pushed
//! onto the caller's fallback list instead of failing the run.

pub mod eqs;
pub mod fvs;
pub mod safety;
pub mod ugs;

pub use eqs::{combine_eqs, EarningsQualityCalculator};
pub use fvs::{annualized_revenue, FairValueCalculator};
pub use safety::SafetyCalculator;
pub use ugs::{UserGrowth, UserGrowthCalculator, UserGrowthPeers};

/// Clamp a score to the [0, 100] range; non-finite values collapse to 0
pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
