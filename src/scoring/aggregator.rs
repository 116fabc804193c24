//! Composite How3 score and report record assembly

use super::calculators::clamp_score;
use super::error::ScoringResult;
use super::protocol_config::check_weights;
use super::types::{
    CompositeWeights, EqsComponents, Fallback, FvsComponents, SafetyComponents, ScoreComponents,
    ScoreRecord, UgsComponents,
};
use chrono::{DateTime, Utc};

/// Sub-score components of one protocol, ready to be combined
#[derive(Debug, Clone)]
pub struct SubScores {
    pub eqs: EqsComponents,
    pub ugs: UgsComponents,
    pub fvs: FvsComponents,
    pub ss: SafetyComponents,
}

pub struct CompositeAggregator;

impl CompositeAggregator {
    /// Weighted mean of the four sub-scores
    ///
    /// Weights that do not sum to 1.0 fail the run; they are never renormalized.
    pub fn how3_score(
        protocol_id: &str,
        weights: &CompositeWeights,
        eqs: f64,
        ugs: f64,
        fvs: f64,
        ss: f64,
    ) -> ScoringResult<f64> {
        check_weights(
            protocol_id,
            "composite",
            &[weights.eqs, weights.ugs, weights.fvs, weights.ss],
        )?;
        Ok(clamp_score(
            weights.eqs * eqs + weights.ugs * ugs + weights.fvs * fvs + weights.ss * ss,
        ))
    }

    pub fn build_record(
        protocol_id: &str,
        category: &str,
        scores: SubScores,
        weights: CompositeWeights,
        fallbacks: Vec<Fallback>,
        calculated_at: DateTime<Utc>,
    ) -> ScoringResult<ScoreRecord> {
        let eqs = clamp_score(scores.eqs.score);
        let ugs = clamp_score(scores.ugs.score);
        let fvs = clamp_score(scores.fvs.score);
        let ss = clamp_score(scores.ss.score);
        let how3_score = Self::how3_score(protocol_id, &weights, eqs, ugs, fvs, ss)?;

        Ok(ScoreRecord {
            protocol_id: protocol_id.to_string(),
            eqs,
            ugs,
            fvs,
            ss,
            how3_score,
            calculated_at,
            components: ScoreComponents {
                category: category.to_string(),
                eqs: scores.eqs,
                ugs: scores.ugs,
                fvs: scores.fvs,
                ss: scores.ss,
                composite_weights: weights,
                fallbacks,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::error::ScoringError;

    #[test]
    fn test_equal_weights_average() {
        let score =
            CompositeAggregator::how3_score("p", &CompositeWeights::default(), 80.0, 60.0, 40.0, 20.0)
                .unwrap();
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_weights() {
        let weights = CompositeWeights {
            eqs: 0.4,
            ugs: 0.2,
            fvs: 0.2,
            ss: 0.2,
        };
        let score = CompositeAggregator::how3_score("p", &weights, 100.0, 0.0, 50.0, 50.0).unwrap();
        assert!((score - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights_summing_above_one_are_rejected() {
        let weights = CompositeWeights {
            eqs: 0.3,
            ugs: 0.3,
            fvs: 0.3,
            ss: 0.3,
        };
        let err = CompositeAggregator::how3_score("aave", &weights, 50.0, 50.0, 50.0, 50.0)
            .unwrap_err();
        match err {
            ScoringError::Config { protocol, field, .. } => {
                assert_eq!(protocol, "aave");
                assert_eq!(field, "composite");
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }
}
