//! Safety Score from an external security assessment

use super::clamp_score;
use crate::scoring::protocol_config::SafetySettings;
use crate::scoring::types::{Fallback, SafetyComponents, SecurityAssessment};

pub struct SafetyCalculator;

impl SafetyCalculator {
    /// `base - critical * critical_penalty - high * high_penalty`, clamped
    ///
    /// The base is the assessment's `security_score`, else its audit coverage
    /// scaled to 100. Without an assessment the configured default is returned
    /// as-is.
    pub fn calculate(
        assessment: Option<&SecurityAssessment>,
        settings: &SafetySettings,
        fallbacks: &mut Vec<Fallback>,
    ) -> SafetyComponents {
        let base_score = assessment.and_then(|a| {
            a.security_score
                .or_else(|| a.audit_coverage.map(|coverage| coverage * 100.0))
                .filter(|base| base.is_finite())
        });

        let (Some(assessment), Some(base)) = (assessment, base_score) else {
            fallbacks.push(Fallback {
                field: "ss.base_score".to_string(),
                reason: "no security assessment available".to_string(),
                default_value: settings.default_score,
            });
            return SafetyComponents {
                score: settings.default_score,
                assessed: false,
                base_score: None,
                audit_coverage: assessment.and_then(|a| a.audit_coverage),
                audit_status: assessment.and_then(|a| a.audit_status.clone()),
                last_audit_date: assessment.and_then(|a| a.last_audit_date),
                total_vulnerabilities: assessment.map_or(0, |a| a.total_vulnerabilities),
                critical_vulnerabilities: assessment.map_or(0, |a| a.critical_vulnerabilities),
                high_vulnerabilities: assessment.map_or(0, |a| a.high_vulnerabilities),
                vulnerability_penalty: 0.0,
            };
        };

        let vulnerability_penalty = assessment.critical_vulnerabilities as f64
            * settings.critical_penalty
            + assessment.high_vulnerabilities as f64 * settings.high_penalty;

        SafetyComponents {
            score: clamp_score(base - vulnerability_penalty),
            assessed: true,
            base_score: Some(base),
            audit_coverage: assessment.audit_coverage,
            audit_status: assessment.audit_status.clone(),
            last_audit_date: assessment.last_audit_date,
            total_vulnerabilities: assessment.total_vulnerabilities,
            critical_vulnerabilities: assessment.critical_vulnerabilities,
            high_vulnerabilities: assessment.high_vulnerabilities,
            vulnerability_penalty,
        }
    }
}
