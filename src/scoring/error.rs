//! Error taxonomy for a scoring run
//!
//! - `Config`: invalid or missing configuration. Fatal, raised before any computation.
//! - `InsufficientData`: too few data points for one statistic. Calculators recover
//!   from it by substituting the configured default and recording a fallback.
//! - `UpstreamData`: the source adapter returned malformed or empty series. Fails
//!   the run of that protocol only.
//! - `TaskFailed`: the worker task of one protocol panicked or was cancelled.
//!   Recorded as that protocol's failure like any other error.

#[derive(Debug, Clone, PartialEq)]
pub enum ScoringError {
    Config {
        protocol: String,
        field: String,
        message: String,
    },
    InsufficientData {
        statistic: &'static str,
        message: String,
    },
    UpstreamData {
        protocol: String,
        message: String,
    },
    TaskFailed {
        protocol: String,
        message: String,
    },
}

impl ScoringError {
    pub fn config(protocol: &str, field: &str, message: impl Into<String>) -> Self {
        ScoringError::Config {
            protocol: protocol.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn insufficient(statistic: &'static str, message: impl Into<String>) -> Self {
        ScoringError::InsufficientData {
            statistic,
            message: message.into(),
        }
    }

    pub fn upstream(protocol: &str, message: impl Into<String>) -> Self {
        ScoringError::UpstreamData {
            protocol: protocol.to_string(),
            message: message.into(),
        }
    }

    pub fn task_failed(protocol: &str, message: impl Into<String>) -> Self {
        ScoringError::TaskFailed {
            protocol: protocol.to_string(),
            message: message.into(),
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, ScoringError::Config { .. })
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, ScoringError::UpstreamData { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScoringError::Config { .. } => "config",
            ScoringError::InsufficientData { .. } => "insufficient_data",
            ScoringError::UpstreamData { .. } => "upstream_data",
            ScoringError::TaskFailed { .. } => "task_failed",
        }
    }
}

impl std::fmt::Display for ScoringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoringError::Config {
                protocol,
                field,
                message,
            } => write!(
                f,
                "Config error [protocol={}, field={}]: {}",
                protocol, field, message
            ),
            ScoringError::InsufficientData { statistic, message } => {
                write!(f, "Insufficient data for {}: {}", statistic, message)
            }
            ScoringError::UpstreamData { protocol, message } => {
                write!(f, "Upstream data error [protocol={}]: {}", protocol, message)
            }
            ScoringError::TaskFailed { protocol, message } => {
                write!(f, "Scoring task failed [protocol={}]: {}", protocol, message)
            }
        }
    }
}

impl std::error::Error for ScoringError {}

pub type ScoringResult<T> = Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_carries_context() {
        let err = ScoringError::config("chainlink", "eqs.weights", "must sum to 1.0");
        let msg = err.to_string();
        assert!(msg.contains("chainlink"));
        assert!(msg.contains("eqs.weights"));
        assert!(err.is_config());
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_upstream_error_display() {
        let err = ScoringError::upstream("aave", "empty revenue series");
        assert!(err.is_upstream());
        assert_eq!(
            err.to_string(),
            "Upstream data error [protocol=aave]: empty revenue series"
        );
    }

    #[test]
    fn test_task_failure_display() {
        let err = ScoringError::task_failed("gmx", "scoring task failed: panicked");
        assert_eq!(err.kind(), "task_failed");
        assert!(!err.is_upstream());
        assert_eq!(
            err.to_string(),
            "Scoring task failed [protocol=gmx]: scoring task failed: panicked"
        );
    }
}
