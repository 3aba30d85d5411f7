//! Signal values, alert conditions, and the SignalSource capability.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

/// SMART overall-health category reported by a drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Passed,
    Failed,
    Unknown,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Passed => write!(f, "PASSED"),
            HealthStatus::Failed => write!(f, "FAILED"),
            HealthStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// One observed measurement from a monitored subsystem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Health(HealthStatus),
    Numeric(f64),
    Mounted(bool),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Health(status) => write!(f, "{}", status),
            Signal::Numeric(value) => write!(f, "{:.2}", value),
            Signal::Mounted(true) => write!(f, "mounted"),
            Signal::Mounted(false) => write!(f, "not mounted"),
        }
    }
}

/// Result of checking a signal against a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// The alert condition holds.
    Alert,
    /// The alert condition does not hold.
    Clear,
    /// The signal cannot be classified (UNKNOWN category or a mismatched kind).
    Indeterminate,
    /// Between the resume level and the threshold: keep the current state.
    Hold,
}

/// Alert condition applied to every reading of a monitor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    /// Alert when a health category equals FAILED.
    EqualsFailure,
    /// Alert when a numeric reading is strictly above the threshold.
    GreaterThan(f64),
    /// Alert strictly above `threshold`; an ongoing alert clears only
    /// strictly below `resume_below`.
    Hysteresis { threshold: f64, resume_below: f64 },
    /// Alert when a boolean reading is false.
    IsFalse,
}

impl Condition {
    pub fn evaluate(&self, signal: &Signal) -> Evaluation {
        match (self, signal) {
            (Condition::EqualsFailure, Signal::Health(HealthStatus::Failed)) => Evaluation::Alert,
            (Condition::EqualsFailure, Signal::Health(HealthStatus::Passed)) => Evaluation::Clear,
            (Condition::EqualsFailure, Signal::Health(HealthStatus::Unknown)) => {
                Evaluation::Indeterminate
            }
            (Condition::GreaterThan(threshold), Signal::Numeric(value)) => {
                if value.is_nan() {
                    Evaluation::Indeterminate
                } else if value > threshold {
                    Evaluation::Alert
                } else {
                    Evaluation::Clear
                }
            }
            (Condition::Hysteresis { threshold, resume_below }, Signal::Numeric(value)) => {
                if value.is_nan() {
                    Evaluation::Indeterminate
                } else if value > threshold {
                    Evaluation::Alert
                } else if value < resume_below {
                    Evaluation::Clear
                } else {
                    Evaluation::Hold
                }
            }
            (Condition::IsFalse, Signal::Mounted(false)) => Evaluation::Alert,
            (Condition::IsFalse, Signal::Mounted(true)) => Evaluation::Clear,
            _ => Evaluation::Indeterminate,
        }
    }
}

#[derive(Error, Debug)]
pub enum SignalError {
    #[error("{tool} is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
    #[error("{tool} exited with status {code:?}: {stderr}")]
    CommandFailed { tool: String, code: Option<i32>, stderr: String },
    #[error("{tool} did not finish within {seconds}s")]
    Timeout { tool: String, seconds: u64 },
    #[error("could not parse output: {0}")]
    Unparseable(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces one typed reading on demand.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Name of the monitored entity (device, chip, mount point, path).
    fn subject(&self) -> &str;

    /// Take one reading.
    async fn read(&self) -> Result<Signal, SignalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greater_than_is_strict_at_the_boundary() {
        let condition = Condition::GreaterThan(95.0);
        let epsilon = 1e-9;

        assert_eq!(condition.evaluate(&Signal::Numeric(95.0)), Evaluation::Clear);
        assert_eq!(condition.evaluate(&Signal::Numeric(95.0 + epsilon)), Evaluation::Alert);
        assert_eq!(condition.evaluate(&Signal::Numeric(95.0 - epsilon)), Evaluation::Clear);
    }

    #[test]
    fn fractional_percent_is_not_truncated() {
        let condition = Condition::GreaterThan(94.0);
        assert_eq!(condition.evaluate(&Signal::Numeric(94.6)), Evaluation::Alert);
    }

    #[test]
    fn hysteresis_holds_between_resume_level_and_threshold() {
        let condition = Condition::Hysteresis {
            threshold: 95.0,
            resume_below: 15.0,
        };
        assert_eq!(condition.evaluate(&Signal::Numeric(95.5)), Evaluation::Alert);
        assert_eq!(condition.evaluate(&Signal::Numeric(95.0)), Evaluation::Hold);
        assert_eq!(condition.evaluate(&Signal::Numeric(15.0)), Evaluation::Hold);
        assert_eq!(condition.evaluate(&Signal::Numeric(14.9)), Evaluation::Clear);
    }

    #[test]
    fn health_categories_map_to_evaluations() {
        let condition = Condition::EqualsFailure;
        assert_eq!(condition.evaluate(&Signal::Health(HealthStatus::Failed)), Evaluation::Alert);
        assert_eq!(condition.evaluate(&Signal::Health(HealthStatus::Passed)), Evaluation::Clear);
        assert_eq!(
            condition.evaluate(&Signal::Health(HealthStatus::Unknown)),
            Evaluation::Indeterminate
        );
    }

    #[test]
    fn unmounted_share_alerts() {
        let condition = Condition::IsFalse;
        assert_eq!(condition.evaluate(&Signal::Mounted(false)), Evaluation::Alert);
        assert_eq!(condition.evaluate(&Signal::Mounted(true)), Evaluation::Clear);
    }

    #[test]
    fn mismatched_signal_kind_is_indeterminate() {
        assert_eq!(
            Condition::GreaterThan(1.0).evaluate(&Signal::Mounted(false)),
            Evaluation::Indeterminate
        );
        assert_eq!(
            Condition::IsFalse.evaluate(&Signal::Numeric(0.0)),
            Evaluation::Indeterminate
        );
        assert_eq!(
            Condition::GreaterThan(1.0).evaluate(&Signal::Numeric(f64::NAN)),
            Evaluation::Indeterminate
        );
    }
}
