//! Side-effect capabilities invoked by the monitor on state transitions.

use async_trait::async_trait;
use thiserror::Error;

use super::signal::Signal;

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("failed to send notification: {0}")]
    NotificationFailed(String),
    #[error("failed to {verb} workload '{workload}': {reason}")]
    WorkloadFailed { verb: &'static str, workload: String, reason: String },
    #[error("remediation failed: {0}")]
    RemediationFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Delivers a titled message to the operator.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, title: &str, message: &str) -> Result<(), ActionError>;
}

/// Starts and stops dependent application workloads.
///
/// Both operations must be idempotent: stopping a stopped workload or
/// starting a running one is harmless.
#[async_trait]
pub trait WorkloadController: Send + Sync {
    async fn start(&self, workload: &str) -> Result<(), ActionError>;
    async fn stop(&self, workload: &str) -> Result<(), ActionError>;
}

/// What a monitor does when its alert condition starts, repeats, or ends.
///
/// Implementations log their own failures; nothing returned here changes
/// the monitor's state transitions.
#[async_trait]
pub trait ActionSet: Send + Sync {
    async fn on_alert(&self, subject: &str, signal: &Signal);

    /// Whether `on_recover` should be invoked when an episode ends.
    fn has_recovery(&self) -> bool {
        false
    }

    async fn on_recover(&self, _subject: &str, _signal: &Signal) {}

    /// Whether `on_alert` stops dependent workloads.
    fn suppresses_workloads(&self) -> bool {
        false
    }

    /// One remediation attempt while the condition holds.
    async fn remediate(&self) {}
}
