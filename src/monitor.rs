//! Generic threshold monitoring: signals, conditions, actions, and the polling engine.

pub mod actions;
pub mod engine;
pub mod signal;

pub use actions::{ActionSet, NotificationSink, WorkloadController};
pub use engine::{Debounce, MonitorGroup, MonitorSettings, SubjectDiscovery, ThresholdMonitor};
pub use signal::{Condition, SignalError};
