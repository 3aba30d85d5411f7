//! Concrete notification sinks, workload controllers, and monitor action sets.

pub mod notifier;
pub mod standard;
pub mod workloads;

pub use notifier::build_notifier;
pub use standard::{MessageTemplate, MonitorActions};
pub use workloads::RuntipiWorkloads;
