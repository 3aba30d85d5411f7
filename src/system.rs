//! Host tooling: subprocess execution, output parsing, and tool provisioning.

pub mod dependencies;
pub mod executor;
pub mod parser;
