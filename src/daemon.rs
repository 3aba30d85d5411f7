//! Long-running monitor processes: shutdown handling, monitor wiring, health check.

pub mod runner;
pub mod shutdown;
pub mod status;
