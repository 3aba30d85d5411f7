//! Configuration: per-kind JSON files, their defaults, and the sensor setup wizard.

pub mod persistence;
pub mod setup;
pub mod types;
