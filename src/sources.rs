//! SignalSource implementations for each monitored subsystem.

pub mod mounts;
pub mod sensors;
pub mod smart;
pub mod space;

pub use mounts::MountSource;
pub use sensors::SensorTemperatureSource;
pub use smart::{discover_drives, SmartHealthSource};
pub use space::DiskUsageSource;
