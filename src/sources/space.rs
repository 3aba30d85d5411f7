//! Percent of a filesystem in use, from statvfs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::monitor::signal::{Signal, SignalError, SignalSource};
use crate::system::executor::{BoundedCall, Executor};

/// Raw capacity figures for one filesystem, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    /// Floating-point percent used; 94.6 stays 94.6.
    pub fn percent_used(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.used as f64 / self.total as f64 * 100.0)
    }
}

pub struct DiskUsageSource {
    path: String,
    call: BoundedCall,
    stat: fn(&Path) -> Result<DiskUsage, SignalError>,
}

impl DiskUsageSource {
    pub fn new(path: impl Into<String>, exec: &Executor) -> Self {
        Self {
            path: path.into(),
            call: exec.bounded_call("statvfs"),
            stat: disk_usage,
        }
    }

    #[cfg(test)]
    fn with_stat(mut self, stat: fn(&Path) -> Result<DiskUsage, SignalError>) -> Self {
        self.stat = stat;
        self
    }
}

#[async_trait]
impl SignalSource for DiskUsageSource {
    fn subject(&self) -> &str {
        &self.path
    }

    async fn read(&self) -> Result<Signal, SignalError> {
        let path = PathBuf::from(&self.path);
        let stat = self.stat;
        let usage = self.call.run(move || stat(&path)).await?;

        let percent = usage.percent_used().ok_or_else(|| {
            SignalError::Unparseable(format!("{} reports zero capacity", self.path))
        })?;
        debug!(
            "Disk usage - Total: {}, Used: {}, Free: {}, Percent Full: {:.2}%",
            usage.total, usage.used, usage.free, percent
        );
        Ok(Signal::Numeric(percent))
    }
}

#[cfg(target_os = "linux")]
pub fn disk_usage(path: &Path) -> Result<DiskUsage, SignalError> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| SignalError::Unparseable(format!("path contains NUL: {:?}", path)))?;

    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if rc != 0 {
        return Err(SignalError::Io(std::io::Error::last_os_error()));
    }

    let frsize = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * frsize;
    let free_all = stat.f_bfree as u64 * frsize;
    let free = stat.f_bavail as u64 * frsize;
    Ok(DiskUsage {
        total,
        used: total.saturating_sub(free_all),
        free,
    })
}

#[cfg(not(target_os = "linux"))]
pub fn disk_usage(path: &Path) -> Result<DiskUsage, SignalError> {
    Err(SignalError::ToolUnavailable {
        tool: "statvfs".to_string(),
        reason: format!("unsupported platform for {:?}", path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn percent_uses_floating_point_division() {
        let usage = DiskUsage { total: 1000, used: 946, free: 54 };
        let percent = usage.percent_used().unwrap();
        assert!((percent - 94.6).abs() < 1e-9);
    }

    #[test]
    fn zero_capacity_has_no_percent() {
        let usage = DiskUsage { total: 0, used: 0, free: 0 };
        assert_eq!(usage.percent_used(), None);
    }

    fn exec() -> Executor {
        Executor::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn root_filesystem_reports_a_percentage() {
        let source = DiskUsageSource::new("/", &exec());
        match source.read().await.unwrap() {
            Signal::Numeric(p) => assert!((0.0..=100.0).contains(&p)),
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_path_is_a_read_failure() {
        let source = DiskUsageSource::new("/definitely/not/here", &exec());
        assert!(source.read().await.is_err());
    }

    fn hung_statvfs(_: &Path) -> Result<DiskUsage, SignalError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(DiskUsage { total: 100, used: 99, free: 1 })
    }

    #[tokio::test]
    async fn hung_statvfs_is_a_timeout() {
        let source = DiskUsageSource::new("/", &Executor::new(Duration::from_millis(50)))
            .with_stat(hung_statvfs);
        assert!(matches!(source.read().await, Err(SignalError::Timeout { .. })));
    }

    #[tokio::test]
    async fn injected_usage_is_converted_to_percent() {
        fn half_full(_: &Path) -> Result<DiskUsage, SignalError> {
            Ok(DiskUsage { total: 200, used: 100, free: 100 })
        }
        let source = DiskUsageSource::new("/srv", &exec()).with_stat(half_full);
        assert_eq!(source.read().await.unwrap(), Signal::Numeric(50.0));
    }
}
