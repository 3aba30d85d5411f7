//! Drive SMART health via `smartctl -H`, and whole-disk discovery via `lsblk`.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::monitor::signal::{HealthStatus, Signal, SignalError, SignalSource};
use crate::system::executor::{Executor, ToolCommand};
use crate::system::parser::{parse_lsblk_drives, parse_smart_health};

pub struct SmartHealthSource {
    device: String,
    smartctl: ToolCommand,
    exec: Executor,
}

impl SmartHealthSource {
    pub fn new(device: impl Into<String>, smartctl: ToolCommand, exec: Executor) -> Self {
        Self {
            device: device.into(),
            smartctl,
            exec,
        }
    }
}

#[async_trait]
impl SignalSource for SmartHealthSource {
    fn subject(&self) -> &str {
        &self.device
    }

    async fn read(&self) -> Result<Signal, SignalError> {
        let output = self.exec.run_tool(&self.smartctl, &["-H", &self.device]).await?;
        let status = parse_smart_health(&output.stdout);
        debug!("{}: smartctl exit {:?}, health {}", self.device, output.code, status);

        // smartctl reports a failing disk through its exit bits, so a FAILED
        // verdict is trusted regardless of the exit status.
        match status {
            HealthStatus::Failed => Ok(Signal::Health(status)),
            _ if !output.success() => Err(SignalError::CommandFailed {
                tool: self.smartctl.program.clone(),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            }),
            _ => Ok(Signal::Health(status)),
        }
    }
}

/// List whole disks with `lsblk -dn -o NAME`.
pub async fn discover_drives(exec: &Executor, lsblk: &ToolCommand) -> Vec<String> {
    match exec.run_tool_checked(lsblk, &["-dn", "-o", "NAME"]).await {
        Ok(stdout) => parse_lsblk_drives(&stdout),
        Err(e) => {
            warn!("Error getting drives: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exec() -> Executor {
        Executor::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn passing_drive_reads_passed() {
        let tool = ToolCommand::shell("echo 'test result: PASSED'");
        let source = SmartHealthSource::new("/dev/sda", tool, exec());
        assert_eq!(source.read().await.unwrap(), Signal::Health(HealthStatus::Passed));
        assert_eq!(source.subject(), "/dev/sda");
    }

    #[tokio::test]
    async fn device_is_passed_to_smartctl() {
        let tool =
            ToolCommand::shell("[ \"$1\" = -H ] && [ \"$2\" = /dev/nvme0n1 ] && echo PASSED");
        let source = SmartHealthSource::new("/dev/nvme0n1", tool, exec());
        assert_eq!(source.read().await.unwrap(), Signal::Health(HealthStatus::Passed));
    }

    #[tokio::test]
    async fn failing_drive_is_reported_despite_exit_bits() {
        let tool = ToolCommand::shell("echo 'test result: FAILED!'; exit 8");
        let source = SmartHealthSource::new("/dev/sdb", tool, exec());
        assert_eq!(source.read().await.unwrap(), Signal::Health(HealthStatus::Failed));
    }

    #[tokio::test]
    async fn tool_error_is_a_read_failure() {
        let tool = ToolCommand::shell("echo 'open failed' >&2; exit 2");
        let source = SmartHealthSource::new("/dev/sdz", tool, exec());
        assert!(matches!(source.read().await, Err(SignalError::CommandFailed { .. })));
    }

    #[tokio::test]
    async fn unrecognised_output_is_unknown() {
        let tool = ToolCommand::shell("echo 'SMART support is: Unavailable'");
        let source = SmartHealthSource::new("/dev/sdc", tool, exec());
        assert_eq!(source.read().await.unwrap(), Signal::Health(HealthStatus::Unknown));
    }

    #[tokio::test]
    async fn discovery_lists_whole_disks() {
        let lsblk = ToolCommand::shell("printf 'sda\\nsdb\\n'");
        assert_eq!(discover_drives(&exec(), &lsblk).await, ["/dev/sda", "/dev/sdb"]);
    }

    #[tokio::test]
    async fn discovery_failure_yields_no_drives() {
        let lsblk = ToolCommand::new("tipi-tricks-no-such-lsblk");
        assert!(discover_drives(&exec(), &lsblk).await.is_empty());
    }
}
