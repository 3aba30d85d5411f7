//! Startup check for required external tools, with optional apt provisioning.

use thiserror::Error;
use tracing::{info, warn};

use super::executor::Executor;
use crate::monitor::signal::SignalError;

#[derive(Error, Debug)]
pub enum DependencyError {
    #[error("{tool} is not installed (package: {package}). Install it with: sudo apt-get install -y {package}")]
    Missing { tool: String, package: String },
    #[error("{tool} is not installed and installing {package} failed: {reason}")]
    ProvisioningFailed { tool: String, package: String, reason: String },
}

/// An external tool a monitor cannot run without.
#[derive(Debug, Clone, Copy)]
pub struct RequiredTool {
    pub program: &'static str,
    pub check_args: &'static [&'static str],
    pub package: &'static str,
}

pub const SMARTCTL: RequiredTool = RequiredTool {
    program: "smartctl",
    check_args: &["--version"],
    package: "smartmontools",
};

pub const SENSORS: RequiredTool = RequiredTool {
    program: "sensors",
    check_args: &["-v"],
    package: "lm-sensors",
};

pub const TAR: RequiredTool = RequiredTool {
    program: "tar",
    check_args: &["--version"],
    package: "tar",
};

/// Check for `tool`; optionally install it when it is absent.
pub async fn ensure_tool(
    exec: &Executor,
    tool: &RequiredTool,
    auto_install: bool,
) -> Result<(), DependencyError> {
    if is_available(exec, tool).await {
        return Ok(());
    }

    if !auto_install {
        return Err(DependencyError::Missing {
            tool: tool.program.to_string(),
            package: tool.package.to_string(),
        });
    }

    warn!("{} is not installed. Attempting to install {}...", tool.program, tool.package);
    let provisioned = async {
        exec.run_checked("apt-get", &["update"]).await?;
        exec.run_checked("apt-get", &["install", "-y", tool.package]).await?;
        Ok::<(), SignalError>(())
    }
    .await;

    match provisioned {
        Ok(()) if is_available(exec, tool).await => {
            info!("{} installed successfully", tool.package);
            Ok(())
        }
        Ok(()) => Err(DependencyError::ProvisioningFailed {
            tool: tool.program.to_string(),
            package: tool.package.to_string(),
            reason: "tool still unavailable after install".to_string(),
        }),
        Err(e) => Err(DependencyError::ProvisioningFailed {
            tool: tool.program.to_string(),
            package: tool.package.to_string(),
            reason: e.to_string(),
        }),
    }
}

pub async fn is_available(exec: &Executor, tool: &RequiredTool) -> bool {
    match exec.run(tool.program, tool.check_args).await {
        Ok(_) => true,
        Err(SignalError::ToolUnavailable { .. }) => false,
        // Present but misbehaving: let the monitor report it per poll.
        Err(e) => {
            warn!("{} version check failed: {}", tool.program, e);
            true
        }
    }
}
