use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::config::persistence::{config_path, load_common_settings, load_config};
use crate::config::types::{
    BackupConfig, ConfigFile, ConfigKind, DriveHealthConfig, NotifierBackend, SensorConfig,
    SharesConfig, SpaceConfig,
};
use crate::monitor::signal::SignalError;
use crate::system::dependencies::{is_available, RequiredTool, SENSORS, SMARTCTL, TAR};
use crate::system::executor::Executor;

const LSBLK: RequiredTool = RequiredTool {
    program: "lsblk",
    check_args: &["--version"],
    package: "util-linux",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub status: CheckStatus,
    pub label: String,
    pub detail: String,
    pub hint: Option<String>,
}

impl CheckLine {
    fn new(status: CheckStatus, label: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status,
            label: label.into(),
            detail: detail.into(),
            hint: None,
        }
    }

    fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Run health check to verify tools and config files
pub async fn run_health_check(config_dir: &Path) -> Result<()> {
    println!(
        "\x1b[32mtipi-tricks v{} ({})\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );
    println!("Health Check");
    println!("============\n");

    let exec = Executor::new(Duration::from_secs(10));
    let lines = collect_checks(config_dir, &exec).await;

    let mut all_ok = true;
    for line in &lines {
        let mark = match line.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warn => "⚠",
            CheckStatus::Fail => {
                all_ok = false;
                "✗"
            }
        };
        println!("{} {}: {}", mark, line.label, line.detail);
        if let Some(hint) = &line.hint {
            println!("  {}", hint);
        }
    }

    println!();
    if all_ok {
        println!("\x1b[32m✓ All checks passed!\x1b[0m");
    } else {
        println!("\x1b[33m⚠ Some issues found - see above\x1b[0m");
    }

    Ok(())
}

pub async fn collect_checks(config_dir: &Path, exec: &Executor) -> Vec<CheckLine> {
    let mut lines = Vec::new();

    if config_dir.is_dir() {
        lines.push(CheckLine::new(
            CheckStatus::Ok,
            "Config dir",
            config_dir.display().to_string(),
        ));
    } else {
        let detail = format!("{} not found (defaults apply)", config_dir.display());
        lines.push(
            CheckLine::new(CheckStatus::Warn, "Config dir", detail)
                .hint("Run: tipi-tricks setup temp-sensor"),
        );
    }

    lines.push(config_check::<DriveHealthConfig>(config_dir).await.0);
    lines.push(match config_check::<SensorConfig>(config_dir).await {
        (line, Some(sensor)) => match sensor.require_sensor() {
            Ok(_) => line,
            Err(e) => CheckLine::new(CheckStatus::Warn, line.label, e.to_string()),
        },
        (line, None) => line,
    });
    lines.push(config_check::<SharesConfig>(config_dir).await.0);
    lines.push(config_check::<SpaceConfig>(config_dir).await.0);
    lines.push(config_check::<BackupConfig>(config_dir).await.0);

    for tool in [SMARTCTL, SENSORS, LSBLK, TAR] {
        if is_available(exec, &tool).await {
            lines.push(CheckLine::new(CheckStatus::Ok, tool.program, "installed"));
        } else {
            lines.push(
                CheckLine::new(CheckStatus::Fail, tool.program, "NOT FOUND")
                    .hint(format!("Run: sudo apt-get install -y {}", tool.package)),
            );
        }
    }

    // Shared settings are normally identical across files; the space monitor's are representative.
    if let Ok(common) = load_common_settings(config_dir, ConfigKind::DriveSpace).await {
        let cli = Path::new(&common.runtipi_dir).join("runtipi-cli");
        if cli.exists() {
            lines.push(CheckLine::new(
                CheckStatus::Ok,
                "runtipi-cli",
                cli.display().to_string(),
            ));
        } else {
            let detail = format!("{} not found", cli.display());
            lines.push(
                CheckLine::new(CheckStatus::Warn, "runtipi-cli", detail)
                    .hint("Set runtipi_dir in the monitor config files"),
            );
        }

        if common.notifier.backend == NotifierBackend::Gotify {
            let version = exec.run(&common.notifier.gotify_bin, &["--version"]).await;
            if !matches!(version, Err(SignalError::ToolUnavailable { .. })) {
                lines.push(CheckLine::new(CheckStatus::Ok, "gotify", "installed"));
            } else {
                let detail = "NOT FOUND (notifications will fail)";
                lines.push(
                    CheckLine::new(CheckStatus::Warn, "gotify", detail)
                        .hint("Install gotify-cli or set notifier.backend to \"log\""),
                );
            }
        }
    }

    lines
}

async fn config_check<T: ConfigFile>(config_dir: &Path) -> (CheckLine, Option<T>) {
    let file = T::KIND.file_name();
    let path = config_path(config_dir, T::KIND);
    let existed = path.exists();

    match load_config::<T>(config_dir).await {
        Ok(config) if existed => {
            let line = CheckLine::new(CheckStatus::Ok, file, path.display().to_string());
            (line, Some(config))
        }
        Ok(config) => {
            let line = CheckLine::new(CheckStatus::Warn, file, "not found (defaults apply)");
            (line, Some(config))
        }
        Err(e) => (CheckLine::new(CheckStatus::Fail, file, e.to_string()), None),
    }
}
