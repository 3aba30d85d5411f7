//! Builds the monitors of one kind from their config file and runs them;
//! runs a single backup cycle.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use tracing::{info, warn};

use crate::actions::{build_notifier, MessageTemplate, MonitorActions, RuntipiWorkloads};
use crate::backup::{ArtifactNaming, BackupJob, CycleReport, RetentionPolicy, TarArchiver};
use crate::config::persistence::load_config;
use crate::config::types::{
    BackupConfig, CommonSettings, ConfigError, ConfigKind, DriveHealthConfig, SensorConfig,
    SharesConfig, SpaceConfig,
};
use crate::daemon::shutdown::Shutdown;
use crate::monitor::{
    ActionSet, Condition, Debounce, MonitorGroup, MonitorSettings, NotificationSink, SignalError,
    SubjectDiscovery, ThresholdMonitor, WorkloadController,
};
use crate::sources::mounts::fstab_mount_points;
use crate::sources::{
    discover_drives, DiskUsageSource, MountSource, SensorTemperatureSource, SmartHealthSource,
};
use crate::system::dependencies::{ensure_tool, SENSORS, SMARTCTL, TAR};
use crate::system::executor::{Executor, ToolCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MonitorKind {
    DriveHealth,
    TempSensor,
    MountPoints,
    DriveSpace,
}

impl MonitorKind {
    pub fn config_kind(self) -> ConfigKind {
        match self {
            MonitorKind::DriveHealth => ConfigKind::DriveHealth,
            MonitorKind::TempSensor => ConfigKind::TempSensor,
            MonitorKind::MountPoints => ConfigKind::MountPoints,
            MonitorKind::DriveSpace => ConfigKind::DriveSpace,
        }
    }
}

/// Everything a monitor's actions talk to, built from the shared settings.
pub struct Collaborators {
    pub exec: Executor,
    pub notifier: Arc<dyn NotificationSink>,
    pub workloads: Arc<dyn WorkloadController>,
    pub hostname: String,
}

impl Collaborators {
    pub fn from_common(common: &CommonSettings) -> Self {
        let exec = Executor::new(Duration::from_secs(common.command_timeout_seconds));
        Self {
            notifier: build_notifier(&common.notifier, exec.clone()),
            workloads: Arc::new(RuntipiWorkloads::new(&common.runtipi_dir, exec.clone())),
            hostname: local_hostname(),
            exec,
        }
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .unwrap_or_else(|_| std::ffi::OsString::from("unknown"))
        .to_string_lossy()
        .to_string()
}

pub async fn run_monitor(kind: MonitorKind, config_dir: &Path, shutdown: Shutdown) -> Result<()> {
    let group = match kind {
        MonitorKind::DriveHealth => {
            let config: DriveHealthConfig = load_config(config_dir).await?;
            let ctx = Collaborators::from_common(&config.common);
            ensure_tool(&ctx.exec, &SMARTCTL, config.common.auto_install).await?;
            drive_health_group(&config, &ctx)
        }
        MonitorKind::TempSensor => {
            let config: SensorConfig = load_config(config_dir).await?;
            let ctx = Collaborators::from_common(&config.common);
            ensure_tool(&ctx.exec, &SENSORS, config.common.auto_install).await?;
            sensor_group(&config, &ctx)?
        }
        MonitorKind::MountPoints => {
            let config: SharesConfig = load_config(config_dir).await?;
            let ctx = Collaborators::from_common(&config.common);
            shares_group(&config, &ctx)
                .await
                .with_context(|| format!("Failed to read mount points from {}", config.fstab_path))?
        }
        MonitorKind::DriveSpace => {
            let config: SpaceConfig = load_config(config_dir).await?;
            let ctx = Collaborators::from_common(&config.common);
            space_group(&config, &ctx)
        }
    };

    if group.is_empty() {
        warn!("Nothing to monitor for {:?}; exiting", kind);
        return Ok(());
    }

    group.run(shutdown).await;
    Ok(())
}

/// Whole disks as listed by `lsblk`, looked up again on every cycle.
struct LsblkDrives {
    lsblk: ToolCommand,
    smartctl: ToolCommand,
    exec: Executor,
    actions: Arc<dyn ActionSet>,
    settings: MonitorSettings,
}

#[async_trait]
impl SubjectDiscovery for LsblkDrives {
    async fn discover(&self) -> Vec<String> {
        let drives = discover_drives(&self.exec, &self.lsblk).await;
        if drives.is_empty() {
            info!("No drives found.");
        }
        drives
    }

    fn monitor_for(&self, device: &str) -> ThresholdMonitor {
        let source = SmartHealthSource::new(device, self.smartctl.clone(), self.exec.clone());
        ThresholdMonitor::new(
            Box::new(source),
            Condition::EqualsFailure,
            self.actions.clone(),
            self.settings,
        )
    }
}

/// Configured devices are fixed; with none configured, disks are discovered every cycle.
pub fn drive_health_group(config: &DriveHealthConfig, ctx: &Collaborators) -> MonitorGroup {
    let actions: Arc<dyn ActionSet> = Arc::new(MonitorActions::new(
        ctx.notifier.clone(),
        ctx.exec.clone(),
        ctx.hostname.clone(),
        MessageTemplate::new(
            "Drive Failure Alert",
            "{{SUBJECT}} is failing! Drive failure expected. Save your data immediately!",
        ),
    ));
    let settings = MonitorSettings {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        debounce: Debounce::from_seconds(config.repeat_alert_seconds),
        remediation_interval: None,
    };
    let drives = LsblkDrives {
        lsblk: ToolCommand::new("lsblk"),
        smartctl: ToolCommand::new("smartctl"),
        exec: ctx.exec.clone(),
        actions,
        settings,
    };

    if config.devices.is_empty() {
        return MonitorGroup::discovering(Box::new(drives), settings.poll_interval);
    }
    let monitors = config.devices.iter().map(|device| drives.monitor_for(device)).collect();
    MonitorGroup::new(monitors, settings.poll_interval)
}

pub fn sensor_group(
    config: &SensorConfig,
    ctx: &Collaborators,
) -> Result<MonitorGroup, ConfigError> {
    let (sensor, threshold) = config.require_sensor()?;

    let actions = MonitorActions::new(
        ctx.notifier.clone(),
        ctx.exec.clone(),
        ctx.hostname.clone(),
        MessageTemplate::new(
            "Temperature Alert",
            "{{SUBJECT}} temperature is {{VALUE}}°C, which is above the threshold of {{THRESHOLD}}°C.",
        ),
    )
    .with_threshold(threshold)
    .with_alert_command(config.optional_command.clone());

    let settings = MonitorSettings {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        debounce: Debounce::from_seconds(config.repeat_alert_seconds),
        remediation_interval: None,
    };
    info!("Monitoring {} for temperatures above {}°C", sensor, threshold);

    let source =
        SensorTemperatureSource::new(sensor, ToolCommand::new("sensors"), ctx.exec.clone());
    let monitor = ThresholdMonitor::new(
        Box::new(source),
        Condition::GreaterThan(threshold),
        Arc::new(actions),
        settings,
    );
    Ok(MonitorGroup::new(vec![monitor], settings.poll_interval))
}

pub async fn shares_group(
    config: &SharesConfig,
    ctx: &Collaborators,
) -> Result<MonitorGroup, SignalError> {
    let mount_points = if config.mount_points.is_empty() {
        fstab_mount_points(Path::new(&config.fstab_path)).await?
    } else {
        config.mount_points.clone()
    };

    let actions = Arc::new(
        MonitorActions::new(
            ctx.notifier.clone(),
            ctx.exec.clone(),
            ctx.hostname.clone(),
            MessageTemplate::new("{{HOSTNAME}}", "{{SUBJECT}} is disconnected."),
        )
        .with_recovery_message(MessageTemplate::new("{{HOSTNAME}}", "{{SUBJECT}} reconnected."))
        .with_workloads(ctx.workloads.clone(), config.workloads.clone())
        .with_remediation(ToolCommand::shell(&config.remount_command)),
    );
    let settings = MonitorSettings {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        debounce: Debounce::Once,
        remediation_interval: Some(Duration::from_secs(config.remediation_interval_seconds)),
    };

    let monitors = mount_points
        .into_iter()
        .map(|mount_point| {
            ThresholdMonitor::new(
                Box::new(MountSource::new(mount_point, &ctx.exec)),
                Condition::IsFalse,
                actions.clone(),
                settings,
            )
        })
        .collect();
    Ok(MonitorGroup::new(monitors, settings.poll_interval))
}

pub fn space_group(config: &SpaceConfig, ctx: &Collaborators) -> MonitorGroup {
    let actions = MonitorActions::new(
        ctx.notifier.clone(),
        ctx.exec.clone(),
        ctx.hostname.clone(),
        MessageTemplate::new("{{HOSTNAME}}", "{{SUBJECT}} is {{VALUE}}% full"),
    )
    .with_threshold(config.threshold_percent)
    .with_recovery_message(MessageTemplate::new(
        "{{HOSTNAME}}",
        "{{SUBJECT}} is back to {{VALUE}}% full",
    ))
    .with_workloads(ctx.workloads.clone(), config.workloads.clone());

    let settings = MonitorSettings {
        poll_interval: Duration::from_secs(config.poll_interval_seconds),
        debounce: Debounce::from_seconds(config.repeat_alert_seconds),
        remediation_interval: None,
    };
    let monitor = ThresholdMonitor::new(
        Box::new(DiskUsageSource::new(config.path.clone(), &ctx.exec)),
        space_condition(config),
        Arc::new(actions),
        settings,
    );
    MonitorGroup::new(vec![monitor], settings.poll_interval)
}

/// Strictly above the threshold alerts; with a resume level the stack is
/// only restarted once usage falls below it.
fn space_condition(config: &SpaceConfig) -> Condition {
    match config.resume_below_percent {
        Some(resume_below) => Condition::Hysteresis {
            threshold: config.threshold_percent,
            resume_below,
        },
        None => Condition::GreaterThan(config.threshold_percent),
    }
}

/// One backup cycle as configured in `scheduled_tipi_backup.json`.
pub async fn run_backup(config_dir: &Path) -> Result<CycleReport> {
    let config: BackupConfig = load_config(config_dir).await?;
    let exec = Executor::new(Duration::from_secs(config.common.command_timeout_seconds));
    ensure_tool(&exec, &TAR, config.common.auto_install).await?;

    let archiver = TarArchiver::new(
        ToolCommand::new("tar"),
        Executor::new(Duration::from_secs(config.archive_timeout_seconds)),
    );
    let job = BackupJob::new(
        Arc::new(archiver),
        ArtifactNaming::new(&config.prefix, &config.extension),
        RetentionPolicy::new(config.max_backups)?,
        &config.base_dir,
        &config.backup_dir,
        config.items.clone(),
    );

    match job.run_cycle(Local::now().naive_local()).await {
        Ok(report) => Ok(report),
        Err(e) => {
            let notifier = build_notifier(&config.common.notifier, exec);
            let message = format!("Backup failed: {}", e);
            if let Err(send_err) = notifier.send(&local_hostname(), &message).await {
                warn!("Notification failed: {}", send_err);
            }
            Err(e).context("Backup cycle failed")
        }
    }
}
