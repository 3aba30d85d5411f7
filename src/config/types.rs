//! Monitor and backup configuration structs and defaults.

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_DIR: &str = "/root/runtipi/etc";
pub const CONFIG_DIR_ENV: &str = "TIPI_TRICKS_CONFIG_DIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("missing required setting `{field}` in {file}; run `tipi-tricks setup {setup}`")]
    MissingRequired {
        field: &'static str,
        file: &'static str,
        setup: &'static str,
    },
}

/// One configuration file per monitor kind, plus the backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigKind {
    DriveHealth,
    TempSensor,
    MountPoints,
    DriveSpace,
    Backup,
}

impl ConfigKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ConfigKind::DriveHealth => "drive_health.json",
            ConfigKind::TempSensor => "monitor_sensor.json",
            ConfigKind::MountPoints => "monitor_shares.json",
            ConfigKind::DriveSpace => "monitor_space.json",
            ConfigKind::Backup => "scheduled_tipi_backup.json",
        }
    }
}

/// Implemented by every per-kind config file.
pub trait ConfigFile: Serialize + DeserializeOwned + Default {
    const KIND: ConfigKind;

    fn validate(&self) -> Result<(), ConfigError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierBackend {
    Gotify,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    #[serde(default = "default_backend")]
    pub backend: NotifierBackend,
    #[serde(default = "default_gotify_bin")]
    pub gotify_bin: String,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            gotify_bin: default_gotify_bin(),
        }
    }
}

/// Settings shared by every config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonSettings {
    #[serde(default)]
    pub notifier: NotifierSettings,
    #[serde(default = "default_runtipi_dir")]
    pub runtipi_dir: String,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Install missing tools with apt-get instead of failing.
    #[serde(default)]
    pub auto_install: bool,
}

impl Default for CommonSettings {
    fn default() -> Self {
        Self {
            notifier: NotifierSettings::default(),
            runtipi_dir: default_runtipi_dir(),
            command_timeout_seconds: default_command_timeout(),
            log_level: default_log_level(),
            auto_install: false,
        }
    }
}

impl CommonSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        positive("command_timeout_seconds", self.command_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveHealthConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// Devices to check; empty means every disk reported by lsblk.
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default = "default_drive_poll")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_drive_repeat")]
    pub repeat_alert_seconds: Option<u64>,
}

impl Default for DriveHealthConfig {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            devices: Vec::new(),
            poll_interval_seconds: default_drive_poll(),
            repeat_alert_seconds: default_drive_repeat(),
        }
    }
}

impl ConfigFile for DriveHealthConfig {
    const KIND: ConfigKind = ConfigKind::DriveHealth;

    fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        positive("poll_interval_seconds", self.poll_interval_seconds)?;
        positive_opt("repeat_alert_seconds", self.repeat_alert_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// Chip name as printed by `sensors`, e.g. `coretemp-isa-0000`.
    #[serde(default)]
    pub sensor: Option<String>,
    #[serde(default)]
    pub threshold_temp: Option<f64>,
    /// Shell command run on each alert.
    #[serde(default)]
    pub optional_command: Option<String>,
    #[serde(default = "default_sensor_poll")]
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub repeat_alert_seconds: Option<u64>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            sensor: None,
            threshold_temp: None,
            optional_command: None,
            poll_interval_seconds: default_sensor_poll(),
            repeat_alert_seconds: None,
        }
    }
}

impl SensorConfig {
    pub fn require_sensor(&self) -> Result<(&str, f64), ConfigError> {
        let missing = |field| ConfigError::MissingRequired {
            field,
            file: ConfigKind::TempSensor.file_name(),
            setup: "temp-sensor",
        };
        let sensor = self
            .sensor
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| missing("sensor"))?;
        let threshold = self.threshold_temp.ok_or_else(|| missing("threshold_temp"))?;
        Ok((sensor, threshold))
    }
}

impl ConfigFile for SensorConfig {
    const KIND: ConfigKind = ConfigKind::TempSensor;

    fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        positive("poll_interval_seconds", self.poll_interval_seconds)?;
        positive_opt("repeat_alert_seconds", self.repeat_alert_seconds)?;
        if let Some(t) = self.threshold_temp {
            finite("threshold_temp", t)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharesConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// Mount points to watch; empty means every entry in `fstab_path`.
    #[serde(default)]
    pub mount_points: Vec<String>,
    #[serde(default = "default_fstab_path")]
    pub fstab_path: String,
    #[serde(default = "default_share_workloads")]
    pub workloads: Vec<String>,
    #[serde(default = "default_shares_poll")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_remediation_interval")]
    pub remediation_interval_seconds: u64,
    #[serde(default = "default_remount_command")]
    pub remount_command: String,
}

impl Default for SharesConfig {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            mount_points: Vec::new(),
            fstab_path: default_fstab_path(),
            workloads: default_share_workloads(),
            poll_interval_seconds: default_shares_poll(),
            remediation_interval_seconds: default_remediation_interval(),
            remount_command: default_remount_command(),
        }
    }
}

impl ConfigFile for SharesConfig {
    const KIND: ConfigKind = ConfigKind::MountPoints;

    fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        positive("poll_interval_seconds", self.poll_interval_seconds)?;
        positive("remediation_interval_seconds", self.remediation_interval_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default = "default_space_path")]
    pub path: String,
    #[serde(default = "default_space_threshold")]
    pub threshold_percent: f64,
    #[serde(default = "default_space_poll")]
    pub poll_interval_seconds: u64,
    #[serde(default = "default_space_repeat")]
    pub repeat_alert_seconds: Option<u64>,
    #[serde(default = "default_space_workloads")]
    pub workloads: Vec<String>,
    /// Once alerting, recover only when usage falls below this percentage.
    /// Unset: recover as soon as usage is back at or below the threshold.
    #[serde(default)]
    pub resume_below_percent: Option<f64>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            path: default_space_path(),
            threshold_percent: default_space_threshold(),
            poll_interval_seconds: default_space_poll(),
            repeat_alert_seconds: default_space_repeat(),
            workloads: default_space_workloads(),
            resume_below_percent: None,
        }
    }
}

impl ConfigFile for SpaceConfig {
    const KIND: ConfigKind = ConfigKind::DriveSpace;

    fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        positive("poll_interval_seconds", self.poll_interval_seconds)?;
        positive_opt("repeat_alert_seconds", self.repeat_alert_seconds)?;
        finite("threshold_percent", self.threshold_percent)?;
        if let Some(resume) = self.resume_below_percent {
            finite("resume_below_percent", resume)?;
            if resume > self.threshold_percent {
                return Err(ConfigError::Invalid {
                    field: "resume_below_percent",
                    reason: format!(
                        "{} is above threshold_percent {}",
                        resume, self.threshold_percent
                    ),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(flatten)]
    pub common: CommonSettings,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    #[serde(default = "default_backup_prefix")]
    pub prefix: String,
    #[serde(default = "default_backup_extension")]
    pub extension: String,
    /// Directory the items are archived from.
    #[serde(default = "default_runtipi_dir")]
    pub base_dir: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_backup_items")]
    pub items: Vec<String>,
    #[serde(default = "default_archive_timeout")]
    pub archive_timeout_seconds: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            max_backups: default_max_backups(),
            prefix: default_backup_prefix(),
            extension: default_backup_extension(),
            base_dir: default_runtipi_dir(),
            backup_dir: default_backup_dir(),
            items: default_backup_items(),
            archive_timeout_seconds: default_archive_timeout(),
        }
    }
}

impl ConfigFile for BackupConfig {
    const KIND: ConfigKind = ConfigKind::Backup;

    fn validate(&self) -> Result<(), ConfigError> {
        self.common.validate()?;
        if self.max_backups == 0 {
            return Err(ConfigError::Invalid {
                field: "max_backups",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.prefix.is_empty() || self.prefix.contains('/') {
            return Err(ConfigError::Invalid {
                field: "prefix",
                reason: format!("{:?} is not a usable file name prefix", self.prefix),
            });
        }
        positive("archive_timeout_seconds", self.archive_timeout_seconds)
    }
}

fn positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}

fn positive_opt(field: &'static str, value: Option<u64>) -> Result<(), ConfigError> {
    value.map_or(Ok(()), |v| positive(field, v))
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("{} is not a number", value),
        });
    }
    Ok(())
}

// --- Defaults ---

const fn default_backend() -> NotifierBackend {
    NotifierBackend::Gotify
}

fn default_gotify_bin() -> String {
    "gotify".into()
}

fn default_runtipi_dir() -> String {
    "/root/runtipi".into()
}

const fn default_command_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".into()
}

const fn default_drive_poll() -> u64 {
    86400
}

const fn default_drive_repeat() -> Option<u64> {
    Some(86400)
}

const fn default_sensor_poll() -> u64 {
    10
}

fn default_fstab_path() -> String {
    "/etc/fstab".into()
}

fn default_share_workloads() -> Vec<String> {
    vec!["sabnzbd".into(), "sonarr".into(), "radarr".into()]
}

const fn default_shares_poll() -> u64 {
    60
}

const fn default_remediation_interval() -> u64 {
    60
}

fn default_remount_command() -> String {
    "mount -a".into()
}

fn default_space_path() -> String {
    "/".into()
}

const fn default_space_threshold() -> f64 {
    95.0
}

const fn default_space_poll() -> u64 {
    60
}

const fn default_space_repeat() -> Option<u64> {
    Some(600)
}

fn default_space_workloads() -> Vec<String> {
    vec!["runtipi".into()]
}

const fn default_max_backups() -> usize {
    7
}

fn default_backup_prefix() -> String {
    "Tipi".into()
}

fn default_backup_extension() -> String {
    "tar.gz".into()
}

fn default_backup_dir() -> String {
    "/root/runtipi/backup".into()
}

fn default_backup_items() -> Vec<String> {
    [
        "app-data",
        "apps",
        "data",
        "docker-compose.yml",
        "logs",
        "media",
        "repos",
        "runtipi-cli",
        "traefik",
        "user-config",
        "VERSION",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const fn default_archive_timeout() -> u64 {
    6 * 60 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let space: SpaceConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(space.threshold_percent, 95.0);
        assert_eq!(space.repeat_alert_seconds, Some(600));
        assert_eq!(space.workloads, ["runtipi"]);
        assert_eq!(space.common.command_timeout_seconds, 30);
        assert_eq!(space.common.notifier.backend, NotifierBackend::Gotify);

        let backup: BackupConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(backup.max_backups, 7);
        assert_eq!(backup.items.len(), 11);
        assert_eq!(backup.archive_timeout_seconds, 21600);
    }

    #[test]
    fn shared_settings_sit_at_the_top_level() {
        let shares: SharesConfig = serde_json::from_str(
            r#"{ "runtipi_dir": "/srv/tipi", "notifier": { "backend": "log" }, "workloads": ["plex"] }"#,
        )
        .unwrap();
        assert_eq!(shares.common.runtipi_dir, "/srv/tipi");
        assert_eq!(shares.common.notifier.backend, NotifierBackend::Log);
        assert_eq!(shares.common.notifier.gotify_bin, "gotify");
        assert_eq!(shares.workloads, ["plex"]);
        assert_eq!(shares.remediation_interval_seconds, 60);
    }

    #[test]
    fn null_repeat_means_alert_once() {
        let drive: DriveHealthConfig =
            serde_json::from_str(r#"{ "repeat_alert_seconds": null }"#).unwrap();
        assert_eq!(drive.repeat_alert_seconds, None);
        assert_eq!(DriveHealthConfig::default().repeat_alert_seconds, Some(86400));
    }

    #[test]
    fn sensor_name_is_required() {
        let config = SensorConfig::default();
        assert!(matches!(
            config.require_sensor(),
            Err(ConfigError::MissingRequired { field: "sensor", .. })
        ));

        let config = SensorConfig {
            sensor: Some("coretemp-isa-0000".into()),
            threshold_temp: Some(80.0),
            ..SensorConfig::default()
        };
        assert_eq!(config.require_sensor().unwrap(), ("coretemp-isa-0000", 80.0));
    }

    #[test]
    fn zero_intervals_and_retention_are_rejected() {
        let space = SpaceConfig {
            poll_interval_seconds: 0,
            ..SpaceConfig::default()
        };
        assert!(matches!(
            space.validate(),
            Err(ConfigError::Invalid { field: "poll_interval_seconds", .. })
        ));

        let backup = BackupConfig {
            max_backups: 0,
            ..BackupConfig::default()
        };
        assert!(matches!(
            backup.validate(),
            Err(ConfigError::Invalid { field: "max_backups", .. })
        ));

        assert!(DriveHealthConfig::default().validate().is_ok());
    }

    #[test]
    fn resume_level_must_not_exceed_threshold() {
        let space: SpaceConfig =
            serde_json::from_str(r#"{ "resume_below_percent": 15.0 }"#).unwrap();
        assert_eq!(space.resume_below_percent, Some(15.0));
        assert!(space.validate().is_ok());
        assert_eq!(SpaceConfig::default().resume_below_percent, None);

        let space = SpaceConfig {
            resume_below_percent: Some(99.0),
            ..SpaceConfig::default()
        };
        assert!(matches!(
            space.validate(),
            Err(ConfigError::Invalid { field: "resume_below_percent", .. })
        ));
    }
}
