//! Config directory resolution and per-kind config file load/save.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::types::{
    BackupConfig, CommonSettings, ConfigError, ConfigFile, ConfigKind, DriveHealthConfig,
    SensorConfig, SharesConfig, SpaceConfig, CONFIG_DIR_ENV, DEFAULT_CONFIG_DIR,
};

/// `--config-dir` flag, then `TIPI_TRICKS_CONFIG_DIR`, then the runtipi default.
pub fn resolve_config_dir(flag: Option<&Path>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_CONFIG_DIR),
    }
}

pub fn config_path(config_dir: &Path, kind: ConfigKind) -> PathBuf {
    config_dir.join(kind.file_name())
}

/// Loads and validates one config file. A missing file yields the defaults.
pub async fn load_config<T: ConfigFile>(config_dir: &Path) -> Result<T, ConfigError> {
    let path = config_path(config_dir, T::KIND);

    let config = match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            let config: T = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
            info!("Loaded configuration from: {:?}", path);
            config
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("Config file {:?} not found, using defaults", path);
            T::default()
        }
        Err(source) => return Err(ConfigError::Io { path, source }),
    };

    config.validate()?;
    Ok(config)
}

/// Shared settings of one kind's file, without validating the rest of it.
pub async fn load_common_settings(
    config_dir: &Path,
    kind: ConfigKind,
) -> Result<CommonSettings, ConfigError> {
    let path = config_path(config_dir, kind);
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => {
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CommonSettings::default()),
        Err(source) => Err(ConfigError::Io { path, source }),
    }
}

/// Pretty JSON of one kind's configuration after defaults are applied.
pub async fn effective_config_json(config_dir: &Path, kind: ConfigKind) -> Result<String> {
    async fn render<T: ConfigFile>(config_dir: &Path) -> Result<String> {
        let config: T = load_config(config_dir).await?;
        Ok(serde_json::to_string_pretty(&config)?)
    }

    match kind {
        ConfigKind::DriveHealth => render::<DriveHealthConfig>(config_dir).await,
        ConfigKind::TempSensor => render::<SensorConfig>(config_dir).await,
        ConfigKind::MountPoints => render::<SharesConfig>(config_dir).await,
        ConfigKind::DriveSpace => render::<SpaceConfig>(config_dir).await,
        ConfigKind::Backup => render::<BackupConfig>(config_dir).await,
    }
}

pub async fn save_config<T: ConfigFile>(config: &T, config_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(config_dir)
        .await
        .with_context(|| format!("Failed to create config directory {:?}", config_dir))?;

    let path = config_path(config_dir, T::KIND);
    let content = serde_json::to_string_pretty(config)?;
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write {:?}", path))?;
    info!("Configuration saved to: {:?}", path);
    Ok(path)
}
