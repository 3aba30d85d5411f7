//! tipi-tricks entry point: CLI dispatch, logging, signal handlers, async runtime.

mod actions;
mod app;
mod backup;
mod config;
mod daemon;
mod monitor;
mod sources;
mod system;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use app::cli::{Args, BackupAction, Command, ConfigAction, SetupTarget};
use app::logging::{effective_level, init_tracing, parse_level, reload_level};
use config::persistence::{effective_config_json, load_common_settings, resolve_config_dir};
use config::setup::run_sensor_setup;
use config::types::ConfigKind;
use daemon::runner::{run_backup, run_monitor, MonitorKind};
use daemon::shutdown::{spawn_signal_listener, Shutdown};
use daemon::status::run_health_check;
use system::executor::Executor;

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // Custom version output with architecture (green)
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!(
                    "\x1b[32mtipi-tricks {} ({})\x1b[0m",
                    env!("CARGO_PKG_VERSION"),
                    std::env::consts::ARCH
                );
                std::process::exit(0);
            }
            err.exit();
        }
    };

    let config_dir = resolve_config_dir(args.config_dir.as_deref());

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let config_kind = match &args.command {
        Command::Monitor { kind } => Some(kind.config_kind()),
        Command::Backup { .. } => Some(ConfigKind::Backup),
        _ => None,
    };
    let config_level = match config_kind {
        Some(kind) => load_common_settings(&config_dir, kind).await.ok().map(|c| c.log_level),
        None => None,
    };
    let env_level = std::env::var("LOG_LEVEL").ok();
    init_tracing(effective_level(
        args.log_level.as_deref(),
        env_level.as_deref(),
        config_level.as_deref(),
    ));

    match args.command {
        Command::Monitor { kind } => run_monitor_process(kind, &config_dir).await,
        Command::Backup {
            action: BackupAction::Run,
        } => {
            let report = run_backup(&config_dir).await?;
            info!(
                "Backup cycle complete: created {:?}, removed {}, failed to remove {}",
                report.created,
                report.deleted.len(),
                report.failed_deletions.len()
            );
            Ok(())
        }
        Command::Setup {
            target: SetupTarget::TempSensor,
        } => run_sensor_setup(&config_dir, &Executor::new(Duration::from_secs(30))).await,
        Command::Config {
            action: ConfigAction::Show { kind },
        } => {
            println!("{}", effective_config_json(&config_dir, kind).await?);
            Ok(())
        }
        Command::Check => run_health_check(&config_dir).await,
    }
}

async fn run_monitor_process(kind: MonitorKind, config_dir: &Path) -> Result<()> {
    info!(
        "Tipi Tricks v{} starting {:?} monitor ({})",
        env!("CARGO_PKG_VERSION"),
        kind,
        std::env::consts::OS
    );

    // Setup SIGHUP handler for log level reload
    #[cfg(target_os = "linux")]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::hangup()) {
            Ok(mut sighup) => {
                let config_dir = config_dir.to_path_buf();
                tokio::spawn(async move {
                    while sighup.recv().await.is_some() {
                        info!("SIGHUP received, reloading log level configuration");
                        match load_common_settings(&config_dir, kind.config_kind()).await {
                            Ok(common) => {
                                let filter = parse_level(&common.log_level).unwrap_or("info");
                                match reload_level(filter) {
                                    Ok(()) => {
                                        info!("Log level reloaded: {}", filter.to_uppercase())
                                    }
                                    Err(e) => error!("Failed to reload log level: {}", e),
                                }
                            }
                            Err(e) => error!("Failed to reload config: {}", e),
                        }
                    }
                });
            }
            Err(e) => warn!("Failed to set up SIGHUP handler: {}", e),
        }
    }

    let (trigger, shutdown) = Shutdown::new();
    spawn_signal_listener(trigger);

    run_monitor(kind, config_dir, shutdown).await?;

    info!("Monitor shutdown complete");
    Ok(())
}
