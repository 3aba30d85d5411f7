//! Command-line argument definitions (clap).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::types::ConfigKind;
use crate::daemon::runner::MonitorKind;

#[derive(Parser, Debug)]
#[command(name = "tipi-tricks")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Host monitors and scheduled backups for a runtipi home server",
    long_about = None
)]
pub struct Args {
    /// Directory holding the monitor config files
    /// [env: TIPI_TRICKS_CONFIG_DIR] [default: /root/runtipi/etc]
    #[arg(long = "config-dir", global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR, CRITICAL)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one monitor until interrupted
    Monitor {
        #[arg(value_enum)]
        kind: MonitorKind,
    },

    /// Scheduled backups
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Interactive setup
    Setup {
        #[command(subcommand)]
        target: SetupTarget,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check (required tools, config files)
    Check,
}

#[derive(Subcommand, Debug)]
pub enum BackupAction {
    /// Create a backup now, then remove the oldest beyond max_backups
    Run,
}

#[derive(Subcommand, Debug)]
pub enum SetupTarget {
    /// Choose the sensor chip, threshold and alert command
    TempSensor,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration of one kind as JSON
    Show {
        #[arg(value_enum)]
        kind: ConfigKind,
    },
}
