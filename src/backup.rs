//! Scheduled runtipi backups: archive creation and retention trimming.

pub mod archive;
pub mod job;
pub mod retention;

use std::path::PathBuf;

use thiserror::Error;

pub use archive::TarArchiver;
pub use job::{BackupJob, CycleReport};
pub use retention::{ArtifactNaming, RetentionPolicy};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("invalid retention policy: {0}")]
    InvalidPolicy(String),

    #[error("none of the backup items exist under {0:?}")]
    NothingToArchive(PathBuf),

    #[error("archive {path:?} failed: {reason}")]
    ArchiveFailed { path: PathBuf, reason: String },

    #[error("failed to list backups in {dir:?}: {reason}")]
    Listing { dir: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
