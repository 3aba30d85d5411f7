//! Archive creation with tar.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use super::BackupError;
use crate::system::executor::{Executor, ToolCommand};

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Writes `items` (relative to `base_dir`) into the archive at `dest`.
    async fn create(&self, dest: &Path, base_dir: &Path, items: &[String])
        -> Result<(), BackupError>;
}

/// `tar --one-file-system -czf <dest> -C <base_dir> <items...>`
pub struct TarArchiver {
    tar: ToolCommand,
    exec: Executor,
}

impl TarArchiver {
    pub fn new(tar: ToolCommand, exec: Executor) -> Self {
        Self { tar, exec }
    }
}

#[async_trait]
impl Archiver for TarArchiver {
    async fn create(
        &self,
        dest: &Path,
        base_dir: &Path,
        items: &[String],
    ) -> Result<(), BackupError> {
        let mut present = Vec::with_capacity(items.len());
        for item in items {
            if tokio::fs::symlink_metadata(base_dir.join(item)).await.is_ok() {
                present.push(item.as_str());
            } else {
                warn!("Backup item {:?} not found in {:?}, skipping", item, base_dir);
            }
        }
        if present.is_empty() {
            return Err(BackupError::NothingToArchive(base_dir.to_path_buf()));
        }

        let dest_arg = dest.to_string_lossy();
        let base_arg = base_dir.to_string_lossy();
        let mut args = vec![
            "--one-file-system",
            "-czf",
            dest_arg.as_ref(),
            "-C",
            base_arg.as_ref(),
        ];
        args.extend(present.iter().copied());

        info!("Creating backup {:?} from {} items", dest, present.len());
        if let Err(e) = self.exec.run_tool_checked(&self.tar, &args).await {
            match tokio::fs::remove_file(dest).await {
                Ok(()) => info!("Removed partial archive {:?}", dest),
                Err(rm) if rm.kind() == std::io::ErrorKind::NotFound => {}
                Err(rm) => warn!("Failed to remove partial archive {:?}: {}", dest, rm),
            }
            return Err(BackupError::ArchiveFailed {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}
