//! One backup cycle: archive, then trim to the retention policy.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use tracing::{debug, info, warn};

use super::archive::Archiver;
use super::retention::{ArtifactNaming, BackupArtifact, RetentionPolicy};
use super::BackupError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub created: PathBuf,
    pub deleted: Vec<String>,
    pub failed_deletions: Vec<String>,
}

pub struct BackupJob {
    archiver: Arc<dyn Archiver>,
    naming: ArtifactNaming,
    policy: RetentionPolicy,
    base_dir: PathBuf,
    backup_dir: PathBuf,
    items: Vec<String>,
}

impl BackupJob {
    pub fn new(
        archiver: Arc<dyn Archiver>,
        naming: ArtifactNaming,
        policy: RetentionPolicy,
        base_dir: impl Into<PathBuf>,
        backup_dir: impl Into<PathBuf>,
        items: Vec<String>,
    ) -> Self {
        Self {
            archiver,
            naming,
            policy,
            base_dir: base_dir.into(),
            backup_dir: backup_dir.into(),
            items,
        }
    }

    /// Creates the `now` archive and, only if that succeeded, deletes the
    /// oldest artifacts beyond the policy. Individual delete failures are
    /// logged and recorded; the remaining deletions still run.
    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<CycleReport, BackupError> {
        tokio::fs::create_dir_all(&self.backup_dir).await?;

        let dest = self.backup_dir.join(self.naming.name_for(now));
        self.archiver.create(&dest, &self.base_dir, &self.items).await?;
        info!("Backup created: {:?}", dest);

        let existing = list_artifacts(&self.backup_dir, &self.naming).await?;
        let doomed = self.policy.select_for_deletion(&existing);
        debug!(
            "{} backups present, keeping {}, deleting {}",
            existing.len(),
            self.policy.max_count(),
            doomed.len()
        );

        let mut report = CycleReport {
            created: dest,
            deleted: Vec::new(),
            failed_deletions: Vec::new(),
        };
        for artifact in doomed {
            match tokio::fs::remove_file(self.backup_dir.join(&artifact.name)).await {
                Ok(()) => {
                    info!("Removed old backup: {}", artifact.name);
                    report.deleted.push(artifact.name);
                }
                Err(e) => {
                    warn!("Failed to remove old backup {}: {}", artifact.name, e);
                    report.failed_deletions.push(artifact.name);
                }
            }
        }
        Ok(report)
    }
}

/// Artifacts in `dir` matching the naming, dated by the timestamp in their
/// name or, failing that, by modification time.
pub async fn list_artifacts(
    dir: &Path,
    naming: &ArtifactNaming,
) -> Result<Vec<BackupArtifact>, BackupError> {
    let escaped_dir = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = format!("{}/{}", escaped_dir, naming.file_pattern());
    let listing_error = |reason: String| BackupError::Listing {
        dir: dir.to_path_buf(),
        reason,
    };
    let paths = glob::glob(&pattern).map_err(|e| listing_error(e.to_string()))?;

    let mut artifacts = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| listing_error(e.to_string()))?;
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        if !naming.matches(&name) {
            continue;
        }

        let created_at = match naming.parse_timestamp(&name) {
            Some(ts) => ts,
            None => {
                let modified = tokio::fs::metadata(&path).await?.modified()?;
                DateTime::<Local>::from(modified).naive_local()
            }
        };
        artifacts.push(BackupArtifact { name, created_at });
    }
    Ok(artifacts)
}
