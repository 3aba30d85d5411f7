//! Mount-point presence for network shares.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::monitor::signal::{Signal, SignalError, SignalSource};
use crate::system::executor::{BoundedCall, Executor};
use crate::system::parser::parse_fstab_mount_points;

pub struct MountSource {
    mount_point: String,
    call: BoundedCall,
    check: fn(&Path) -> bool,
}

impl MountSource {
    pub fn new(mount_point: impl Into<String>, exec: &Executor) -> Self {
        Self {
            mount_point: mount_point.into(),
            call: exec.bounded_call("stat"),
            check: is_mount_point,
        }
    }

    #[cfg(test)]
    fn with_check(mut self, check: fn(&Path) -> bool) -> Self {
        self.check = check;
        self
    }
}

#[async_trait]
impl SignalSource for MountSource {
    fn subject(&self) -> &str {
        &self.mount_point
    }

    /// A stat that does not return in time is a hung share: reported as not mounted.
    async fn read(&self) -> Result<Signal, SignalError> {
        let path = PathBuf::from(&self.mount_point);
        let check = self.check;
        match self.call.run(move || Ok(check(&path))).await {
            Ok(mounted) => Ok(Signal::Mounted(mounted)),
            Err(e @ SignalError::Timeout { .. }) => {
                warn!("{}: {}; treating the share as disconnected", self.mount_point, e);
                Ok(Signal::Mounted(false))
            }
            Err(e) => Err(e),
        }
    }
}

/// True if `path` is on a different device than its parent, or is its own parent.
/// A missing or unreadable path is not mounted.
pub fn is_mount_point(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let Ok(meta) = std::fs::symlink_metadata(path) else {
            return false;
        };
        if meta.file_type().is_symlink() || !meta.is_dir() {
            return false;
        }
        let Ok(parent_meta) = std::fs::metadata(path.join("..")) else {
            return false;
        };
        meta.dev() != parent_meta.dev() || meta.ino() == parent_meta.ino()
    }

    #[cfg(not(unix))]
    {
        std::fs::metadata(path).is_ok()
    }
}

/// Mount points listed in an fstab file.
pub async fn fstab_mount_points(fstab_path: &Path) -> Result<Vec<String>, SignalError> {
    let content = tokio::fs::read_to_string(fstab_path).await?;
    Ok(parse_fstab_mount_points(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn exec() -> Executor {
        Executor::new(Duration::from_secs(5))
    }

    #[test]
    fn root_is_a_mount_point() {
        assert!(is_mount_point(Path::new("/")));
    }

    #[tokio::test]
    async fn plain_directory_is_not_a_mount_point() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("share");
        std::fs::create_dir(&sub).unwrap();
        assert!(!is_mount_point(&sub));

        let source = MountSource::new(sub.to_string_lossy(), &exec());
        assert_eq!(source.read().await.unwrap(), Signal::Mounted(false));
    }

    #[tokio::test]
    async fn missing_path_is_not_mounted() {
        let source = MountSource::new("/definitely/not/a/mount/point", &exec());
        assert_eq!(source.read().await.unwrap(), Signal::Mounted(false));
    }

    #[tokio::test]
    async fn root_reads_as_mounted() {
        let source = MountSource::new("/", &exec());
        assert_eq!(source.read().await.unwrap(), Signal::Mounted(true));
    }

    fn hung_stat(_: &Path) -> bool {
        std::thread::sleep(Duration::from_millis(300));
        true
    }

    #[tokio::test]
    async fn hung_stat_reads_as_disconnected() {
        let source = MountSource::new("/mnt/tv", &Executor::new(Duration::from_millis(50)))
            .with_check(hung_stat);

        assert_eq!(source.read().await.unwrap(), Signal::Mounted(false));
        // Still blocked: answered without waiting on another stat.
        assert_eq!(source.read().await.unwrap(), Signal::Mounted(false));
    }

    #[tokio::test]
    async fn reads_mount_points_from_fstab_file() {
        let dir = tempfile::tempdir().unwrap();
        let fstab = dir.path().join("fstab");
        std::fs::write(
            &fstab,
            "# comment\n//nas/tv /mnt/tv cifs defaults 0 0\n/swap none swap sw 0 0\n",
        )
        .unwrap();
        assert_eq!(fstab_mount_points(&fstab).await.unwrap(), ["/mnt/tv"]);
    }
}
