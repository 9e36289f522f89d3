//! Picking a backend from the filesystem a volume lives on.

use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use common::{Configuration, VolumeOptions};

use crate::SnapshotBackend;
use crate::btrfs::Btrfs;
use crate::error::BackendError;
use crate::exec::CommandRunner;
use crate::zfs::Zfs;

/// `f_type` reported by statfs(2) for btrfs.
pub const BTRFS_MAGIC: i64 = 0x9123_683E;
/// `f_type` reported by statfs(2) for ZFS.
pub const ZFS_MAGIC: i64 = 0x2FC1_2FC1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemKind {
    Btrfs,
    Zfs,
}

impl FilesystemKind {
    pub fn from_magic(magic: i64) -> Option<Self> {
        match magic {
            BTRFS_MAGIC => Some(FilesystemKind::Btrfs),
            ZFS_MAGIC => Some(FilesystemKind::Zfs),
            _ => None,
        }
    }
}

/// Filesystem type of the filesystem holding `path`.
#[cfg(target_os = "linux")]
pub fn filesystem_magic(path: &Path) -> Result<i64, BackendError> {
    let stat = nix::sys::statfs::statfs(path).map_err(|errno| BackendError::Io {
        path: path.to_path_buf(),
        source: errno.into(),
    })?;
    Ok(stat.filesystem_type().0 as i64)
}

#[cfg(not(target_os = "linux"))]
pub fn filesystem_magic(path: &Path) -> Result<i64, BackendError> {
    Err(BackendError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::from(std::io::ErrorKind::Unsupported),
    })
}

/// Build the backend for `kind` with the settings from `config`.
pub async fn backend_for_kind(
    kind: FilesystemKind,
    volume: &str,
    options: VolumeOptions,
    config: &Configuration,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn SnapshotBackend>, BackendError> {
    match kind {
        FilesystemKind::Btrfs => {
            if options.recursive {
                return Err(BackendError::RecursiveUnsupported(volume.to_string()));
            }
            Ok(Box::new(Btrfs::new(
                volume,
                &config.btrfs.snapshot_dir,
                runner,
            )))
        }
        FilesystemKind::Zfs => {
            let zfs =
                Zfs::open(volume, &config.zfs.snapshot_prefix, options.recursive, runner).await?;
            Ok(Box::new(zfs))
        }
    }
}

/// Detect the filesystem of `volume` and build a matching backend.
pub async fn for_volume(
    volume: &str,
    options: VolumeOptions,
    config: &Configuration,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn SnapshotBackend>, BackendError> {
    let magic = filesystem_magic(Path::new(volume))?;
    let kind = FilesystemKind::from_magic(magic).ok_or_else(|| {
        BackendError::UnsupportedFilesystem {
            volume: volume.to_string(),
            magic,
        }
    })?;
    debug!(volume = %volume, kind = ?kind, "Detected filesystem");

    backend_for_kind(kind, volume, options, config, runner).await
}
