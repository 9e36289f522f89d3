use std::path::PathBuf;
use thiserror::Error;

use policy::Observation;

/// Errors raised while scanning or mutating a volume's snapshots.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Listing the existing snapshots failed.
    #[error("Failed to scan snapshots of {volume}: {source}")]
    Scan {
        volume: String,
        source: Box<BackendError>,
    },

    /// Creating a snapshot failed.
    #[error("Failed to create {snapshot}: {source}")]
    Create {
        snapshot: Observation,
        source: Box<BackendError>,
    },

    /// Deleting a snapshot failed.
    #[error("Failed to delete {snapshot}: {source}")]
    Delete {
        snapshot: Observation,
        source: Box<BackendError>,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command '{program} {args}' failed with {status}")]
    CommandFailed {
        program: String,
        args: String,
        status: String,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported filesystem type {magic:#X} at {volume}")]
    UnsupportedFilesystem { volume: String, magic: i64 },

    #[error("Volume {0}: btrfs does not support recursive snapshots")]
    RecursiveUnsupported(String),

    #[error("No ZFS dataset is mounted at {0}")]
    MountNotFound(String),

    #[error("Unexpected output from {program}: '{line}'")]
    UnexpectedOutput { program: String, line: String },
}

impl BackendError {
    pub(crate) fn scan(volume: impl Into<String>, source: BackendError) -> Self {
        BackendError::Scan {
            volume: volume.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn create(snapshot: &Observation, source: BackendError) -> Self {
        BackendError::Create {
            snapshot: *snapshot,
            source: Box::new(source),
        }
    }

    pub(crate) fn delete(snapshot: &Observation, source: BackendError) -> Self {
        BackendError::Delete {
            snapshot: *snapshot,
            source: Box::new(source),
        }
    }
}
