use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};

use policy::{KeepPolicy, PolicyError, RetentionClass};

mod entries;

/// Where the configuration is read from unless told otherwise.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/minisnap.conf";

/// Prefix for environment overrides, e.g. `MINISNAP__DRY_RUN=true`.
pub const ENV_PREFIX: &str = "MINISNAP__";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BtrfsConfig {
    /// Directory below the volume root that holds the snapshot subvolumes
    pub snapshot_dir: String,
}

impl Default for BtrfsConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: ".snapshots".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZfsConfig {
    /// Prefix that marks snapshots managed by this tool
    pub snapshot_prefix: String,
}

impl Default for ZfsConfig {
    fn default() -> Self {
        Self {
            snapshot_prefix: "msnap_".to_string(),
        }
    }
}

/// Non-policy options of a volume.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct VolumeOptions {
    /// Snapshot child datasets as well (ZFS only)
    #[serde(default)]
    pub recursive: bool,
}

/// A volume entry as written in the file, before validation.
///
/// Keys written without a value (`schedule:`) read as empty.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
struct TargetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schedule: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<VolumeOptions>,
}

/// The file/env document as extracted by figment, before validation.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    btrfs: BtrfsConfig,
    #[serde(default)]
    zfs: ZfsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    targets: Option<BTreeMap<String, Option<TargetConfig>>>,
}

/// Validated retention settings of one volume.
#[derive(Clone, Debug, Serialize, Default, PartialEq, Eq)]
pub struct VolumePolicy {
    pub schedule: BTreeMap<RetentionClass, usize>,
    pub options: VolumeOptions,
}

impl VolumePolicy {
    /// Keep counts of this volume evaluated against `now`.
    pub fn keep_policy(&self, now: DateTime<Utc>) -> KeepPolicy {
        KeepPolicy::from_counts(now, self.schedule.iter().map(|(c, n)| (*c, *n)))
    }

    /// Whether at least one class asks for a snapshot to be kept.
    pub fn keeps_anything(&self) -> bool {
        self.schedule.values().any(|&n| n > 0)
    }
}

#[derive(Clone, Debug, Serialize, Default, PartialEq, Eq)]
pub struct Configuration {
    /// Log commands instead of executing them
    pub dry_run: bool,
    pub btrfs: BtrfsConfig,
    pub zfs: ZfsConfig,
    /// Volume policies keyed by normalised volume path
    pub targets: BTreeMap<String, VolumePolicy>,
}

impl Configuration {
    /// Load the YAML file at `path`, layered over defaults and under
    /// `MINISNAP__` environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Same as [`Configuration::load_from_path`] for an in-memory document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        entries::check_unique_entries(text)?;

        let file: ConfigFile = Figment::from(Serialized::defaults(ConfigFile::default()))
            .merge(Yaml::string(text))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(Box::new)?;

        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut targets = BTreeMap::new();

        for (volume, target) in file.targets.unwrap_or_default() {
            let target = target.unwrap_or_default();
            let mut schedule = BTreeMap::new();
            for (name, count) in target.schedule.unwrap_or_default() {
                let class =
                    RetentionClass::parse(&name).map_err(|source| ConfigError::InvalidClass {
                        volume: volume.clone(),
                        source,
                    })?;
                let count = usize::try_from(count).map_err(|_| ConfigError::NegativeKeepCount {
                    volume: volume.clone(),
                    class,
                    count,
                })?;
                schedule.insert(class, count);
            }

            let policy = VolumePolicy {
                schedule,
                options: target.options.unwrap_or_default(),
            };
            if targets.insert(normalize_volume(&volume), policy).is_some() {
                return Err(ConfigError::DuplicateConfigEntry(DuplicateEntry::Volume(
                    volume,
                )));
            }
        }

        Ok(Self {
            dry_run: file.dry_run,
            btrfs: file.btrfs,
            zfs: file.zfs,
            targets,
        })
    }

    /// Policy of `volume`, looked up by its normalised path.
    pub fn volume(&self, volume: &str) -> Result<&VolumePolicy, ConfigError> {
        self.targets
            .get(&normalize_volume(volume))
            .ok_or_else(|| ConfigError::UnknownVolume(volume.to_string()))
    }

    pub fn keep_policy(&self, volume: &str, now: DateTime<Utc>) -> Result<KeepPolicy, ConfigError> {
        Ok(self.volume(volume)?.keep_policy(now))
    }
}

/// Lexically clean a volume path: drop `.` segments, repeated and trailing
/// separators, and resolve `..` where a parent is known.
pub fn normalize_volume(volume: &str) -> String {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in Path::new(volume).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    let cleaned: PathBuf = parts.iter().collect();
    if cleaned.as_os_str().is_empty() {
        ".".to_string()
    } else {
        cleaned.to_string_lossy().into_owned()
    }
}

/// Which entry of the configuration was defined more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateEntry {
    Volume(String),
    Class { volume: String, class: String },
}

impl fmt::Display for DuplicateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateEntry::Volume(volume) => {
                write!(f, "volume '{volume}' defined multiple times")
            }
            DuplicateEntry::Class { volume, class } => {
                write!(f, "volume '{volume}' defines class '{class}' multiple times")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to load configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    #[error("Duplicate configuration entry: {0}")]
    DuplicateConfigEntry(DuplicateEntry),

    #[error("Volume '{volume}': {source}")]
    InvalidClass {
        volume: String,
        #[source]
        source: PolicyError,
    },

    #[error("Volume '{volume}': keep count for {class} must not be negative, got {count}")]
    NegativeKeepCount {
        volume: String,
        class: RetentionClass,
        count: i64,
    },

    #[error("Volume '{0}' is not defined in the configuration")]
    UnknownVolume(String),
}
