//! Test configuration builder for creating test setups quickly.

use crate::config::{Configuration, VolumeOptions, VolumePolicy, normalize_volume};
use policy::RetentionClass;

/// Builder for creating test configurations without going through a file.
#[derive(Debug, Clone, Default)]
pub struct TestConfigBuilder {
    config: Configuration,
}

impl TestConfigBuilder {
    /// Start from the built-in defaults with no volumes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a volume with the given keep counts.
    pub fn with_volume<I>(mut self, volume: &str, schedule: I) -> Self
    where
        I: IntoIterator<Item = (RetentionClass, usize)>,
    {
        self.config.targets.insert(
            normalize_volume(volume),
            VolumePolicy {
                schedule: schedule.into_iter().collect(),
                options: VolumeOptions::default(),
            },
        );
        self
    }

    /// Mark an already added volume as recursive.
    pub fn recursive(mut self, volume: &str) -> Self {
        if let Some(policy) = self.config.targets.get_mut(&normalize_volume(volume)) {
            policy.options.recursive = true;
        }
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.config.dry_run = true;
        self
    }

    pub fn with_snapshot_dir(mut self, dir: &str) -> Self {
        self.config.btrfs.snapshot_dir = dir.to_string();
        self
    }

    pub fn with_snapshot_prefix(mut self, prefix: &str) -> Self {
        self.config.zfs.snapshot_prefix = prefix.to_string();
        self
    }

    pub fn build(self) -> Configuration {
        self.config
    }
}
