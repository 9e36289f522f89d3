//! Retention classes and their freshness windows.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;

/// A retention tier. Each class is evaluated independently of the others.
///
/// The derived ordering follows declaration order, which is also ascending
/// freshness window. It is only used to make per-class iteration
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionClass {
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl RetentionClass {
    /// Every known class, in iteration order.
    pub const ALL: [RetentionClass; 6] = [
        RetentionClass::Minutely,
        RetentionClass::Hourly,
        RetentionClass::Daily,
        RetentionClass::Weekly,
        RetentionClass::Monthly,
        RetentionClass::Yearly,
    ];

    /// Parse a class from its canonical name.
    ///
    /// Matching is exact: `"Hourly"` is rejected just like `"taeglich"`.
    pub fn parse(name: &str) -> Result<Self, PolicyError> {
        match name {
            "minutely" => Ok(RetentionClass::Minutely),
            "hourly" => Ok(RetentionClass::Hourly),
            "daily" => Ok(RetentionClass::Daily),
            "weekly" => Ok(RetentionClass::Weekly),
            "monthly" => Ok(RetentionClass::Monthly),
            "yearly" => Ok(RetentionClass::Yearly),
            _ => Err(PolicyError::InvalidClass(name.to_string())),
        }
    }

    /// Canonical name, as used in snapshot names and configuration keys.
    pub fn name(&self) -> &'static str {
        match self {
            RetentionClass::Minutely => "minutely",
            RetentionClass::Hourly => "hourly",
            RetentionClass::Daily => "daily",
            RetentionClass::Weekly => "weekly",
            RetentionClass::Monthly => "monthly",
            RetentionClass::Yearly => "yearly",
        }
    }

    /// Length of the freshness window in seconds.
    pub fn freshness_window_secs(&self) -> i64 {
        match self {
            RetentionClass::Minutely => 60,
            RetentionClass::Hourly => 3600,
            RetentionClass::Daily => 86_400,
            RetentionClass::Weekly => 7 * 86_400,
            RetentionClass::Monthly => 30 * 86_400,
            RetentionClass::Yearly => 360 * 86_400,
        }
    }

    /// How long a snapshot of this class counts as current.
    pub fn freshness_window(&self) -> Duration {
        Duration::seconds(self.freshness_window_secs())
    }
}

impl fmt::Display for RetentionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RetentionClass {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RetentionClass::parse(s)
    }
}
