//! A single snapshot observation and its canonical text form.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PolicyError;
use crate::retention::RetentionClass;

/// Separator between class name and timestamp in a snapshot name.
pub const SEPARATOR: char = '@';

/// One existing or proposed snapshot.
///
/// Timestamps have second granularity; anything finer is dropped on
/// construction so that the text form round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Observation {
    timestamp: DateTime<Utc>,
    class: RetentionClass,
}

impl Observation {
    pub fn new(class: RetentionClass, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            class,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn class(&self) -> RetentionClass {
        self.class
    }

    /// Whether the snapshot is still inside its class's freshness window.
    ///
    /// The window end is exclusive: a snapshot taken exactly one window
    /// before `now` is no longer current.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        match self
            .timestamp
            .checked_add_signed(self.class.freshness_window())
        {
            Some(expires) => expires > now,
            // Window ends beyond the representable range.
            None => true,
        }
    }

    /// Canonical name: `<class>@<RFC3339 UTC, second precision>`.
    pub fn name(&self) -> String {
        format!(
            "{}{}{}",
            self.class,
            SEPARATOR,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Observation {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, timestamp) = s
            .split_once(SEPARATOR)
            .ok_or_else(|| PolicyError::malformed(s, "missing '@' separator"))?;
        if timestamp.contains(SEPARATOR) {
            return Err(PolicyError::malformed(s, "more than one '@' separator"));
        }

        let class = RetentionClass::parse(class)
            .map_err(|e| PolicyError::malformed(s, e.to_string()))?;
        let timestamp = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| PolicyError::malformed(s, format!("invalid timestamp: {e}")))?;

        Ok(Observation::new(class, timestamp.with_timezone(&Utc)))
    }
}

impl From<Observation> for String {
    fn from(observation: Observation) -> Self {
        observation.name()
    }
}

impl TryFrom<String> for Observation {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_name_formatting() {
        let cases = [
            (Observation::new(RetentionClass::Hourly, at(0)), "hourly@1970-01-01T00:00:00Z"),
            (Observation::new(RetentionClass::Daily, at(86400)), "daily@1970-01-02T00:00:00Z"),
            (
                Observation::new(RetentionClass::Weekly, at(86400 * 3)),
                "weekly@1970-01-04T00:00:00Z",
            ),
            (
                Observation::new(RetentionClass::Yearly, at(853520053)),
                "yearly@1997-01-17T16:54:13Z",
            ),
        ];

        for (observation, want) in cases {
            assert_eq!(observation.to_string(), want);
        }
    }

    #[test]
    fn test_parse_valid_names() {
        let parsed: Observation = "monthly@1997-01-17T16:54:14Z".parse().unwrap();
        assert_eq!(parsed, Observation::new(RetentionClass::Monthly, at(853520054)));

        let parsed: Observation = "hourly@1997-01-17T16:54:21Z".parse().unwrap();
        assert_eq!(parsed.class(), RetentionClass::Hourly);
        assert_eq!(parsed.timestamp(), at(853520061));
    }

    #[test]
    fn test_parse_normalises_offsets_to_utc() {
        let parsed: Observation = "daily@1997-01-17T18:54:13+02:00".parse().unwrap();
        assert_eq!(parsed.timestamp(), at(853520053));
        assert_eq!(parsed.to_string(), "daily@1997-01-17T16:54:13Z");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for input in [
            "foo-",
            "hourly",
            "hourly@",
            "taeglich@1997-01-17T16:54:21Z",
            "hourly@1997-01-17",
            "hourly@1997-01-17T16:54:21Z@extra",
            "@1997-01-17T16:54:21Z",
        ] {
            let err = input.parse::<Observation>().unwrap_err();
            assert!(
                matches!(err, PolicyError::MalformedObservation { .. }),
                "{input} should be malformed, got {err:?}"
            );
        }
    }

    #[test]
    fn test_subsecond_precision_is_dropped() {
        let precise = at(1000) + chrono::Duration::milliseconds(750);
        let observation = Observation::new(RetentionClass::Minutely, precise);
        assert_eq!(observation.timestamp(), at(1000));
        assert_eq!(
            observation.to_string().parse::<Observation>().unwrap(),
            observation
        );
    }

    #[test]
    fn test_is_current() {
        let now = at(80061);
        let cases = [
            (Observation::new(RetentionClass::Weekly, at(80000)), true),
            (Observation::new(RetentionClass::Hourly, at(90000)), true),
            (Observation::new(RetentionClass::Minutely, at(80002)), true),
            // Exactly at the window boundary.
            (Observation::new(RetentionClass::Minutely, at(80001)), false),
            (Observation::new(RetentionClass::Minutely, at(0)), false),
        ];

        for (observation, want) in cases {
            assert_eq!(observation.is_current(now), want, "{observation}");
        }
    }

    #[test]
    fn test_serde_uses_canonical_name() {
        let observation = Observation::new(RetentionClass::Hourly, at(90000123));
        let json = serde_json::to_string(&observation).unwrap();
        assert_eq!(json, "\"hourly@1972-11-07T16:02:03Z\"");

        let back: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, observation);

        assert!(serde_json::from_str::<Observation>("\"bogus\"").is_err());
    }
}
