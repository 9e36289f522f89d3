//! Grouping of observations by retention class.

use std::collections::BTreeMap;

use crate::observation::Observation;
use crate::retention::RetentionClass;

/// One slot in a class's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogEntry {
    /// A snapshot that exists on the volume.
    Snapshot(Observation),
    /// Stands in for a snapshot the plan is about to create. It counts
    /// towards the quota but can never be the target of an action.
    Placeholder,
}

impl CatalogEntry {
    pub fn observation(&self) -> Option<&Observation> {
        match self {
            CatalogEntry::Snapshot(observation) => Some(observation),
            CatalogEntry::Placeholder => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, CatalogEntry::Placeholder)
    }
}

/// Observations grouped per class, each group oldest first.
///
/// Sorting happens once, at construction. Placeholders are appended after
/// the sorted snapshots and are never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    groups: BTreeMap<RetentionClass, Vec<CatalogEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from an unordered inventory.
    ///
    /// Duplicates are kept as distinct entries. The sort is stable, so
    /// entries with equal timestamps keep their input order.
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut groups: BTreeMap<RetentionClass, Vec<Observation>> = BTreeMap::new();
        for observation in observations {
            groups
                .entry(observation.class())
                .or_default()
                .push(observation);
        }

        let groups = groups
            .into_iter()
            .map(|(class, mut observations)| {
                observations.sort_by_key(|o| o.timestamp());
                let entries = observations
                    .into_iter()
                    .map(CatalogEntry::Snapshot)
                    .collect();
                (class, entries)
            })
            .collect();

        Self { groups }
    }

    /// Entries for `class`, oldest snapshot first, placeholders last.
    pub fn entries(&self, class: RetentionClass) -> &[CatalogEntry] {
        self.groups.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Snapshots for `class`, oldest first, without placeholders.
    pub fn snapshots(&self, class: RetentionClass) -> impl Iterator<Item = &Observation> + '_ {
        self.entries(class)
            .iter()
            .filter_map(CatalogEntry::observation)
    }

    /// Number of entries held for `class`, placeholders included.
    pub fn count(&self, class: RetentionClass) -> usize {
        self.entries(class).len()
    }

    /// Classes with at least one entry, in iteration order.
    pub fn classes(&self) -> impl Iterator<Item = RetentionClass> + '_ {
        self.groups.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    /// Reserve a slot for a snapshot that will be created for `class`.
    pub(crate) fn push_placeholder(&mut self, class: RetentionClass) {
        self.groups
            .entry(class)
            .or_default()
            .push(CatalogEntry::Placeholder);
    }
}

impl FromIterator<Observation> for Catalog {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Catalog::from_observations(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(s: &str) -> Observation {
        s.parse().unwrap()
    }

    #[test]
    fn test_groups_and_sorts_by_class() {
        let catalog = Catalog::from_observations([
            obs("hourly@1972-11-07T14:50:13Z"),
            obs("daily@1972-11-05T00:00:00Z"),
            obs("hourly@1972-11-07T13:54:13Z"),
            obs("hourly@1972-11-07T19:54:13Z"),
            obs("daily@1972-11-01T00:00:00Z"),
        ]);

        let hourly: Vec<_> = catalog
            .snapshots(RetentionClass::Hourly)
            .map(|o| o.to_string())
            .collect();
        assert_eq!(
            hourly,
            vec![
                "hourly@1972-11-07T13:54:13Z",
                "hourly@1972-11-07T14:50:13Z",
                "hourly@1972-11-07T19:54:13Z",
            ]
        );

        let daily: Vec<_> = catalog
            .snapshots(RetentionClass::Daily)
            .map(|o| o.to_string())
            .collect();
        assert_eq!(
            daily,
            vec!["daily@1972-11-01T00:00:00Z", "daily@1972-11-05T00:00:00Z"]
        );

        assert_eq!(
            catalog.classes().collect::<Vec<_>>(),
            vec![RetentionClass::Hourly, RetentionClass::Daily]
        );
        assert_eq!(catalog.count(RetentionClass::Weekly), 0);
    }

    #[test]
    fn test_duplicates_are_kept() {
        let catalog = Catalog::from_observations([
            obs("hourly@1972-11-07T13:54:13Z"),
            obs("hourly@1972-11-07T13:54:13Z"),
        ]);
        assert_eq!(catalog.count(RetentionClass::Hourly), 2);
    }

    #[test]
    fn test_placeholder_is_appended_without_resorting() {
        let mut catalog: Catalog = [
            obs("hourly@1972-11-07T15:00:00Z"),
            obs("hourly@1972-11-07T13:00:00Z"),
        ]
        .into_iter()
        .collect();

        catalog.push_placeholder(RetentionClass::Hourly);
        catalog.push_placeholder(RetentionClass::Daily);

        let hourly = catalog.entries(RetentionClass::Hourly);
        assert_eq!(hourly.len(), 3);
        assert_eq!(
            hourly[0].observation().unwrap().to_string(),
            "hourly@1972-11-07T13:00:00Z"
        );
        assert!(hourly[2].is_placeholder());

        assert_eq!(catalog.count(RetentionClass::Daily), 1);
        assert_eq!(catalog.snapshots(RetentionClass::Daily).count(), 0);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = Catalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.entries(RetentionClass::Hourly).is_empty());
        assert_eq!(catalog.classes().count(), 0);
    }
}
