//! Order-preserving view of YAML mappings.
//!
//! figment merges every source into maps, so a key written twice in the
//! configuration file silently collapses into one. The raw document is
//! walked with this visitor first to catch such duplicates.

use serde::de::{Deserialize, Deserializer, IgnoredAny, MapAccess, Visitor};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use super::{ConfigError, DuplicateEntry, normalize_volume};

/// Every key/value pair of a mapping, in document order, duplicates included.
pub(crate) struct Entries<V>(pub(crate) Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Entries<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for EntriesVisitor<V> {
            type Value = Entries<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
                Ok(Entries(Vec::new()))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

#[derive(serde::Deserialize)]
struct RawDocument {
    #[serde(default)]
    targets: Option<Entries<Option<RawTarget>>>,
}

#[derive(serde::Deserialize)]
struct RawTarget {
    #[serde(default)]
    schedule: Option<Entries<IgnoredAny>>,
}

/// Reject volumes or classes that appear more than once in `text`.
///
/// Volume keys are compared after normalisation, so `/srv` and `/srv/`
/// collide.
pub(crate) fn check_unique_entries(text: &str) -> Result<(), ConfigError> {
    if text.trim().is_empty() {
        return Ok(());
    }

    let document: RawDocument = serde_yaml::from_str(text)?;
    let Some(Entries(targets)) = document.targets else {
        return Ok(());
    };

    let mut volumes = HashSet::new();
    for (volume, target) in &targets {
        if !volumes.insert(normalize_volume(volume)) {
            return Err(ConfigError::DuplicateConfigEntry(DuplicateEntry::Volume(
                volume.clone(),
            )));
        }

        let Some(Entries(schedule)) = target.as_ref().and_then(|t| t.schedule.as_ref()) else {
            continue;
        };
        let mut classes = HashSet::new();
        for (class, _) in schedule {
            if !classes.insert(class.as_str()) {
                return Err(ConfigError::DuplicateConfigEntry(DuplicateEntry::Class {
                    volume: volume.clone(),
                    class: class.clone(),
                }));
            }
        }
    }

    Ok(())
}
