//! Feature store: cross-tile deduplication and merge grouping.
//!
//! The store runs under one of two mutually exclusive policies:
//!
//! - **Exact-id**: a feature whose id has already been seen is dropped. No
//!   geometry is merged; this only stops a feature present in two
//!   overlapping tiles from being rendered twice.
//! - **Merge-key**: a [`MergeKey`] assigns each feature a group key and all
//!   fragments sharing a key are kept together for the union engine.
//!
//! The store is rebuilt from scratch from the loaded tiles rather than
//! patched incrementally, which makes its contents independent of the order
//! in which tile fetches completed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::model::Feature;

/// Assigns the grouping identity shared by fragments of one logical feature.
pub trait MergeKey: Send + Sync {
    /// Returns the group key for a feature, or `None` to leave it ungrouped.
    fn key(&self, feature: &Feature) -> Option<String>;
}

impl<F> MergeKey for F
where
    F: Fn(&Feature) -> Option<String> + Send + Sync,
{
    fn key(&self, feature: &Feature) -> Option<String> {
        self(feature)
    }
}

/// Merge key read from a single feature property.
///
/// String values are used verbatim; other scalars use their JSON text.
/// Features where the property is missing or `null` stay ungrouped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyMergeKey {
    property: String,
}

impl PropertyMergeKey {
    /// Group by the named property.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }

    /// The property name.
    pub fn property(&self) -> &str {
        &self.property
    }
}

impl MergeKey for PropertyMergeKey {
    fn key(&self, feature: &Feature) -> Option<String> {
        match feature.property(&self.property)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// How features arriving from several tiles are reconciled.
#[derive(Clone)]
pub enum DedupPolicy {
    /// Drop features whose id was already seen.
    ExactId,
    /// Group fragments by key for geometry union.
    MergeKey(Arc<dyn MergeKey>),
}

impl DedupPolicy {
    /// Grouping policy from any [`MergeKey`].
    pub fn merge_by(key: impl MergeKey + 'static) -> Self {
        Self::MergeKey(Arc::new(key))
    }

    /// Grouping policy on a property name.
    pub fn merge_by_property(property: impl Into<String>) -> Self {
        Self::merge_by(PropertyMergeKey::new(property))
    }

    /// Whether geometry merging is enabled.
    pub fn is_merging(&self) -> bool {
        matches!(self, Self::MergeKey(_))
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::ExactId
    }
}

impl fmt::Debug for DedupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactId => write!(f, "ExactId"),
            Self::MergeKey(_) => write!(f, "MergeKey(..)"),
        }
    }
}

/// Fragments of one logical feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureGroup {
    /// Shared merge key.
    pub key: String,
    /// Fragments in ingestion order.
    pub fragments: Vec<Feature>,
}

/// What happened to an ingested feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Kept as a standalone feature.
    Kept,
    /// Dropped because its id was already seen.
    Duplicate,
    /// Appended to a merge group.
    Grouped,
}

/// Accumulates per-tile features under the configured [`DedupPolicy`].
#[derive(Debug, Default)]
pub struct FeatureStore {
    policy: DedupPolicy,
    seen_ids: HashSet<String>,
    features: Vec<Feature>,
    groups: Vec<FeatureGroup>,
    group_index: HashMap<String, usize>,
    duplicates: usize,
}

impl FeatureStore {
    /// Create an empty store.
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// The active policy.
    pub fn policy(&self) -> &DedupPolicy {
        &self.policy
    }

    /// Discard everything ingested so far.
    pub fn clear(&mut self) {
        self.seen_ids.clear();
        self.features.clear();
        self.groups.clear();
        self.group_index.clear();
        self.duplicates = 0;
    }

    /// Ingest one feature.
    pub fn ingest(&mut self, feature: Feature) -> Ingested {
        match &self.policy {
            DedupPolicy::ExactId => {
                if let Some(id) = &feature.id {
                    if !self.seen_ids.insert(id.dedup_key()) {
                        self.duplicates += 1;
                        return Ingested::Duplicate;
                    }
                }
                self.features.push(feature);
                Ingested::Kept
            }
            DedupPolicy::MergeKey(merge_key) => match merge_key.key(&feature) {
                Some(key) => {
                    match self.group_index.get(&key) {
                        Some(&index) => self.groups[index].fragments.push(feature),
                        None => {
                            self.group_index.insert(key.clone(), self.groups.len());
                            self.groups.push(FeatureGroup {
                                key,
                                fragments: vec![feature],
                            });
                        }
                    }
                    Ingested::Grouped
                }
                None => {
                    self.features.push(feature);
                    Ingested::Kept
                }
            },
        }
    }

    /// Clear the store and ingest every tile's fragments in the given order.
    pub fn rebuild<'a, I>(&mut self, tiles: I)
    where
        I: IntoIterator<Item = &'a [Feature]>,
    {
        self.clear();
        for fragments in tiles {
            for feature in fragments {
                self.ingest(feature.clone());
            }
        }
    }

    /// Standalone features (every kept feature under exact-id, ungrouped ones under merge-key).
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// Merge groups in first-seen order. Always empty under exact-id.
    pub fn groups(&self) -> &[FeatureGroup] {
        &self.groups
    }

    /// Number of features dropped as duplicates since the last clear.
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates
    }

    /// Whether nothing has been ingested.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty() && self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureId;
    use geo::{Geometry, Point};
    use serde_json::json;

    fn point(id: i64, x: f64) -> Feature {
        Feature::new(Point::new(x, 0.0)).with_id(id)
    }

    #[test]
    fn test_exact_id_drops_second_copy() {
        let mut store = FeatureStore::new(DedupPolicy::ExactId);

        assert_eq!(store.ingest(point(1, 0.0)), Ingested::Kept);
        assert_eq!(store.ingest(point(1, 5.0)), Ingested::Duplicate);
        assert_eq!(store.ingest(point(2, 0.0)), Ingested::Kept);

        assert_eq!(store.features().len(), 2);
        assert_eq!(store.duplicates_dropped(), 1);
        // First copy wins
        assert_eq!(
            store.features()[0].geometry,
            Geometry::from(Point::new(0.0, 0.0))
        );
    }

    #[test]
    fn test_exact_id_matches_numeric_and_string_forms() {
        let mut store = FeatureStore::new(DedupPolicy::ExactId);

        assert_eq!(store.ingest(point(7, 0.0)), Ingested::Kept);
        assert_eq!(
            store.ingest(Feature::new(Point::new(1.0, 0.0)).with_id("7")),
            Ingested::Duplicate
        );
        assert_eq!(
            store.ingest(Feature::new(Point::new(2.0, 0.0)).with_id("07")),
            Ingested::Kept
        );

        assert_eq!(store.features().len(), 2);
        // The first form seen is the one published
        assert_eq!(store.features()[0].id, Some(FeatureId::Number(7)));
    }

    #[test]
    fn test_exact_id_keeps_features_without_id() {
        let mut store = FeatureStore::new(DedupPolicy::ExactId);

        store.ingest(Feature::new(Point::new(0.0, 0.0)));
        store.ingest(Feature::new(Point::new(0.0, 0.0)));

        assert_eq!(store.features().len(), 2);
        assert_eq!(store.duplicates_dropped(), 0);
    }

    #[test]
    fn test_merge_key_groups_fragments() {
        let mut store = FeatureStore::new(DedupPolicy::merge_by_property("name"));

        let a = Feature::new(Point::new(0.0, 0.0)).with_property("name", "lake");
        let b = Feature::new(Point::new(1.0, 0.0)).with_property("name", "lake");
        let c = Feature::new(Point::new(2.0, 0.0)).with_property("name", "river");
        let loose = Feature::new(Point::new(3.0, 0.0));

        assert_eq!(store.ingest(a), Ingested::Grouped);
        assert_eq!(store.ingest(b), Ingested::Grouped);
        assert_eq!(store.ingest(c), Ingested::Grouped);
        assert_eq!(store.ingest(loose), Ingested::Kept);

        assert_eq!(store.groups().len(), 2);
        assert_eq!(store.groups()[0].key, "lake");
        assert_eq!(store.groups()[0].fragments.len(), 2);
        assert_eq!(store.groups()[1].key, "river");
        assert_eq!(store.features().len(), 1);
    }

    #[test]
    fn test_merge_key_does_not_dedupe_same_id() {
        let mut store = FeatureStore::new(DedupPolicy::merge_by_property("name"));

        store.ingest(point(1, 0.0).with_property("name", "a"));
        store.ingest(point(1, 1.0).with_property("name", "a"));

        assert_eq!(store.groups()[0].fragments.len(), 2);
    }

    #[test]
    fn test_closure_merge_key() {
        let policy = DedupPolicy::merge_by(|feature: &Feature| {
            feature
                .property("zone")
                .and_then(Value::as_i64)
                .map(|zone| format!("zone-{}", zone / 10))
        });
        let mut store = FeatureStore::new(policy);

        store.ingest(Feature::new(Point::new(0.0, 0.0)).with_property("zone", 11));
        store.ingest(Feature::new(Point::new(0.0, 0.0)).with_property("zone", 19));

        assert_eq!(store.groups().len(), 1);
        assert_eq!(store.groups()[0].key, "zone-1");
    }

    #[test]
    fn test_property_merge_key_scalars() {
        let key = PropertyMergeKey::new("k");
        let feature = |v: Value| Feature::new(Point::new(0.0, 0.0)).with_property("k", v);

        assert_eq!(key.key(&feature(json!("x"))), Some("x".to_string()));
        assert_eq!(key.key(&feature(json!(12))), Some("12".to_string()));
        assert_eq!(key.key(&feature(json!(true))), Some("true".to_string()));
        assert_eq!(key.key(&feature(Value::Null)), None);
        assert_eq!(key.key(&Feature::new(Point::new(0.0, 0.0))), None);
    }

    #[test]
    fn test_rebuild_replaces_previous_contents() {
        let mut store = FeatureStore::new(DedupPolicy::ExactId);
        store.ingest(point(9, 0.0));

        let tile_a = vec![point(1, 0.0), point(2, 0.0)];
        let tile_b = vec![point(2, 1.0), point(3, 0.0)];
        store.rebuild([tile_a.as_slice(), tile_b.as_slice()]);

        let ids: Vec<_> = store.features().iter().map(|f| f.id.clone()).collect();
        assert_eq!(
            ids,
            vec![
                Some(FeatureId::Number(1)),
                Some(FeatureId::Number(2)),
                Some(FeatureId::Number(3)),
            ]
        );
        assert_eq!(store.duplicates_dropped(), 1);
    }
}
