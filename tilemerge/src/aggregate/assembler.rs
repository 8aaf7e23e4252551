//! Rebuilds the aggregate from the loaded tiles.

use serde_json::{Map, Value};
use tracing::debug;

use super::collection::AggregateFeatureCollection;
use crate::feature::{DedupPolicy, Feature, FeatureStore};
use crate::tile::TileRecord;
use crate::union::{GeometryUnionEngine, PropertyPrecedence, UnionStats};

/// Counters from one rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    /// Tiles that contributed.
    pub tiles: usize,
    /// Features in the output.
    pub features: usize,
    /// Features dropped as exact-id duplicates.
    pub duplicates_dropped: usize,
    /// Merge groups unioned.
    pub groups_merged: usize,
    /// Union counters summed over every group.
    pub union: UnionStats,
}

/// Combines the feature store and the union engine into one rebuild step.
///
/// Every rebuild starts from an empty store, so the result depends only on
/// which tiles are loaded and the order they are passed in.
#[derive(Debug)]
pub struct AggregateAssembler {
    store: FeatureStore,
    engine: GeometryUnionEngine,
}

impl AggregateAssembler {
    /// Create an assembler.
    ///
    /// # Arguments
    ///
    /// * `policy` - Exact-id deduplication or merge-key grouping
    /// * `precedence` - Which fragment's attributes merged features keep
    pub fn new(policy: DedupPolicy, precedence: PropertyPrecedence) -> Self {
        Self {
            store: FeatureStore::new(policy),
            engine: GeometryUnionEngine::new(precedence),
        }
    }

    pub fn policy(&self) -> &DedupPolicy {
        self.store.policy()
    }

    /// Rebuild the aggregate from loaded tiles.
    ///
    /// Tiles must be given in ascending key order. Standalone features come
    /// first in ingestion order, followed by one merged feature per group in
    /// first-seen order. Top-level payload members are last-write-wins.
    pub fn assemble<'a, I>(&mut self, tiles: I) -> (AggregateFeatureCollection, AggregateStats)
    where
        I: IntoIterator<Item = &'a TileRecord>,
    {
        let tiles: Vec<&TileRecord> = tiles.into_iter().collect();

        let mut properties: Map<String, Value> = Map::new();
        for record in &tiles {
            properties.extend(record.top_level_properties());
        }

        let (features, stats) =
            self.assemble_features(tiles.iter().map(|record| record.fragments()));

        (
            AggregateFeatureCollection {
                features,
                properties,
            },
            stats,
        )
    }

    /// Deduplicate or merge features from several sources.
    ///
    /// Same ordering rules as [`assemble`](Self::assemble); each source
    /// counts as one tile in the stats.
    pub fn assemble_features<'a, I>(&mut self, sources: I) -> (Vec<Feature>, AggregateStats)
    where
        I: IntoIterator<Item = &'a [Feature]>,
    {
        let sources: Vec<&[Feature]> = sources.into_iter().collect();
        let mut stats = AggregateStats {
            tiles: sources.len(),
            ..Default::default()
        };

        self.store.rebuild(sources);
        stats.duplicates_dropped = self.store.duplicates_dropped();

        let mut features = self.store.features().to_vec();
        for group in self.store.groups() {
            if let Some((merged, union)) = self.engine.union_group(group) {
                stats.union.absorb(&union);
                stats.groups_merged += 1;
                features.push(merged);
            }
        }
        stats.features = features.len();

        debug!(
            tiles = stats.tiles,
            features = stats.features,
            duplicates = stats.duplicates_dropped,
            groups = stats.groups_merged,
            "Aggregate rebuilt"
        );

        (features, stats)
    }
}
