//! Geometry union ("dissolve") of fragments split across tile boundaries.
//!
//! When a tile server clips a feature at tile edges, every tile carries a
//! fragment whose boundary includes the cut line. Adjacent fragments trace
//! that cut line in opposite directions, so flattening all fragments into
//! directed edges and cancelling exact opposite pairs leaves only the outer
//! boundary of the original feature.
//!
//! # Architecture
//!
//! ```text
//! fragments ──► EdgeMultiset ──► reconstruct ──► Pieces::collapse ──► Feature
//!               (flatten +        (deterministic     (bare / Multi* /
//!                cancel)           chain walk)        collection)
//! ```
//!
//! This is deliberately not a topological polygon union. Only coordinates
//! that match bit for bit cancel, and interior rings are dropped.
//!
//! # Example
//!
//! ```ignore
//! use tilemerge::union::{GeometryUnionEngine, PropertyPrecedence};
//!
//! let engine = GeometryUnionEngine::new(PropertyPrecedence::FirstFragment);
//! if let Some((merged, stats)) = engine.union(&group.fragments) {
//!     println!("{} pairs cancelled", stats.cancelled_pairs);
//! }
//! ```

mod edges;
mod reconstruct;

pub use edges::{coord_key, EdgeMultiset};
pub use reconstruct::{reconstruct, Pieces};

use std::fmt;
use std::str::FromStr;

use geo::Geometry;
use thiserror::Error;
use tracing::debug;

use crate::feature::{Feature, FeatureGroup, FeatureId, Properties};

/// Which fragment supplies the merged feature's id and properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PropertyPrecedence {
    /// The first fragment's id and properties.
    #[default]
    FirstFragment,
    /// The last fragment's id and properties.
    LastFragment,
    /// The union of all fragments' properties; earlier fragments win conflicting keys.
    Merge,
}

/// Error parsing a [`PropertyPrecedence`] name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown property precedence '{0}' (expected first, last or merge)")]
pub struct ParsePrecedenceError(pub String);

impl FromStr for PropertyPrecedence {
    type Err = ParsePrecedenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first" => Ok(Self::FirstFragment),
            "last" => Ok(Self::LastFragment),
            "merge" => Ok(Self::Merge),
            other => Err(ParsePrecedenceError(other.to_string())),
        }
    }
}

impl fmt::Display for PropertyPrecedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstFragment => write!(f, "first"),
            Self::LastFragment => write!(f, "last"),
            Self::Merge => write!(f, "merge"),
        }
    }
}

/// Counters describing one union.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnionStats {
    /// Number of input fragments.
    pub fragments: usize,
    /// Opposite edge pairs that cancelled.
    pub cancelled_pairs: usize,
    /// Directed edges left after cancellation.
    pub surviving_edges: usize,
    /// Polygon interior rings that were dropped.
    pub dropped_interiors: usize,
}

impl UnionStats {
    /// Accumulate another union's counters.
    pub fn absorb(&mut self, other: &UnionStats) {
        self.fragments += other.fragments;
        self.cancelled_pairs += other.cancelled_pairs;
        self.surviving_edges += other.surviving_edges;
        self.dropped_interiors += other.dropped_interiors;
    }
}

/// Union a set of geometries.
///
/// The result depends only on the multiset of input geometries, not on
/// their order, and unioning a result again returns it unchanged.
pub fn union_geometries<'a, I>(geometries: I) -> (Geometry<f64>, UnionStats)
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    let mut multiset = EdgeMultiset::new();
    let mut fragments = 0;
    for geometry in geometries {
        multiset.add_geometry(geometry);
        fragments += 1;
    }

    let stats = UnionStats {
        fragments,
        cancelled_pairs: multiset.cancelled_pairs(),
        surviving_edges: multiset.edge_count(),
        dropped_interiors: multiset.dropped_interiors(),
    };

    (reconstruct(multiset).collapse(), stats)
}

/// Merges the fragments of one logical feature into a single feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryUnionEngine {
    precedence: PropertyPrecedence,
}

impl GeometryUnionEngine {
    /// Create an engine with the given property precedence.
    pub fn new(precedence: PropertyPrecedence) -> Self {
        Self { precedence }
    }

    /// The configured property precedence.
    pub fn precedence(&self) -> PropertyPrecedence {
        self.precedence
    }

    /// Union a list of fragments.
    ///
    /// # Returns
    ///
    /// The merged feature and its counters, or `None` for an empty list.
    pub fn union(&self, fragments: &[Feature]) -> Option<(Feature, UnionStats)> {
        let (id, properties) = self.assemble_attributes(fragments)?;
        let (geometry, stats) = union_geometries(fragments.iter().map(|f| &f.geometry));

        if stats.dropped_interiors > 0 {
            debug!(
                fragments = stats.fragments,
                dropped_interiors = stats.dropped_interiors,
                "Interior rings dropped during union"
            );
        }

        Some((
            Feature {
                id,
                geometry,
                properties,
            },
            stats,
        ))
    }

    /// Union one merge group from the feature store.
    pub fn union_group(&self, group: &FeatureGroup) -> Option<(Feature, UnionStats)> {
        let result = self.union(&group.fragments);
        if let Some((_, stats)) = &result {
            debug!(
                key = %group.key,
                fragments = stats.fragments,
                cancelled = stats.cancelled_pairs,
                "Merged feature group"
            );
        }
        result
    }

    fn assemble_attributes(&self, fragments: &[Feature]) -> Option<(Option<FeatureId>, Properties)> {
        match self.precedence {
            PropertyPrecedence::FirstFragment => {
                let first = fragments.first()?;
                Some((first.id.clone(), first.properties.clone()))
            }
            PropertyPrecedence::LastFragment => {
                let last = fragments.last()?;
                Some((last.id.clone(), last.properties.clone()))
            }
            PropertyPrecedence::Merge => {
                if fragments.is_empty() {
                    return None;
                }
                let id = fragments.iter().find_map(|f| f.id.clone());
                let mut properties = Properties::new();
                for fragment in fragments {
                    for (key, value) in &fragment.properties {
                        if !properties.contains_key(key) {
                            properties.insert(key.clone(), value.clone());
                        }
                    }
                }
                Some((id, properties))
            }
        }
    }
}
