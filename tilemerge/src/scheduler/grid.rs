//! Tile map ownership and fetch planning.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use super::policy::GridPolicy;
use crate::coord::{CoordError, TileBounds, TileCoord, TileKey};
use crate::tile::{RequestId, TileRecord, TileState};

/// Owns the active tile map and decides what to load and what to drop.
///
/// Records are keyed by [`TileKey`] within the active zoom; a zoom change
/// goes through [`reset`](Self::reset) so that keys from two zoom levels
/// never coexist.
#[derive(Debug)]
pub struct TileGridScheduler {
    policy: GridPolicy,
    zoom: Option<u8>,
    tiles: BTreeMap<TileKey, TileRecord>,
    next_request: u64,
}

impl TileGridScheduler {
    /// Create a scheduler with an empty tile map.
    pub fn new(policy: GridPolicy) -> Self {
        Self {
            policy,
            zoom: None,
            tiles: BTreeMap::new(),
            next_request: 0,
        }
    }

    pub fn policy(&self) -> &GridPolicy {
        &self.policy
    }

    /// Zoom of the records currently held, if any update has happened.
    pub fn active_zoom(&self) -> Option<u8> {
        self.zoom
    }

    /// Make `zoom` the active zoom.
    ///
    /// # Returns
    ///
    /// The records dropped because the zoom changed. Empty when the zoom
    /// was already active.
    pub fn activate_zoom(&mut self, zoom: u8) -> Vec<TileRecord> {
        if self.zoom == Some(zoom) {
            return Vec::new();
        }
        let dropped = self.reset();
        self.zoom = Some(zoom);
        dropped
    }

    /// Coordinates that should be fetched for `bounds` at `zoom`.
    ///
    /// Excludes positions already in the tile map (when `zoom` is the
    /// active zoom) and positions outside the world. The result is sorted
    /// by distance from the bounds centre; equal distances keep row-major
    /// order. A zoom outside the policy range yields nothing.
    pub fn plan(&self, bounds: &TileBounds, zoom: u8) -> Result<Vec<TileCoord>, CoordError> {
        if !self.policy.accepts_zoom(zoom) {
            debug!(zoom, "Zoom outside configured range, nothing to plan");
            return Ok(Vec::new());
        }

        let Some(visible) = self.policy.clamp_to_world(bounds, zoom)? else {
            debug!(zoom, bounds = %bounds, "Bounds lie outside the world, nothing to plan");
            return Ok(Vec::new());
        };

        let same_zoom = self.zoom == Some(zoom);
        let mut keys = Vec::new();
        for key in visible.keys() {
            if same_zoom && self.tiles.contains_key(&key) {
                continue;
            }
            if !self.policy.in_world(&key, zoom)? {
                continue;
            }
            keys.push(key);
        }

        let center = bounds.center();
        keys.sort_by(|a, b| {
            a.distance_to(center)
                .partial_cmp(&b.distance_to(center))
                .unwrap_or(Ordering::Equal)
        });

        Ok(keys
            .into_iter()
            .map(|key| TileCoord::from_key(zoom, key))
            .collect())
    }

    /// Create a pending record for a planned coordinate.
    ///
    /// # Returns
    ///
    /// The request id issued for the record, or `None` if the coordinate
    /// is not at the active zoom or already has a record.
    pub fn schedule(&mut self, coord: TileCoord, url: impl Into<String>) -> Option<RequestId> {
        if self.zoom != Some(coord.zoom) || self.tiles.contains_key(&coord.key()) {
            return None;
        }
        self.next_request += 1;
        let request_id = RequestId(self.next_request);
        self.tiles
            .insert(coord.key(), TileRecord::new(coord, request_id, url));
        Some(request_id)
    }

    /// Remove every record outside `bounds`.
    pub fn evict_outside(&mut self, bounds: &TileBounds) -> Vec<TileRecord> {
        let outside: Vec<TileKey> = self
            .tiles
            .keys()
            .filter(|key| !bounds.contains(key))
            .copied()
            .collect();

        let evicted: Vec<TileRecord> = outside
            .iter()
            .filter_map(|key| self.tiles.remove(key))
            .collect();

        if !evicted.is_empty() {
            debug!(count = evicted.len(), bounds = %bounds, "Evicted tiles outside bounds");
        }
        evicted
    }

    /// Drop every record and forget the active zoom.
    pub fn reset(&mut self) -> Vec<TileRecord> {
        self.zoom = None;
        std::mem::take(&mut self.tiles).into_values().collect()
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileRecord> {
        self.tiles.get(key)
    }

    /// The record for `key`, only if it is still served by `request_id`.
    pub fn current_mut(
        &mut self,
        key: &TileKey,
        request_id: RequestId,
    ) -> Option<&mut TileRecord> {
        self.tiles
            .get_mut(key)
            .filter(|record| record.request_id() == request_id)
    }

    /// All records in key order.
    pub fn records(&self) -> impl Iterator<Item = &TileRecord> {
        self.tiles.values()
    }

    /// Loaded records in key order.
    pub fn loaded(&self) -> impl Iterator<Item = &TileRecord> {
        self.tiles
            .values()
            .filter(|record| record.state() == TileState::Loaded)
    }

    /// Number of records still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.tiles
            .values()
            .filter(|record| record.state() == TileState::Pending)
            .count()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
