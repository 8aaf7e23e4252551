//! Tile lifecycle records.
//!
//! A [`TileRecord`] is created when the scheduler plans a coordinate and
//! lives until the tile is evicted or the layer is reset. It moves from
//! `Pending` to exactly one terminal state and never back.

mod record;

pub use record::{RequestId, TileRecord, TileState, TileStateError};
