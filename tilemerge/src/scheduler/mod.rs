//! Tile grid scheduling.
//!
//! The scheduler owns the map of active [`TileRecord`](crate::tile::TileRecord)s
//! and answers three questions for the layer: which coordinates a viewport
//! still needs (and in what order), which records fell out of view, and
//! where on the server a scheduled coordinate actually lives.
//!
//! ```text
//! viewport bounds + zoom
//!        │
//!        ├─► evict_outside ──► records to cancel
//!        └─► plan ──► [centre-out coordinates] ──► schedule ──► RequestId
//! ```

mod grid;
mod policy;

pub use grid::TileGridScheduler;
pub use policy::{GridPolicy, DEFAULT_MAX_ZOOM, DEFAULT_MIN_ZOOM};
