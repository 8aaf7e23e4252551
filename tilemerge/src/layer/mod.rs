//! The tile layer: one exclusive owner for scheduler, fetcher and store.
//!
//! [`TileLayer`] is the synchronous core. It is mutated only through
//! `&mut self`, which is what keeps the tile map and the aggregate
//! consistent while fetches complete in arbitrary order. [`LayerDaemon`]
//! runs a layer on a tokio task and exposes it through a [`LayerHandle`].

mod config;
mod daemon;
mod error;
mod events;
mod tile_layer;

pub use config::{LayerConfig, DEFAULT_EVENT_CAPACITY, DEFAULT_SUBDOMAINS, DEFAULT_TILE_SIZE};
pub use daemon::{LayerCommand, LayerDaemon, LayerHandle, DEFAULT_COMMAND_CAPACITY};
pub use error::LayerError;
pub use events::LayerEvent;
pub use tile_layer::{TileLayer, UpdateSummary, Viewport};
