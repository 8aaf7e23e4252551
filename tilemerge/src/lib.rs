//! tilemerge - tiled GeoJSON as one feature collection
//!
//! A [`TileLayer`](layer::TileLayer) requests the GeoJSON tiles covering a
//! viewport, nearest to the centre first, and folds whatever arrives into a
//! single [`AggregateFeatureCollection`](aggregate::AggregateFeatureCollection):
//!
//! - features repeated across tiles are dropped by id, or
//! - fragments sharing a merge key are dissolved into one geometry by
//!   cancelling the edges they share along tile seams.
//!
//! Zoom changes, panning and resets discard in-flight work; late results
//! from discarded requests are recognised and ignored.
//!
//! # Modules
//!
//! - [`coord`] - tile keys, coordinates and bounds
//! - [`feature`] - features, GeoJSON parsing, dedup and grouping store
//! - [`union`] - edge-cancellation union of grouped fragments
//! - [`tile`] - per-tile lifecycle records
//! - [`scheduler`] - which tiles to request, and in what order
//! - [`provider`] - URL templates and the HTTP client seam
//! - [`fetcher`] - cancellable concurrent tile downloads
//! - [`aggregate`] - rebuilding the published collection
//! - [`layer`] - the layer, its events and its daemon
//! - [`config`] - `config.ini` loading
//! - [`logging`] - tracing subscriber setup

pub mod aggregate;
pub mod config;
pub mod coord;
pub mod feature;
pub mod fetcher;
pub mod layer;
pub mod logging;
pub mod provider;
pub mod scheduler;
pub mod tile;
pub mod union;
