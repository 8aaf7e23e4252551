//! Layer errors.

use thiserror::Error;

use crate::coord::CoordError;
use crate::provider::ProviderError;

/// Errors surfaced by the layer API.
///
/// Tile-level failures are not errors at this level; they become
/// [`LayerEvent::TileError`](super::LayerEvent::TileError) events.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Bounds, zoom or request zoom out of range.
    #[error(transparent)]
    Coord(#[from] CoordError),

    /// URL template or HTTP client setup failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The daemon task is no longer running.
    #[error("Layer daemon is not running")]
    DaemonStopped,
}
