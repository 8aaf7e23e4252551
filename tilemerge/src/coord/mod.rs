//! Tile grid coordinates.
//!
//! Provides the tile identity types used across the crate and the small
//! amount of grid arithmetic needed to turn a scheduled tile into the tile a
//! server actually holds (world size, horizontal wrap, TMS row flip).

mod types;

pub use types::{CoordError, TileBounds, TileCoord, TileKey, MAX_ZOOM, MIN_ZOOM};

/// Number of tiles along one edge of the world at a zoom level.
///
/// # Errors
///
/// Returns [`CoordError::InvalidZoom`] for zoom levels above [`MAX_ZOOM`].
#[inline]
pub fn world_size(zoom: u8) -> Result<i64, CoordError> {
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }
    Ok(1i64 << zoom)
}

/// Wraps a column index into `[0, limit)`.
///
/// Used when the world repeats horizontally: column `-1` at zoom 2 is the
/// same tile as column `3`.
#[inline]
pub fn wrap_x(x: i64, limit: i64) -> i64 {
    x.rem_euclid(limit)
}

/// Flips a row index between XYZ (north-origin) and TMS (south-origin).
#[inline]
pub fn flip_y(y: i64, limit: i64) -> i64 {
    limit - y - 1
}
