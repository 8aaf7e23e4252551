//! Tile grid coordinate types.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level.
///
/// The world at zoom 30 is 2^30 tiles wide, which keeps every tile index and
/// every wrapped index comfortably inside `i64`.
pub const MAX_ZOOM: u8 = 30;

/// Largest tile index magnitude accepted from pixel input (2^40).
const MAX_PIXEL_TILE_INDEX: f64 = 1_099_511_627_776.0;

/// Errors that can occur when building grid coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Zoom level outside [`MIN_ZOOM`]..=[`MAX_ZOOM`].
    #[error("Invalid zoom level: {0} (must be between 0 and 30)")]
    InvalidZoom(u8),

    /// A tile key string that is not of the form `x:y`.
    #[error("Invalid tile key '{0}': expected \"x:y\"")]
    InvalidKey(String),

    /// Bounds whose minimum corner lies beyond the maximum corner.
    #[error("Invalid tile bounds: min ({min_x}, {min_y}) exceeds max ({max_x}, {max_y})")]
    InvalidBounds {
        min_x: i64,
        min_y: i64,
        max_x: i64,
        max_y: i64,
    },

    /// Zoom level requested from the server after offset and reversal.
    #[error("Request zoom {0} is outside 0..=30")]
    RequestZoomOutOfRange(i32),

    /// Tile size of zero pixels.
    #[error("Invalid tile size: {0}")]
    InvalidTileSize(u32),

    /// Pixel coordinate that is not finite or lies far outside any grid.
    #[error("Invalid pixel coordinate: {0}")]
    InvalidPixelCoordinate(f64),
}

/// Identity of a tile within the active zoom level.
///
/// Rendered as `x:y`. Keys are only comparable within one zoom; the layer
/// tracks the active zoom separately and drops every key when it changes.
///
/// Keys order row-major (by `y`, then `x`) so that iterating a sorted map
/// visits tiles the way a reader scans the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Column (grows eastward).
    pub x: i64,
    /// Row (grows southward).
    pub y: i64,
}

impl TileKey {
    /// Create a new tile key.
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance from this tile to a fractional grid point.
    pub fn distance_to(&self, point: (f64, f64)) -> f64 {
        let dx = self.x as f64 - point.0;
        let dy = self.y as f64 - point.1;
        dx.hypot(dy)
    }
}

impl Ord for TileKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for TileKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

impl FromStr for TileKey {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(':')
            .ok_or_else(|| CoordError::InvalidKey(s.to_string()))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| CoordError::InvalidKey(s.to_string()))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| CoordError::InvalidKey(s.to_string()))?;
        Ok(Self { x, y })
    }
}

/// A tile coordinate: zoom level plus grid column and row.
///
/// Columns and rows are signed because a viewport that wraps around the
/// antimeridian legitimately asks for tiles left of column 0. Wrapping into
/// the world range happens only when a request URL is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    /// Zoom level.
    pub zoom: u8,
    /// Column (X).
    pub x: i64,
    /// Row (Y).
    pub y: i64,
}

impl TileCoord {
    /// Create a new tile coordinate.
    pub fn new(zoom: u8, x: i64, y: i64) -> Self {
        Self { zoom, x, y }
    }

    /// Create a tile coordinate from a key at the given zoom.
    pub fn from_key(zoom: u8, key: TileKey) -> Self {
        Self {
            zoom,
            x: key.x,
            y: key.y,
        }
    }

    /// The identity key of this coordinate within its zoom.
    pub fn key(&self) -> TileKey {
        TileKey::new(self.x, self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangle of tile indices covering a viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    /// Westernmost column.
    pub min_x: i64,
    /// Northernmost row.
    pub min_y: i64,
    /// Easternmost column.
    pub max_x: i64,
    /// Southernmost row.
    pub max_y: i64,
}

impl TileBounds {
    /// Create bounds from inclusive corner indices.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::InvalidBounds`] if a minimum exceeds its maximum.
    pub fn new(min_x: i64, min_y: i64, max_x: i64, max_y: i64) -> Result<Self, CoordError> {
        if min_x > max_x || min_y > max_y {
            return Err(CoordError::InvalidBounds {
                min_x,
                min_y,
                max_x,
                max_y,
            });
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    /// Derive tile bounds from projected pixel bounds.
    ///
    /// Each corner is divided by the tile size and floored, exactly as a
    /// renderer maps its pixel viewport onto the tile grid. NaN, infinite
    /// and absurdly large coordinates are rejected rather than saturated.
    ///
    /// # Arguments
    ///
    /// * `min_px` - North-west pixel corner `(x, y)`
    /// * `max_px` - South-east pixel corner `(x, y)`
    /// * `tile_size` - Edge length of a tile in pixels
    pub fn from_pixel_bounds(
        min_px: (f64, f64),
        max_px: (f64, f64),
        tile_size: u32,
    ) -> Result<Self, CoordError> {
        if tile_size == 0 {
            return Err(CoordError::InvalidTileSize(tile_size));
        }
        let size = tile_size as f64;
        Self::new(
            pixel_to_index(min_px.0, size)?,
            pixel_to_index(min_px.1, size)?,
            pixel_to_index(max_px.0, size)?,
            pixel_to_index(max_px.1, size)?,
        )
    }

    /// Fractional grid point at the centre of the bounds.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) as f64 / 2.0,
            (self.min_y + self.max_y) as f64 / 2.0,
        )
    }

    /// Whether a tile key lies inside the bounds.
    pub fn contains(&self, key: &TileKey) -> bool {
        key.x >= self.min_x && key.x <= self.max_x && key.y >= self.min_y && key.y <= self.max_y
    }

    /// Number of columns covered.
    pub fn width(&self) -> u64 {
        (self.max_x - self.min_x) as u64 + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> u64 {
        (self.max_y - self.min_y) as u64 + 1
    }

    /// Iterate every key in the bounds, row by row.
    pub fn keys(&self) -> impl Iterator<Item = TileKey> + '_ {
        (self.min_y..=self.max_y)
            .flat_map(move |y| (self.min_x..=self.max_x).map(move |x| TileKey::new(x, y)))
    }
}

fn pixel_to_index(px: f64, tile_size: f64) -> Result<i64, CoordError> {
    let index = (px / tile_size).floor();
    if !index.is_finite() || index.abs() > MAX_PIXEL_TILE_INDEX {
        return Err(CoordError::InvalidPixelCoordinate(px));
    }
    Ok(index as i64)
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}:{} .. {}:{}]",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}
