//! Grid addressing policy: which zooms are served, where the world ends,
//! and how a scheduled position maps onto the server's tile scheme.

use crate::coord::{
    flip_y, world_size, wrap_x, CoordError, TileBounds, TileCoord, TileKey, MAX_ZOOM,
};

/// Default minimum zoom.
pub const DEFAULT_MIN_ZOOM: u8 = 0;

/// Default maximum zoom.
pub const DEFAULT_MAX_ZOOM: u8 = 18;

/// Zoom range and world-bound rules for a tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridPolicy {
    /// Lowest zoom at which tiles are scheduled.
    pub min_zoom: u8,
    /// Highest zoom at which tiles are scheduled.
    pub max_zoom: u8,
    /// Forbid columns outside the world instead of wrapping them.
    pub no_wrap: bool,
    /// Treat the grid as unbounded: no world checks and no wrapping.
    pub continuous_world: bool,
    /// Rows count from the south (TMS) on the server.
    pub tms: bool,
    /// Added to the zoom used in request URLs.
    pub zoom_offset: i8,
    /// Request `max_zoom - zoom` instead of `zoom`.
    pub zoom_reverse: bool,
}

impl Default for GridPolicy {
    fn default() -> Self {
        Self {
            min_zoom: DEFAULT_MIN_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            no_wrap: false,
            continuous_world: false,
            tms: false,
            zoom_offset: 0,
            zoom_reverse: false,
        }
    }
}

impl GridPolicy {
    /// Whether tiles are scheduled at all at this zoom.
    pub fn accepts_zoom(&self, zoom: u8) -> bool {
        zoom >= self.min_zoom && zoom <= self.max_zoom
    }

    /// Zoom level used in request URLs.
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::RequestZoomOutOfRange`] when the offset or
    /// reversal pushes the zoom outside the supported range.
    pub fn request_zoom(&self, zoom: u8) -> Result<u8, CoordError> {
        let mut z = zoom as i32;
        if self.zoom_reverse {
            z = self.max_zoom as i32 - z;
        }
        z += self.zoom_offset as i32;

        if z < 0 || z > MAX_ZOOM as i32 {
            return Err(CoordError::RequestZoomOutOfRange(z));
        }
        Ok(z as u8)
    }

    /// Number of tiles along one world edge, at the request zoom.
    pub fn wrap_limit(&self, zoom: u8) -> Result<i64, CoordError> {
        world_size(self.request_zoom(zoom)?)
    }

    /// Whether a position lies inside the world.
    ///
    /// Rows outside the world are always rejected; columns only under
    /// `no_wrap`. Under `continuous_world` every position is accepted.
    pub fn in_world(&self, key: &TileKey, zoom: u8) -> Result<bool, CoordError> {
        if self.continuous_world {
            return Ok(true);
        }
        let limit = self.wrap_limit(zoom)?;
        let row_ok = (0..limit).contains(&key.y);
        let column_ok = !self.no_wrap || (0..limit).contains(&key.x);
        Ok(row_ok && column_ok)
    }

    /// Cut `bounds` down to the part [`in_world`](Self::in_world) can accept.
    ///
    /// Rows are clamped to the world, columns too under `no_wrap`. Wrapped
    /// columns and `continuous_world` bounds pass through unchanged.
    ///
    /// # Returns
    ///
    /// `None` when no position of `bounds` lies inside the world.
    pub fn clamp_to_world(
        &self,
        bounds: &TileBounds,
        zoom: u8,
    ) -> Result<Option<TileBounds>, CoordError> {
        if self.continuous_world {
            return Ok(Some(*bounds));
        }
        let last = self.wrap_limit(zoom)? - 1;

        let (min_x, max_x) = if self.no_wrap {
            (bounds.min_x.max(0), bounds.max_x.min(last))
        } else {
            (bounds.min_x, bounds.max_x)
        };
        let min_y = bounds.min_y.max(0);
        let max_y = bounds.max_y.min(last);

        Ok(TileBounds::new(min_x, min_y, max_x, max_y).ok())
    }

    /// Map a scheduled coordinate onto the position the server holds.
    ///
    /// Applies the request zoom, horizontal wrap (unless `no_wrap` or
    /// `continuous_world`) and the TMS row flip.
    pub fn request_position(&self, coord: TileCoord) -> Result<TileCoord, CoordError> {
        let zoom = self.request_zoom(coord.zoom)?;
        let limit = world_size(zoom)?;

        let mut x = coord.x;
        let mut y = coord.y;
        if !self.continuous_world && !self.no_wrap {
            x = wrap_x(x, limit);
        }
        if self.tms {
            y = flip_y(y, limit);
        }
        Ok(TileCoord::new(zoom, x, y))
    }
}
