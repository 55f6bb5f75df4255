//! Immutable per-source metadata.

use serde::Serialize;

use crate::coord::{self, TileCoordinate};
use crate::error::CoordinateError;

/// Backend-specific diagnostic metadata.
///
/// An opaque key/value bag (format version, channel layout, acquisition
/// parameters). The core never interprets it, only passes it through.
pub type InternalMetadata = serde_json::Map<String, serde_json::Value>;

/// Immutable snapshot of a source's pyramid geometry.
///
/// Computed once at open time and returned by value thereafter. `levels` is
/// backend-authoritative: the coordinate system validates against the
/// reported count even when it differs from [`TileMetadata::expected_levels`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileMetadata {
    /// Full-resolution width in pixels
    pub size_x: u32,

    /// Full-resolution height in pixels
    pub size_y: u32,

    /// Native tile width in pixels
    pub tile_width: u32,

    /// Native tile height in pixels
    pub tile_height: u32,

    /// Number of pyramid levels (level 0 = most zoomed out)
    pub levels: u32,

    /// Physical scale factor (e.g. objective magnification), if known
    pub magnification: Option<f64>,
}

impl TileMetadata {
    /// Level count a standard halving pyramid with these dimensions would
    /// have. Backends may report a different native count.
    pub fn expected_levels(&self) -> u32 {
        coord::expected_levels(self.size_x, self.size_y, self.tile_width, self.tile_height)
    }

    /// Pixel dimensions of a level.
    pub fn level_dimensions(&self, level: u32) -> (u32, u32) {
        coord::level_dimensions(level, self.levels, self.size_x, self.size_y)
    }

    /// Tile columns and rows at a level.
    pub fn tile_grid(&self, level: u32) -> (u32, u32) {
        coord::tile_grid(
            level,
            self.levels,
            self.size_x,
            self.size_y,
            self.tile_width,
            self.tile_height,
        )
    }

    /// Validate raw coordinates against this pyramid.
    ///
    /// Negative values are rejected first, then the level, then the column
    /// and row against the grid at that level.
    pub fn validate_coordinate(
        &self,
        z: i64,
        x: i64,
        y: i64,
    ) -> Result<TileCoordinate, CoordinateError> {
        for (field, value) in [("z", z), ("x", x), ("y", y)] {
            if value < 0 {
                return Err(CoordinateError::Negative { field, value });
            }
        }
        if z >= i64::from(self.levels) {
            return Err(CoordinateError::OutOfRange {
                field: "z",
                value: z,
                limit: self.levels,
            });
        }
        let (cols, rows) = self.tile_grid(z as u32);
        coord::validate(z, x, y, self.levels, cols, rows)?;
        Ok(TileCoordinate {
            z: z as u32,
            x: x as u32,
            y: y as u32,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
