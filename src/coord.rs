//! Pyramid coordinate system.
//!
//! Pure functions defining level and tile-index semantics. Level 0 is the
//! most zoomed-out (coarsest) level; level `levels - 1` is full resolution.
//! A level `z` is scaled down from full resolution by `2^(levels - 1 - z)`.
//!
//! The reported level count is backend-authoritative. Backends whose native
//! pyramid follows the standard halving scheme can derive it with
//! [`expected_levels`], but the validation functions here only ever consult
//! the count they are given.

use crate::error::CoordinateError;

/// A validated tile address within a pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoordinate {
    /// Pyramid level (0 = most zoomed out)
    pub z: u32,

    /// Tile column (0 = left edge)
    pub x: u32,

    /// Tile row (0 = top edge)
    pub y: u32,
}

/// Expected level count for a pyramid that halves until one tile covers the
/// image: `ceil(log2(max(size_x / tile_width, size_y / tile_height))) + 1`.
///
/// Backends with a different native pyramid may report another count; the
/// reported count wins.
pub fn expected_levels(size_x: u32, size_y: u32, tile_width: u32, tile_height: u32) -> u32 {
    let tiles_x = size_x.div_ceil(tile_width);
    let tiles_y = size_y.div_ceil(tile_height);
    let span = tiles_x.max(tiles_y).max(1);
    // ceil(log2(span)) for span >= 1
    let log = 32 - (span - 1).leading_zeros();
    log + 1
}

/// Downsample factor of `level` relative to full resolution.
pub fn level_scale(level: u32, levels: u32) -> u64 {
    debug_assert!(level < levels);
    1u64 << (levels - 1 - level)
}

/// Pixel dimensions of a pyramid level, rounding partial pixels up.
pub fn level_dimensions(level: u32, levels: u32, size_x: u32, size_y: u32) -> (u32, u32) {
    let scale = level_scale(level, levels);
    (
        u64::from(size_x).div_ceil(scale) as u32,
        u64::from(size_y).div_ceil(scale) as u32,
    )
}

/// Number of tile columns and rows at a level, rounding partial tiles up.
pub fn tile_grid(
    level: u32,
    levels: u32,
    size_x: u32,
    size_y: u32,
    tile_width: u32,
    tile_height: u32,
) -> (u32, u32) {
    let (width, height) = level_dimensions(level, levels, size_x, size_y);
    (width.div_ceil(tile_width), height.div_ceil(tile_height))
}

/// Validate a raw `(z, x, y)` against pyramid bounds.
///
/// Negative values are reported before range checks so the two failure
/// classes stay distinguishable at the boundary. `cols` and `rows` are the
/// grid dimensions at level `z`.
pub fn validate(
    z: i64,
    x: i64,
    y: i64,
    levels: u32,
    cols: u32,
    rows: u32,
) -> Result<(), CoordinateError> {
    for (field, value) in [("z", z), ("x", x), ("y", y)] {
        if value < 0 {
            return Err(CoordinateError::Negative { field, value });
        }
    }
    for (field, value, limit) in [("z", z, levels), ("x", x, cols), ("y", y, rows)] {
        if value >= i64::from(limit) {
            return Err(CoordinateError::OutOfRange {
                field,
                value,
                limit,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_levels_single_tile() {
        // Image no larger than one tile: one level
        assert_eq!(expected_levels(256, 256, 256, 256), 1);
        assert_eq!(expected_levels(100, 50, 256, 256), 1);
    }

    #[test]
    fn test_expected_levels_standard_pyramid() {
        assert_eq!(expected_levels(512, 512, 256, 256), 2);
        assert_eq!(expected_levels(1024, 1024, 256, 256), 3);
        // Asymmetric: the larger axis dominates
        assert_eq!(expected_levels(1024, 256, 256, 256), 3);
    }

    #[test]
    fn test_expected_levels_whole_slide_scenario() {
        // 100k x 100k with 1024 tiles: ceil(log2(ceil(100000/1024))) + 1 = 8
        assert_eq!(expected_levels(100_000, 100_000, 1024, 1024), 8);
    }

    #[test]
    fn test_no_overflow_near_dimension_limits() {
        assert_eq!(expected_levels(u32::MAX, u32::MAX, 256, 256), 25);
        assert_eq!(tile_grid(24, 25, u32::MAX, 512, 256, 256), (16_777_216, 2));
        assert_eq!(level_dimensions(0, 25, u32::MAX, 512), (256, 1));
    }

    #[test]
    fn test_level_scale() {
        assert_eq!(level_scale(0, 8), 128);
        assert_eq!(level_scale(7, 8), 1);
        assert_eq!(level_scale(0, 1), 1);
    }

    #[test]
    fn test_level_dimensions_rounds_up() {
        // 100000 / 128 = 781.25 -> 782
        assert_eq!(level_dimensions(0, 8, 100_000, 100_000), (782, 782));
        assert_eq!(level_dimensions(7, 8, 100_000, 100_000), (100_000, 100_000));
    }

    #[test]
    fn test_tile_grid() {
        assert_eq!(tile_grid(0, 8, 100_000, 100_000, 1024, 1024), (1, 1));
        // 100000 / 1024 = 97.66 -> 98 at full resolution
        assert_eq!(tile_grid(7, 8, 100_000, 100_000, 1024, 1024), (98, 98));
        // Asymmetric image
        assert_eq!(tile_grid(1, 2, 1000, 400, 256, 256), (4, 2));
    }

    #[test]
    fn test_validate_accepts_in_range() {
        assert!(validate(0, 0, 0, 8, 1, 1).is_ok());
        assert!(validate(7, 97, 97, 8, 98, 98).is_ok());
    }

    #[test]
    fn test_validate_negative() {
        let err = validate(-1, 0, 0, 8, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::Negative { field: "z", value: -1 }
        ));

        let err = validate(0, -3, 0, 8, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::Negative { field: "x", value: -3 }
        ));

        let err = validate(0, 0, -7, 8, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::Negative { field: "y", value: -7 }
        ));
    }

    #[test]
    fn test_validate_negative_reported_before_range() {
        // z out of range AND y negative: negative wins
        let err = validate(99, 0, -1, 8, 1, 1).unwrap_err();
        assert!(matches!(err, CoordinateError::Negative { field: "y", .. }));
    }

    #[test]
    fn test_validate_out_of_range() {
        let err = validate(8, 0, 0, 8, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::OutOfRange { field: "z", value: 8, limit: 8 }
        ));

        let err = validate(0, 1, 0, 8, 1, 1).unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfRange { field: "x", .. }));

        let err = validate(0, 0, 5, 8, 1, 3).unwrap_err();
        assert!(matches!(
            err,
            CoordinateError::OutOfRange { field: "y", value: 5, limit: 3 }
        ));
    }
}
