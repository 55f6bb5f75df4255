//! Synthetic deterministic tile source.
//!
//! Generates procedural tiles without reading any file, so the coordinate
//! system and encoding pipeline can be validated independent of real
//! decoders. Every pixel is a pure function of the open parameters and the
//! global pixel position, so tile bytes are identical across repeated calls
//! and across process restarts.
//!
//! Recognized parameters: `minLevel`, `maxLevel`, `tileWidth`, `tileHeight`,
//! `sizeX`, `sizeY`, `fractal` (draws a Sierpinski overlay), `encoding`.

use image::{Rgb, RgbImage};
use serde_json::json;

use crate::codec::Encoding;
use crate::coord::TileCoordinate;
use crate::error::{CoordinateError, OpenError, TileError, ValidationError};

use super::{Backend, Confidence, InternalMetadata, OpenRequest, TileMetadata, TileSource};

/// Scheme prefix that selects the synthetic backend.
pub const TEST_SCHEME: &str = "test://";

const DEFAULT_TILE_SIZE: u32 = 256;
const DEFAULT_MAX_LEVEL: u32 = 9;

/// Largest accepted `maxLevel`; scales past this cannot address 32-bit
/// pixel space.
const MAX_LEVEL_LIMIT: u32 = 30;

// =============================================================================
// Backend
// =============================================================================

/// Backend that serves synthetic test pyramids for `test://` references.
pub struct TestPatternBackend;

impl Backend for TestPatternBackend {
    fn name(&self) -> &'static str {
        "test"
    }

    fn can_open(&self, request: &OpenRequest) -> Confidence {
        if request.path == "test" || request.path.starts_with(TEST_SCHEME) {
            Confidence::High
        } else {
            Confidence::None
        }
    }

    fn open(&self, request: &OpenRequest) -> Result<Box<dyn TileSource>, OpenError> {
        Ok(Box::new(TestTileSource::from_request(request)?))
    }
}

// =============================================================================
// Source
// =============================================================================

/// Procedural pyramid with deterministic tile content.
pub struct TestTileSource {
    metadata: TileMetadata,
    internal: InternalMetadata,
    min_level: u32,
    fractal: bool,
    encoding: Encoding,
}

impl TestTileSource {
    /// Build a source from open parameters.
    ///
    /// Missing dimensions default to a full pyramid over `maxLevel`
    /// (`tileWidth << maxLevel` pixels per axis); a missing `maxLevel`
    /// defaults to 9, or is derived from the sizes when those are given.
    pub fn from_request(request: &OpenRequest) -> Result<Self, ValidationError> {
        let tile_width = positive(request.param_u32("tileWidth")?, "tileWidth", DEFAULT_TILE_SIZE)?;
        let tile_height =
            positive(request.param_u32("tileHeight")?, "tileHeight", DEFAULT_TILE_SIZE)?;
        let min_level = request.param_u32("minLevel")?.unwrap_or(0);
        let explicit_max = request.param_u32("maxLevel")?;
        let size_x = request.param_u32("sizeX")?;
        let size_y = request.param_u32("sizeY")?;

        let max_level = match (explicit_max, size_x, size_y) {
            (Some(level), ..) => level,
            (None, Some(sx), Some(sy)) => {
                crate::coord::expected_levels(sx, sy, tile_width, tile_height) - 1
            }
            (None, ..) => DEFAULT_MAX_LEVEL,
        };
        if max_level > MAX_LEVEL_LIMIT {
            return Err(ValidationError::InvalidParameter {
                field: "maxLevel",
                message: format!("must be at most {MAX_LEVEL_LIMIT}, got {max_level}"),
            });
        }
        if min_level > max_level {
            return Err(ValidationError::InvalidParameter {
                field: "minLevel",
                message: format!("minLevel {min_level} exceeds maxLevel {max_level}"),
            });
        }

        let size_x = positive(size_x, "sizeX", tile_width << max_level.min(21))?;
        let size_y = positive(size_y, "sizeY", tile_height << max_level.min(21))?;

        let fractal = request.param_bool("fractal")?.unwrap_or(false);
        let encoding = match request.param_str("encoding")? {
            Some(name) => name.parse()?,
            None => Encoding::Jpeg,
        };

        let metadata = TileMetadata {
            size_x,
            size_y,
            tile_width,
            tile_height,
            levels: max_level + 1,
            magnification: None,
        };

        let mut internal = InternalMetadata::new();
        internal.insert("backend".to_string(), json!("test"));
        internal.insert("fractal".to_string(), json!(fractal));
        internal.insert("minLevel".to_string(), json!(min_level));
        internal.insert("maxLevel".to_string(), json!(max_level));

        Ok(Self {
            metadata,
            internal,
            min_level,
            fractal,
            encoding,
        })
    }

    /// Pixel color at a global position within a level. Pure.
    fn pixel(&self, level: u32, gx: u32, gy: u32) -> Rgb<u8> {
        if self.fractal && (gx & gy) == 0 {
            return Rgb([255, 255, 255]);
        }
        let r = (gx ^ gy) as u8;
        let g = (gx.wrapping_add(gy) >> 1) as u8;
        let b = (level.wrapping_mul(23))
            .wrapping_add(gx / 17)
            .wrapping_add(gy / 29) as u8;
        Rgb([r, g, b])
    }

    fn check_min_level(&self, level: u32) -> Result<(), TileError> {
        if level < self.min_level {
            // Levels below minLevel do not exist in this pyramid.
            return Err(TileError::InvalidCoordinate(CoordinateError::OutOfRange {
                field: "z",
                value: i64::from(level),
                limit: self.min_level,
            }));
        }
        Ok(())
    }
}

impl TileSource for TestTileSource {
    fn metadata(&self) -> &TileMetadata {
        &self.metadata
    }

    fn internal_metadata(&self) -> &InternalMetadata {
        &self.internal
    }

    fn tile_encoding(&self) -> Encoding {
        self.encoding
    }

    fn decode_tile(&self, coord: TileCoordinate) -> Result<RgbImage, TileError> {
        self.check_min_level(coord.z)?;
        let (level_w, level_h) = self.metadata.level_dimensions(coord.z);
        let x0 = coord.x * self.metadata.tile_width;
        let y0 = coord.y * self.metadata.tile_height;
        let width = self.metadata.tile_width.min(level_w - x0);
        let height = self.metadata.tile_height.min(level_h - y0);
        Ok(RgbImage::from_fn(width, height, |px, py| {
            self.pixel(coord.z, x0 + px, y0 + py)
        }))
    }

    fn decode_level(&self, level: u32) -> Result<RgbImage, TileError> {
        // The lowest level that actually exists bounds thumbnail derivation.
        let level = level.max(self.min_level);
        let (width, height) = self.metadata.level_dimensions(level);
        Ok(RgbImage::from_fn(width, height, |px, py| {
            self.pixel(level, px, py)
        }))
    }
}

fn positive(
    value: Option<u32>,
    field: &'static str,
    default: u32,
) -> Result<u32, ValidationError> {
    let value = value.unwrap_or(default);
    if value == 0 {
        return Err(ValidationError::InvalidParameter {
            field,
            message: "must be a positive integer".to_string(),
        });
    }
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================
