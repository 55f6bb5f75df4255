//! Backend for ordinary raster image files.
//!
//! Opens anything the `image` crate can decode (PNG, JPEG, ...) and exposes
//! it as a pyramid by downsampling the decoded image in memory at open time.
//! Format parsing stays entirely inside the `image` crate; this backend only
//! supplies the pyramid view on top.
//!
//! The whole image is held decoded in memory, one buffer per level, so this
//! backend suits moderately sized images. Dedicated streaming decoders for
//! huge formats plug in as separate backends.

use std::fs::File;
use std::io::Read;

use image::imageops::{self, FilterType};
use image::{ImageReader, RgbImage};
use serde_json::json;

use crate::codec::Encoding;
use crate::coord::TileCoordinate;
use crate::error::{OpenError, TileError};

use super::{Backend, Confidence, InternalMetadata, OpenRequest, TileMetadata, TileSource};

const TILE_SIZE: u32 = 256;

/// Bytes read for the header sniff.
const SNIFF_BYTES: usize = 64;

// =============================================================================
// Backend
// =============================================================================

/// Backend that opens plain raster files through the `image` crate.
pub struct FileImageBackend;

impl Backend for FileImageBackend {
    fn name(&self) -> &'static str {
        "image"
    }

    fn can_open(&self, request: &OpenRequest) -> Confidence {
        if request.path.starts_with(super::TEST_SCHEME) {
            return Confidence::None;
        }
        let mut header = [0u8; SNIFF_BYTES];
        let read = File::open(&request.path)
            .and_then(|mut f| f.read(&mut header))
            .unwrap_or(0);
        match image::guess_format(&header[..read]) {
            Ok(_) => Confidence::Medium,
            Err(_) => Confidence::None,
        }
    }

    fn open(&self, request: &OpenRequest) -> Result<Box<dyn TileSource>, OpenError> {
        Ok(Box::new(FileImageSource::open(request)?))
    }
}

// =============================================================================
// Source
// =============================================================================

/// An opened raster file with an in-memory pyramid, coarsest level first.
pub struct FileImageSource {
    metadata: TileMetadata,
    internal: InternalMetadata,
    levels: Vec<RgbImage>,
}

impl FileImageSource {
    pub fn open(request: &OpenRequest) -> Result<Self, OpenError> {
        let reader = ImageReader::open(&request.path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| OpenError::Unreadable {
                path: request.path.clone(),
                message: e.to_string(),
            })?;
        let format = reader.format();
        let full = reader
            .decode()
            .map_err(|e| OpenError::UnsupportedFormat {
                reason: e.to_string(),
            })?
            .to_rgb8();

        let (size_x, size_y) = full.dimensions();
        let level_count = crate::coord::expected_levels(size_x, size_y, TILE_SIZE, TILE_SIZE);

        let metadata = TileMetadata {
            size_x,
            size_y,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            levels: level_count,
            magnification: None,
        };

        let mut levels = Vec::with_capacity(level_count as usize);
        for z in 0..level_count {
            if z == level_count - 1 {
                continue; // full resolution appended below
            }
            let (w, h) = metadata.level_dimensions(z);
            levels.push(imageops::resize(&full, w, h, FilterType::Lanczos3));
        }
        levels.push(full);

        let mut internal = InternalMetadata::new();
        internal.insert("backend".to_string(), json!("image"));
        if let Some(format) = format {
            internal.insert(
                "sourceFormat".to_string(),
                json!(format.extensions_str().first().copied().unwrap_or("unknown")),
            );
        }

        Ok(Self {
            metadata,
            internal,
            levels,
        })
    }
}

impl TileSource for FileImageSource {
    fn metadata(&self) -> &TileMetadata {
        &self.metadata
    }

    fn internal_metadata(&self) -> &InternalMetadata {
        &self.internal
    }

    fn tile_encoding(&self) -> Encoding {
        Encoding::Jpeg
    }

    fn decode_tile(&self, coord: TileCoordinate) -> Result<RgbImage, TileError> {
        let level = self
            .levels
            .get(coord.z as usize)
            .ok_or_else(|| TileError::DecodeFailed {
                message: format!("level {} missing from pyramid", coord.z),
            })?;
        let (level_w, level_h) = level.dimensions();
        let x0 = coord.x * TILE_SIZE;
        let y0 = coord.y * TILE_SIZE;
        let width = TILE_SIZE.min(level_w - x0);
        let height = TILE_SIZE.min(level_h - y0);
        Ok(imageops::crop_imm(level, x0, y0, width, height).to_image())
    }

    fn decode_level(&self, level: u32) -> Result<RgbImage, TileError> {
        self.levels
            .get(level as usize)
            .cloned()
            .ok_or_else(|| TileError::DecodeFailed {
                message: format!("level {level} missing from pyramid"),
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
