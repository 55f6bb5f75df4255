//! Pixel-buffer encoding.
//!
//! One encoding path shared by tiles and thumbnails: decoded RGB pixels go
//! in, a MIME-typed byte payload comes out. PNG is lossless and ignores the
//! JPEG knobs; JPEG honors quality and chroma subsampling. Both encoders are
//! deterministic, so identical pixels and settings always produce identical
//! bytes.

use std::str::FromStr;

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use jpeg_encoder::{ColorType, Encoder as JpegEncoder, SamplingFactor};
use serde::{Deserialize, Serialize};

use crate::error::{TileError, ValidationError};

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

// =============================================================================
// Encoding
// =============================================================================

/// Output encoding for tiles and thumbnails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    Png,
    Jpeg,
}

impl Encoding {
    /// MIME type for payloads in this encoding.
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Encoding::Png => "image/png",
            Encoding::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for Encoding {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PNG" => Ok(Encoding::Png),
            "JPEG" | "JPG" => Ok(Encoding::Jpeg),
            other => Err(ValidationError::InvalidParameter {
                field: "encoding",
                message: format!("expected PNG or JPEG, got {other:?}"),
            }),
        }
    }
}

// =============================================================================
// Chroma subsampling
// =============================================================================

/// JPEG chroma subsampling mode.
///
/// Indices match the request surface: 0, 1, and 2 mean full, half, and
/// quarter resolution chroma respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ChromaSubsampling {
    /// 4:4:4 (no subsampling)
    #[default]
    Full,
    /// 4:2:2 (half horizontal chroma resolution)
    Half,
    /// 4:2:0 (quarter chroma resolution)
    Quarter,
}

impl ChromaSubsampling {
    /// Interpret the numeric request parameter.
    pub fn from_index(index: i64) -> Result<Self, ValidationError> {
        match index {
            0 => Ok(ChromaSubsampling::Full),
            1 => Ok(ChromaSubsampling::Half),
            2 => Ok(ChromaSubsampling::Quarter),
            other => Err(ValidationError::InvalidParameter {
                field: "jpegSubsampling",
                message: format!("expected 0, 1, or 2, got {other}"),
            }),
        }
    }

    fn sampling_factor(&self) -> SamplingFactor {
        match self {
            ChromaSubsampling::Full => SamplingFactor::F_1_1,
            ChromaSubsampling::Half => SamplingFactor::F_2_1,
            ChromaSubsampling::Quarter => SamplingFactor::F_2_2,
        }
    }
}

// =============================================================================
// Encoded payload
// =============================================================================

/// An encoded image payload with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Bytes,
    pub mime_type: &'static str,
}

/// Validate a JPEG quality parameter.
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Encode RGB pixels to the requested output encoding.
///
/// `quality` and `subsampling` apply to JPEG only and are ignored for PNG.
pub fn encode(
    pixels: &RgbImage,
    encoding: Encoding,
    quality: u8,
    subsampling: ChromaSubsampling,
) -> Result<EncodedImage, TileError> {
    let (width, height) = pixels.dimensions();
    let mut output = Vec::new();

    match encoding {
        Encoding::Png => {
            PngEncoder::new(&mut output)
                .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgb8)
                .map_err(|e| TileError::EncodeFailed {
                    message: e.to_string(),
                })?;
        }
        Encoding::Jpeg => {
            // The JPEG container caps dimensions at 16 bits per axis.
            let (w, h) = (
                u16::try_from(width).map_err(|_| too_large(width))?,
                u16::try_from(height).map_err(|_| too_large(height))?,
            );
            let mut encoder = JpegEncoder::new(&mut output, quality);
            encoder.set_sampling_factor(subsampling.sampling_factor());
            encoder
                .encode(pixels.as_raw(), w, h, ColorType::Rgb)
                .map_err(|e| TileError::EncodeFailed {
                    message: e.to_string(),
                })?;
        }
    }

    Ok(EncodedImage {
        data: Bytes::from(output),
        mime_type: encoding.mime_type(),
    })
}

fn too_large(dimension: u32) -> TileError {
    TileError::EncodeFailed {
        message: format!("dimension {dimension} exceeds JPEG limit of 65535"),
    }
}

// =============================================================================
// Tests
// =============================================================================
