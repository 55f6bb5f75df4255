//! Thumbnail derivation.
//!
//! A thumbnail is the lowest-detail pyramid level resized to fit within a
//! bounding box, then encoded. Deriving from level 0 keeps the operation
//! cheap on arbitrarily large sources at the cost of fidelity when the
//! requested bounds exceed the coarse level's resolution; upscaling is
//! allowed and simply yields a soft image.

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::codec::{self, ChromaSubsampling, EncodedImage, Encoding};
use crate::error::{TileError, ValidationError};
use crate::source::{TileMetadata, TileSource};

/// Default bounding box edge when the request gives no dimensions.
pub const DEFAULT_THUMBNAIL_EDGE: u32 = 256;

// =============================================================================
// Request
// =============================================================================

/// Bounding box and output encoding for a thumbnail.
///
/// Omitted dimensions are derived from the source aspect ratio; when both
/// are omitted the box defaults to 256x256.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailRequest {
    /// Maximum output width in pixels
    pub max_width: Option<u32>,

    /// Maximum output height in pixels
    pub max_height: Option<u32>,

    /// Output encoding
    pub encoding: Encoding,

    /// JPEG quality, 1-100 (ignored for PNG)
    pub jpeg_quality: u8,

    /// JPEG chroma subsampling (ignored for PNG)
    pub jpeg_subsampling: ChromaSubsampling,
}

impl Default for ThumbnailRequest {
    fn default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            encoding: Encoding::Png,
            jpeg_quality: codec::DEFAULT_JPEG_QUALITY,
            jpeg_subsampling: ChromaSubsampling::Full,
        }
    }
}

impl ThumbnailRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_width == Some(0) {
            return Err(ValidationError::InvalidParameter {
                field: "maxWidth",
                message: "must be a positive integer".to_string(),
            });
        }
        if self.max_height == Some(0) {
            return Err(ValidationError::InvalidParameter {
                field: "maxHeight",
                message: "must be a positive integer".to_string(),
            });
        }
        if !codec::is_valid_quality(self.jpeg_quality) {
            return Err(ValidationError::InvalidParameter {
                field: "jpegQuality",
                message: format!("must be between 1 and 100, got {}", self.jpeg_quality),
            });
        }
        Ok(())
    }

    /// Resolve the bounding box against the source aspect ratio.
    ///
    /// A single given dimension implies the other through the full-resolution
    /// aspect ratio, matching what a proportional fit would produce anyway.
    fn resolve_bounds(&self, size_x: u32, size_y: u32) -> (u32, u32) {
        match (self.max_width, self.max_height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => {
                let h = (f64::from(w) * f64::from(size_y) / f64::from(size_x)).round() as u32;
                (w, h.max(1))
            }
            (None, Some(h)) => {
                let w = (f64::from(h) * f64::from(size_x) / f64::from(size_y)).round() as u32;
                (w.max(1), h)
            }
            (None, None) => (DEFAULT_THUMBNAIL_EDGE, DEFAULT_THUMBNAIL_EDGE),
        }
    }
}

// =============================================================================
// Generation
// =============================================================================

/// Largest (width, height) preserving `sx:sy` that fits in the bounds.
fn fit_within(sx: u32, sy: u32, bound_w: u32, bound_h: u32) -> (u32, u32) {
    let scale = (f64::from(bound_w) / f64::from(sx)).min(f64::from(bound_h) / f64::from(sy));
    let w = (f64::from(sx) * scale).round() as u32;
    let h = (f64::from(sy) * scale).round() as u32;
    (w.clamp(1, bound_w), h.clamp(1, bound_h))
}

/// Derive a thumbnail from the lowest-detail level of a source.
pub fn generate<S: TileSource + ?Sized>(
    source: &S,
    request: &ThumbnailRequest,
) -> Result<EncodedImage, TileError> {
    request.validate()?;
    let base = source.decode_level(0)?;
    render(source.metadata(), base, request)
}

/// Resize an already-decoded coarsest level to the request bounds and
/// encode it.
///
/// Split from [`generate`] so callers that serialize backend decodes can
/// scope their lock to the decode alone. Callers validate the request
/// before decoding.
pub(crate) fn render(
    metadata: &TileMetadata,
    base: RgbImage,
    request: &ThumbnailRequest,
) -> Result<EncodedImage, TileError> {
    let (bound_w, bound_h) = request.resolve_bounds(metadata.size_x, metadata.size_y);
    let (base_w, base_h) = base.dimensions();
    let (out_w, out_h) = fit_within(metadata.size_x, metadata.size_y, bound_w, bound_h);

    let pixels = if (out_w, out_h) == (base_w, base_h) {
        base
    } else {
        imageops::resize(&base, out_w, out_h, FilterType::Lanczos3)
    };

    codec::encode(
        &pixels,
        request.encoding,
        request.jpeg_quality,
        request.jpeg_subsampling,
    )
}

// =============================================================================
// Tests
// =============================================================================
