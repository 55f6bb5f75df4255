//! Tile source abstraction.
//!
//! A [`TileSource`] is an opened, stateful handle to one pyramidal image via
//! one backend decoder. The trait is the uniform contract over heterogeneous
//! decoders: pyramid metadata, raw tile decode, and thumbnail derivation all
//! flow through it, so the layers above never see format specifics.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              TileService                │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   SourceCache (refcounted open sources) │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │    BackendRegistry (confidence probe)   │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ TestTileSource  │    │   FileImageSource   │
//! │ (synthetic)     │    │ (image-crate files) │
//! └─────────────────┘    └─────────────────────┘
//! ```

use std::collections::BTreeMap;

use image::RgbImage;
use serde_json::Value;

use crate::codec::{self, ChromaSubsampling, EncodedImage, Encoding};
use crate::coord::TileCoordinate;
use crate::error::{TileError, ValidationError};
use crate::thumbnail::{self, ThumbnailRequest};

mod file_image;
mod metadata;
mod registry;
mod test_pattern;

pub use file_image::{FileImageBackend, FileImageSource};
pub use metadata::{InternalMetadata, TileMetadata};
pub use registry::{Backend, BackendRegistry, Confidence};
pub use test_pattern::{TestPatternBackend, TestTileSource, TEST_SCHEME};

// =============================================================================
// Open request
// =============================================================================

/// A file reference plus backend-specific open parameters.
///
/// The parameter bag is a sorted map so two requests with the same content
/// always canonicalize to the same cache key regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    /// File path or synthetic scheme (e.g. `test://fractal`)
    pub path: String,

    /// Backend-specific open parameters
    pub params: BTreeMap<String, Value>,
}

impl OpenRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style parameter insertion.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Read an optional non-negative integer parameter.
    pub fn param_u32(&self, key: &'static str) -> Result<Option<u32>, ValidationError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| ValidationError::InvalidParameter {
                    field: key,
                    message: format!("expected a non-negative integer, got {value}"),
                }),
        }
    }

    /// Read an optional boolean parameter.
    pub fn param_bool(&self, key: &'static str) -> Result<Option<bool>, ValidationError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => {
                value
                    .as_bool()
                    .map(Some)
                    .ok_or_else(|| ValidationError::InvalidParameter {
                        field: key,
                        message: format!("expected a boolean, got {value}"),
                    })
            }
        }
    }

    /// Read an optional string parameter.
    pub fn param_str(&self, key: &'static str) -> Result<Option<&str>, ValidationError> {
        match self.params.get(key) {
            None => Ok(None),
            Some(value) => {
                value
                    .as_str()
                    .map(Some)
                    .ok_or_else(|| ValidationError::InvalidParameter {
                        field: key,
                        message: format!("expected a string, got {value}"),
                    })
            }
        }
    }
}

// =============================================================================
// TileSource trait
// =============================================================================

/// Uniform contract over heterogeneous pyramid decoders.
///
/// Implementations are read-only after open: fetching a tile must not
/// observably mutate shared source state, so `&self` suffices everywhere.
/// Sources that cannot tolerate concurrent decodes return `false` from
/// [`TileSource::concurrent_reads`] and are serialized by the cache with a
/// per-source lock held only around the decode.
pub trait TileSource: Send + Sync {
    /// Pyramid geometry, computed once at open time.
    fn metadata(&self) -> &TileMetadata;

    /// Backend-specific diagnostic metadata, passed through opaquely.
    fn internal_metadata(&self) -> &InternalMetadata;

    /// Output encoding for tiles from this source.
    fn tile_encoding(&self) -> Encoding;

    /// Decode exactly the pixel region for a validated tile coordinate.
    ///
    /// Edge tiles are clipped to the level extent, so the returned buffer
    /// may be smaller than the native tile size.
    fn decode_tile(&self, coord: TileCoordinate) -> Result<RgbImage, TileError>;

    /// Decode the full extent of one pyramid level.
    ///
    /// Only ever called on coarse levels (thumbnail derivation).
    fn decode_level(&self, level: u32) -> Result<RgbImage, TileError>;

    /// Whether this backend supports concurrent tile decodes against one
    /// open source.
    fn concurrent_reads(&self) -> bool {
        true
    }

    /// Release native decoder resources. Idempotent; the cache calls this
    /// once the last reference is gone.
    fn close(&self) {}

    /// Fetch a tile as an encoded payload.
    ///
    /// Validates the coordinate first; the raw signed inputs let negative
    /// values surface as [`crate::CoordinateError::Negative`] rather than
    /// being conflated with range errors.
    fn tile(&self, z: i64, x: i64, y: i64) -> Result<EncodedImage, TileError> {
        let coord = self.metadata().validate_coordinate(z, x, y)?;
        let pixels = self.decode_tile(coord)?;
        codec::encode(
            &pixels,
            self.tile_encoding(),
            codec::DEFAULT_JPEG_QUALITY,
            ChromaSubsampling::Full,
        )
    }

    /// Derive a bounded thumbnail from the lowest-detail level.
    fn thumbnail(&self, request: &ThumbnailRequest) -> Result<EncodedImage, TileError> {
        thumbnail::generate(self, request)
    }
}

// =============================================================================
// Tests
// =============================================================================
