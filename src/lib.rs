//! Tile and thumbnail access for arbitrarily large pyramidal images.
//!
//! Pyramidal formats store an image as a stack of progressively downsampled
//! levels cut into fixed-size tiles, so any region at any zoom can be read
//! without decoding the full image. This crate exposes that model behind a
//! small set of composable pieces:
//!
//! - [`coord`]: the level/column/row coordinate system shared by every
//!   source (level 0 is the most zoomed out)
//! - [`source`]: the [`TileSource`] contract, the backend registry that
//!   resolves a file reference to a decoder, and the built-in backends
//! - [`cache`]: a refcounted LRU cache of open sources with single-flight
//!   opens
//! - [`thumbnail`]: bounded thumbnail derivation from the coarsest level
//! - [`codec`]: JPEG/PNG encoding of decoded tile pixels
//! - [`service`]: the [`TileService`] facade tying the above together
//!
//! # Example
//!
//! ```
//! use tilepyramid::{OpenRequest, TileService};
//!
//! let service = TileService::with_defaults();
//! let request = OpenRequest::new("test://demo")
//!     .with_param("sizeX", 4096)
//!     .with_param("sizeY", 4096);
//!
//! let metadata = service.metadata(&request)?;
//! let tile = service.tile(&request, 0, 0, 0)?;
//! assert_eq!(tile.mime_type, "image/jpeg");
//! assert!(metadata.levels > 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod codec;
pub mod coord;
pub mod error;
pub mod service;
pub mod source;
pub mod thumbnail;

pub use cache::{SourceCache, SourceHandle, SourceKey, DEFAULT_SOURCE_CACHE_CAPACITY};
pub use codec::{ChromaSubsampling, EncodedImage, Encoding, DEFAULT_JPEG_QUALITY};
pub use coord::TileCoordinate;
pub use error::{CoordinateError, OpenError, TileError, ValidationError};
pub use service::TileService;
pub use source::{
    Backend, BackendRegistry, Confidence, FileImageBackend, FileImageSource, InternalMetadata,
    OpenRequest, TestPatternBackend, TestTileSource, TileMetadata, TileSource, TEST_SCHEME,
};
pub use thumbnail::{ThumbnailRequest, DEFAULT_THUMBNAIL_EDGE};
