//! High-level tile access facade.
//!
//! [`TileService`] ties the backend registry and source cache together
//! behind per-request operations: callers name a source by path and
//! parameters on every call, and the service resolves it to a cached open
//! source transparently.

use tracing::info;

use crate::cache::{SourceCache, SourceHandle};
use crate::codec::EncodedImage;
use crate::error::{OpenError, TileError};
use crate::source::{BackendRegistry, InternalMetadata, OpenRequest, TileMetadata};
use crate::thumbnail::ThumbnailRequest;

/// Facade over the registry and cache.
pub struct TileService {
    registry: BackendRegistry,
    cache: SourceCache,
}

impl TileService {
    pub fn new(registry: BackendRegistry, cache: SourceCache) -> Self {
        Self { registry, cache }
    }

    /// Service with the built-in backends and default cache capacity.
    pub fn with_defaults() -> Self {
        Self::new(BackendRegistry::with_defaults(), SourceCache::default())
    }

    /// Resolve a request to a pinned handle on the open source.
    ///
    /// The handle keeps the source open across calls; prefer it over the
    /// per-request methods when issuing many operations against one source.
    pub fn open(&self, request: &OpenRequest) -> Result<SourceHandle, OpenError> {
        self.cache.get_or_open(&self.registry, request)
    }

    /// Pyramid geometry of a source.
    pub fn metadata(&self, request: &OpenRequest) -> Result<TileMetadata, OpenError> {
        Ok(self.open(request)?.metadata().clone())
    }

    /// Backend-specific diagnostic metadata of a source.
    pub fn internal_metadata(
        &self,
        request: &OpenRequest,
    ) -> Result<InternalMetadata, OpenError> {
        Ok(self.open(request)?.internal_metadata().clone())
    }

    /// Fetch one encoded tile.
    pub fn tile(
        &self,
        request: &OpenRequest,
        z: i64,
        x: i64,
        y: i64,
    ) -> Result<EncodedImage, TileError> {
        self.open(request)?.tile(z, x, y)
    }

    /// Derive a bounded thumbnail.
    pub fn thumbnail(
        &self,
        request: &OpenRequest,
        thumbnail: &ThumbnailRequest,
    ) -> Result<EncodedImage, TileError> {
        self.open(request)?.thumbnail(thumbnail)
    }

    /// Drop cached sources for a path (e.g. after the file changed on disk).
    pub fn invalidate(&self, path: &str) {
        self.cache.invalidate(path);
    }

    /// Drop every cached source.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Number of sources currently cached.
    pub fn cached_sources(&self) -> usize {
        self.cache.len()
    }

    /// Release all cached sources ahead of shutdown. Sources with live
    /// handles close once those handles are dropped.
    pub fn shutdown(&self) {
        info!(cached = self.cache.len(), "shutting down tile service");
        self.cache.clear();
    }
}

impl Default for TileService {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Tests
// =============================================================================
