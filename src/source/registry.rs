//! Backend registry.
//!
//! Maps a file reference to the tile source implementation most likely to
//! open it. Each backend exposes a cheap [`Backend::can_open`] probe (a
//! header sniff, never a full parse); the registry tries backends in
//! descending probe confidence, falling through on
//! [`OpenError::UnsupportedFormat`] and surfacing
//! [`OpenError::NoBackendMatched`] once every candidate is exhausted.
//!
//! Registration is a configuration-time operation: the registry is built
//! once, then shared immutably with the cache and service.

use tracing::debug;

use crate::error::OpenError;

use super::{FileImageBackend, OpenRequest, TestPatternBackend, TileSource};

// =============================================================================
// Confidence
// =============================================================================

/// How likely a backend is to open a reference, judged from a cheap probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// The backend cannot open this reference; it is skipped entirely.
    None,
    /// The backend might open it (e.g. no recognizable header, but the
    /// backend is a catch-all).
    Low,
    /// The header matches a family the backend handles.
    Medium,
    /// The reference explicitly names this backend (e.g. a scheme prefix).
    High,
}

// =============================================================================
// Backend trait
// =============================================================================

/// A concrete decoder family that can probe and open references.
pub trait Backend: Send + Sync {
    /// Short identifier used in logs and internal metadata.
    fn name(&self) -> &'static str;

    /// Cheap probe: how confident is this backend that it can open the
    /// reference? Must not fully parse the file.
    fn can_open(&self, request: &OpenRequest) -> Confidence;

    /// Construct a decoder instance for the reference.
    fn open(&self, request: &OpenRequest) -> Result<Box<dyn TileSource>, OpenError>;
}

// =============================================================================
// BackendRegistry
// =============================================================================

/// Ordered collection of registered backends.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Create a registry with the built-in backends: the synthetic test
    /// source and the image-crate file backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TestPatternBackend));
        registry.register(Box::new(FileImageBackend));
        registry
    }

    /// Register a backend. Earlier registrations win ties in confidence.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Open a source through the best-matching backend.
    ///
    /// Probes every backend, then attempts opens in descending confidence.
    /// An `UnsupportedFormat` failure falls through to the next candidate
    /// (logged, not retried); any other failure is environmental and
    /// propagates immediately.
    pub fn open(&self, request: &OpenRequest) -> Result<Box<dyn TileSource>, OpenError> {
        let mut candidates: Vec<(Confidence, &dyn Backend)> = self
            .backends
            .iter()
            .map(|b| (b.can_open(request), b.as_ref()))
            .filter(|(confidence, _)| *confidence > Confidence::None)
            .collect();

        // Stable sort keeps registration order within a confidence tier.
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        if candidates.is_empty() {
            debug!(path = %request.path, "no backend probe matched");
            return Err(OpenError::NoBackendMatched {
                path: request.path.clone(),
            });
        }

        for (confidence, backend) in &candidates {
            match backend.open(request) {
                Ok(source) => {
                    debug!(
                        path = %request.path,
                        backend = backend.name(),
                        ?confidence,
                        "opened source"
                    );
                    return Ok(source);
                }
                Err(OpenError::UnsupportedFormat { reason }) => {
                    debug!(
                        path = %request.path,
                        backend = backend.name(),
                        %reason,
                        "backend declined, trying next"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        Err(OpenError::NoBackendMatched {
            path: request.path.clone(),
        })
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// =============================================================================
// Tests
// =============================================================================
