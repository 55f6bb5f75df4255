//! Refcounted cache of open sources.
//!
//! Opening a source is expensive (header parse, pyramid construction), so
//! opened sources are shared behind [`SourceHandle`]s and kept warm in an
//! LRU cache. The capacity is soft: an entry is only evicted once no handle
//! references it, so the cache can temporarily exceed its capacity while
//! every entry is in use.
//!
//! Concurrent opens of the same key are collapsed to a single backend open
//! (single-flight); the winner's result, success or failure, is delivered to
//! every waiter.
//!
//! ```text
//!  get_or_open(key)
//!       │
//!       ├─ cached? ──────────────► clone Arc, promote, return handle
//!       │
//!       ├─ open in flight? ──────► block on Condvar, share result
//!       │
//!       └─ leader ───────────────► open via registry (lock released),
//!                                  insert, evict over capacity, publish
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::{debug, warn};

use crate::codec::{self, ChromaSubsampling, EncodedImage};
use crate::error::{OpenError, TileError};
use crate::source::{BackendRegistry, InternalMetadata, OpenRequest, TileMetadata, TileSource};
use crate::thumbnail::{self, ThumbnailRequest};

/// Default number of sources kept open.
pub const DEFAULT_SOURCE_CACHE_CAPACITY: usize = 32;

// =============================================================================
// SourceKey
// =============================================================================

/// Cache identity of an open source: the path plus the canonical form of the
/// open parameters.
///
/// Parameters are serialized from a sorted map, so two requests with the
/// same content produce the same key regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceKey {
    path: String,
    params: String,
}

impl SourceKey {
    pub fn from_request(request: &OpenRequest) -> Self {
        Self {
            path: request.path.clone(),
            // BTreeMap serialization cannot fail for JSON values
            params: serde_json::to_string(&request.params).unwrap_or_default(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

// =============================================================================
// OpenEntry and SourceHandle
// =============================================================================

/// A cached open source. Closed exactly once, either at eviction or when the
/// last outstanding handle is dropped.
struct OpenEntry {
    source: Box<dyn TileSource>,
    /// Serializes decodes for backends that cannot tolerate concurrency.
    decode_lock: Option<Mutex<()>>,
    closed: AtomicBool,
}

impl OpenEntry {
    fn new(source: Box<dyn TileSource>) -> Self {
        let decode_lock = if source.concurrent_reads() {
            None
        } else {
            Some(Mutex::new(()))
        };
        Self {
            source,
            decode_lock,
            closed: AtomicBool::new(false),
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.source.close();
        }
    }

    fn decode_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.decode_lock
            .as_ref()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for OpenEntry {
    fn drop(&mut self) {
        self.close();
    }
}

/// Shared reference to an open source.
///
/// Holding a handle pins the source open: the cache will not evict or close
/// an entry while any handle to it exists. Dropping the last handle after
/// eviction closes the source.
pub struct SourceHandle {
    entry: Arc<OpenEntry>,
}

impl Clone for SourceHandle {
    fn clone(&self) -> Self {
        Self {
            entry: self.entry.clone(),
        }
    }
}

impl SourceHandle {
    pub fn metadata(&self) -> &TileMetadata {
        self.entry.source.metadata()
    }

    pub fn internal_metadata(&self) -> &InternalMetadata {
        self.entry.source.internal_metadata()
    }

    /// Fetch an encoded tile, serializing the decode when the backend
    /// requires it.
    pub fn tile(&self, z: i64, x: i64, y: i64) -> Result<EncodedImage, TileError> {
        let source = &self.entry.source;
        let coord = source.metadata().validate_coordinate(z, x, y)?;
        let pixels = {
            let _guard = self.entry.decode_guard();
            source.decode_tile(coord)?
        };
        codec::encode(
            &pixels,
            source.tile_encoding(),
            codec::DEFAULT_JPEG_QUALITY,
            ChromaSubsampling::Full,
        )
    }

    /// Derive a thumbnail, serializing the decode when the backend
    /// requires it. The lock covers only the level decode; resize and
    /// re-encode run unserialized.
    pub fn thumbnail(&self, request: &ThumbnailRequest) -> Result<EncodedImage, TileError> {
        request.validate()?;
        let source = &self.entry.source;
        let base = {
            let _guard = self.entry.decode_guard();
            source.decode_level(0)?
        };
        thumbnail::render(source.metadata(), base, request)
    }
}

// =============================================================================
// SourceCache
// =============================================================================

struct OpenFlight {
    result: Mutex<Option<Result<Arc<OpenEntry>, OpenError>>>,
    done: Condvar,
}

struct CacheState {
    entries: LruCache<SourceKey, Arc<OpenEntry>>,
    in_flight: HashMap<SourceKey, Arc<OpenFlight>>,
}

/// LRU cache of open sources with soft capacity and single-flight opens.
pub struct SourceCache {
    capacity: usize,
    state: Mutex<CacheState>,
}

impl SourceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(CacheState {
                // Unbounded container; capacity is enforced manually so
                // referenced entries are never dropped by the container.
                entries: LruCache::unbounded(),
                in_flight: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a handle to the source for `request`, opening it through the
    /// registry on a miss.
    ///
    /// Concurrent calls with the same key perform one backend open; a failed
    /// open is delivered to every waiter and is not cached, so a later call
    /// retries.
    pub fn get_or_open(
        &self,
        registry: &BackendRegistry,
        request: &OpenRequest,
    ) -> Result<SourceHandle, OpenError> {
        let key = SourceKey::from_request(request);

        let flight = {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(&key) {
                debug!(path = %key.path, "source cache hit");
                return Ok(SourceHandle {
                    entry: entry.clone(),
                });
            }
            if let Some(flight) = state.in_flight.get(&key) {
                flight.clone()
            } else {
                let flight = Arc::new(OpenFlight {
                    result: Mutex::new(None),
                    done: Condvar::new(),
                });
                state.in_flight.insert(key.clone(), flight.clone());
                drop(state);
                return self.open_as_leader(registry, request, key, &flight);
            }
        };

        // Another call is opening this key; wait for its result.
        let mut slot = flight.result.lock().unwrap_or_else(PoisonError::into_inner);
        while slot.is_none() {
            slot = flight
                .done
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        match slot.as_ref() {
            Some(Ok(entry)) => Ok(SourceHandle {
                entry: entry.clone(),
            }),
            Some(Err(err)) => Err(err.clone()),
            None => unreachable!("flight completed without a result"),
        }
    }

    fn open_as_leader(
        &self,
        registry: &BackendRegistry,
        request: &OpenRequest,
        key: SourceKey,
        flight: &Arc<OpenFlight>,
    ) -> Result<SourceHandle, OpenError> {
        // The cache lock is released here: a slow open must not block
        // lookups of other keys.
        let opened = registry
            .open(request)
            .map(|source| Arc::new(OpenEntry::new(source)));

        {
            let mut state = self.lock();
            if let Ok(entry) = &opened {
                debug!(path = %key.path, "source opened and cached");
                state.entries.push(key.clone(), entry.clone());
                self.evict_over_capacity(&mut state);
            }
            state.in_flight.remove(&key);
        }

        let mut slot = flight.result.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(opened.clone());
        drop(slot);
        flight.done.notify_all();

        opened.map(|entry| SourceHandle { entry })
    }

    /// Evict unreferenced entries, LRU first, until within capacity.
    ///
    /// An entry whose `Arc` is still shared with a handle is skipped; if
    /// every entry is referenced the cache stays over capacity.
    fn evict_over_capacity(&self, state: &mut CacheState) {
        while state.entries.len() > self.capacity {
            let victim = state
                .entries
                .iter()
                .rev() // iteration is MRU first; eviction scans from the LRU end
                .find(|(_, entry)| Arc::strong_count(entry) == 1)
                .map(|(key, _)| key.clone());
            match victim {
                Some(key) => {
                    if let Some(entry) = state.entries.pop(&key) {
                        debug!(path = %key.path, "evicting idle source");
                        entry.close();
                    }
                }
                None => {
                    warn!(
                        len = state.entries.len(),
                        capacity = self.capacity,
                        "every cached source is referenced; cache over capacity"
                    );
                    break;
                }
            }
        }
    }

    /// Drop every cached entry. Sources without outstanding handles close
    /// immediately; the rest close when their last handle is dropped.
    pub fn clear(&self) {
        let mut state = self.lock();
        while let Some((key, entry)) = state.entries.pop_lru() {
            debug!(path = %key.path, "dropping cached source");
            drop(entry);
        }
    }

    /// Drop cached entries for a path, across all parameter variants.
    pub fn invalidate(&self, path: &str) {
        let mut state = self.lock();
        let keys: Vec<SourceKey> = state
            .entries
            .iter()
            .filter(|(key, _)| key.path == path)
            .map(|(key, _)| key.clone())
            .collect();
        for key in keys {
            state.entries.pop(&key);
        }
    }

    /// Number of cached sources.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_CACHE_CAPACITY)
    }
}

// =============================================================================
// Tests
// =============================================================================
