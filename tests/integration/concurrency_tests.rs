//! Source cache sharing and thread-safety tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use tilepyramid::{
    Backend, BackendRegistry, Confidence, OpenError, OpenRequest, SourceCache, TestTileSource,
    TileService, TileSource,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt().with_test_writer().init();
    });
}

/// Delegates to the synthetic backend while counting and slowing opens.
struct SlowCountingBackend {
    opens: Arc<AtomicUsize>,
    delay: Duration,
}

impl Backend for SlowCountingBackend {
    fn name(&self) -> &'static str {
        "slow-counting"
    }

    fn can_open(&self, _request: &OpenRequest) -> Confidence {
        Confidence::High
    }

    fn open(&self, request: &OpenRequest) -> Result<Box<dyn TileSource>, OpenError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Ok(Box::new(TestTileSource::from_request(request)?))
    }
}

fn counting_service(delay: Duration) -> (TileService, Arc<AtomicUsize>) {
    let opens = Arc::new(AtomicUsize::new(0));
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(SlowCountingBackend {
        opens: opens.clone(),
        delay,
    }));
    (
        TileService::new(registry, SourceCache::new(4)),
        opens,
    )
}

fn small_request() -> OpenRequest {
    OpenRequest::new("test://shared")
        .with_param("sizeX", 2048)
        .with_param("sizeY", 2048)
}

#[test]
fn test_concurrent_tile_requests_open_source_once() {
    init_tracing();
    let (service, opens) = counting_service(Duration::from_millis(50));
    let service = Arc::new(service);

    let mut threads = Vec::new();
    for i in 0..8i64 {
        let service = service.clone();
        threads.push(std::thread::spawn(move || {
            service.tile(&small_request(), 3, i % 8, 0).unwrap()
        }));
    }
    for thread in threads {
        assert!(!thread.join().unwrap().data.is_empty());
    }

    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(service.cached_sources(), 1);
}

#[test]
fn test_sequential_requests_share_cached_source() {
    let (service, opens) = counting_service(Duration::ZERO);
    for z in 0..4 {
        service.tile(&small_request(), z, 0, 0).unwrap();
    }
    assert_eq!(opens.load(Ordering::SeqCst), 1);
}

#[test]
fn test_live_handle_survives_cache_churn() {
    let opens = Arc::new(AtomicUsize::new(0));
    let mut registry = BackendRegistry::new();
    registry.register(Box::new(SlowCountingBackend {
        opens: opens.clone(),
        delay: Duration::ZERO,
    }));
    let service = TileService::new(registry, SourceCache::new(1));

    let held = service.open(&small_request()).unwrap();

    // Churn through other sources until the capacity-1 cache has certainly
    // cycled past the held entry
    for i in 0..4 {
        let other = OpenRequest::new(format!("test://churn-{i}"))
            .with_param("sizeX", 1024)
            .with_param("sizeY", 1024);
        service.tile(&other, 0, 0, 0).unwrap();
    }

    // The pinned handle still serves tiles regardless of eviction
    assert!(held.tile(3, 0, 0).is_ok());
    assert!(held.tile(0, 0, 0).is_ok());
}

#[test]
fn test_clear_defers_close_until_handles_drop() {
    let service = TileService::with_defaults();
    let held = service.open(&small_request()).unwrap();

    service.clear();
    assert_eq!(service.cached_sources(), 0);
    assert!(held.tile(0, 0, 0).is_ok());

    // Reopening after clear constructs a fresh source
    let reopened = service.open(&small_request()).unwrap();
    assert!(reopened.tile(0, 0, 0).is_ok());
    assert_eq!(service.cached_sources(), 1);
}
