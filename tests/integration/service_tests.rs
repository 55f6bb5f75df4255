//! End-to-end service tests against the synthetic backend.

use tilepyramid::{
    CoordinateError, OpenError, OpenRequest, ThumbnailRequest, TileError, TileService,
};

fn slide_request() -> OpenRequest {
    OpenRequest::new("test://slide")
        .with_param("sizeX", 100_000)
        .with_param("sizeY", 100_000)
        .with_param("tileWidth", 1024)
        .with_param("tileHeight", 1024)
        .with_param("fractal", true)
}

// =============================================================================
// Metadata
// =============================================================================

#[test]
fn test_metadata_for_large_pyramid() {
    let service = TileService::with_defaults();
    let md = service.metadata(&slide_request()).unwrap();

    assert_eq!(md.size_x, 100_000);
    assert_eq!(md.size_y, 100_000);
    assert_eq!(md.tile_width, 1024);
    assert_eq!(md.tile_height, 1024);
    // ceil(log2(100000 / 1024)) + 1
    assert_eq!(md.levels, 8);
    assert_eq!(md.tile_grid(7), (98, 98));
    assert_eq!(md.level_dimensions(0), (782, 782));
}

#[test]
fn test_metadata_is_stable_across_calls() {
    let service = TileService::with_defaults();
    let first = service.metadata(&slide_request()).unwrap();
    let second = service.metadata(&slide_request()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

// =============================================================================
// Tiles
// =============================================================================

#[test]
fn test_tiles_identical_across_service_instances() {
    let a = TileService::with_defaults();
    let b = TileService::with_defaults();

    let tile_a = a.tile(&slide_request(), 0, 0, 0).unwrap();
    let tile_b = b.tile(&slide_request(), 0, 0, 0).unwrap();

    assert!(!tile_a.data.is_empty());
    assert_eq!(tile_a.data, tile_b.data);
    assert_eq!(tile_a.mime_type, "image/jpeg");
}

#[test]
fn test_full_resolution_edge_tile() {
    let service = TileService::with_defaults();
    // Rightmost column is clipped to 100000 - 97 * 1024 = 672 pixels
    let tile = service.tile(&slide_request(), 7, 97, 97).unwrap();
    let decoded = image::load_from_memory(&tile.data).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (672, 672));
}

#[test]
fn test_negative_coordinate_error() {
    let service = TileService::with_defaults();
    let err = service.tile(&slide_request(), 0, -1, 0).unwrap_err();
    assert!(matches!(
        err,
        TileError::InvalidCoordinate(CoordinateError::Negative { field: "x", .. })
    ));
}

#[test]
fn test_out_of_range_coordinate_errors() {
    let service = TileService::with_defaults();

    let err = service.tile(&slide_request(), 8, 0, 0).unwrap_err();
    assert!(matches!(
        err,
        TileError::InvalidCoordinate(CoordinateError::OutOfRange { field: "z", .. })
    ));

    let err = service.tile(&slide_request(), 7, 98, 0).unwrap_err();
    assert!(matches!(
        err,
        TileError::InvalidCoordinate(CoordinateError::OutOfRange { field: "x", .. })
    ));

    let err = service.tile(&slide_request(), 7, 0, 98).unwrap_err();
    assert!(matches!(
        err,
        TileError::InvalidCoordinate(CoordinateError::OutOfRange { field: "y", .. })
    ));
}

#[test]
fn test_unresolvable_reference() {
    let service = TileService::with_defaults();
    let err = service
        .tile(&OpenRequest::new("/no/such/slide.bin"), 0, 0, 0)
        .unwrap_err();
    assert!(matches!(
        err,
        TileError::Open(OpenError::NoBackendMatched { .. })
    ));
}

// =============================================================================
// Thumbnails
// =============================================================================

#[test]
fn test_thumbnail_fits_width_bound() {
    let service = TileService::with_defaults();
    let request = OpenRequest::new("test://wide")
        .with_param("sizeX", 4000)
        .with_param("sizeY", 2000);
    let thumbnail_request = ThumbnailRequest {
        max_width: Some(100),
        ..Default::default()
    };

    let thumb = service.thumbnail(&request, &thumbnail_request).unwrap();
    assert_eq!(thumb.mime_type, "image/png");

    let decoded = image::load_from_memory(&thumb.data).unwrap().to_rgb8();
    assert_eq!(decoded.dimensions(), (100, 50));
}

#[test]
fn test_jpeg_thumbnail_deterministic() {
    let service = TileService::with_defaults();
    let thumbnail_request = ThumbnailRequest {
        max_width: Some(100),
        encoding: tilepyramid::Encoding::Jpeg,
        jpeg_quality: 95,
        ..Default::default()
    };

    let a = service
        .thumbnail(&slide_request(), &thumbnail_request)
        .unwrap();
    let b = service
        .thumbnail(&slide_request(), &thumbnail_request)
        .unwrap();
    assert_eq!(a.mime_type, "image/jpeg");
    assert_eq!(a.data, b.data);
}

#[test]
fn test_invalid_thumbnail_request() {
    let service = TileService::with_defaults();
    let thumbnail_request = ThumbnailRequest {
        max_width: Some(0),
        ..Default::default()
    };
    assert!(matches!(
        service.thumbnail(&slide_request(), &thumbnail_request),
        Err(TileError::InvalidRequest(_))
    ));
}
