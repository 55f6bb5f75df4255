//! Error taxonomy.
//!
//! Errors are grouped by operation phase so callers can map them to a
//! transport without string matching: validation and coordinate errors are
//! caller mistakes, open errors split format rejection from storage faults,
//! and tile errors cover the decode/encode pipeline.

use thiserror::Error;

/// Errors produced when validating a request parameter.
///
/// These cover malformed values that survive the surrounding layer's type
/// parsing (an integer that parses but is out of the allowed range, an
/// unknown encoding name, a zero dimension). Integer *parse* failures are
/// rejected before they reach this crate.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// A request parameter has an invalid value.
    #[error("invalid parameter {field}: {message}")]
    InvalidParameter {
        field: &'static str,
        message: String,
    },
}

/// Errors produced when validating tile coordinates.
#[derive(Debug, Clone, Error)]
pub enum CoordinateError {
    /// A coordinate is negative.
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    /// A coordinate is beyond the pyramid bounds for its axis.
    #[error("{field} {value} is out of range (limit {limit})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        limit: u32,
    },
}

/// Errors produced when opening a source file through a backend.
#[derive(Debug, Clone, Error)]
pub enum OpenError {
    /// The backend recognized the reference but could not parse the content
    /// (should map to HTTP 415).
    #[error("unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    /// I/O failure reading the source file (a system/storage fault, should
    /// map to HTTP 5xx).
    #[error("unreadable source {path}: {message}")]
    Unreadable { path: String, message: String },

    /// No registered backend probe or open succeeded for the reference.
    #[error("no backend matched {path}")]
    NoBackendMatched { path: String },

    /// Backend-specific open parameters were malformed.
    #[error(transparent)]
    InvalidParameters(#[from] ValidationError),
}

/// Errors produced while fetching a tile or thumbnail.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The requested coordinate is not a valid tile address.
    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateError),

    /// The backend failed to decode the requested region (corrupt content
    /// or backend I/O error). Not retried: a corrupt region will not become
    /// valid on retry.
    #[error("decode failed: {message}")]
    DecodeFailed { message: String },

    /// Re-encoding the decoded pixels failed.
    #[error("encode failed: {message}")]
    EncodeFailed { message: String },

    /// The thumbnail request parameters were malformed.
    #[error(transparent)]
    InvalidRequest(#[from] ValidationError),

    /// Opening the source failed before any decode could start.
    #[error(transparent)]
    Open(#[from] OpenError),
}
