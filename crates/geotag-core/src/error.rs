//! Error types for geotag-core.

use thiserror::Error;

/// Result type alias using geotag-core's Error type.
pub type Result<T> = std::result::Result<T, GeotagError>;

#[derive(Error, Debug)]
pub enum GeotagError {
    /// Invalid option value; processing never starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Match method other than `nearest` or `interp`
    #[error("Invalid match method: {0:?} (expected \"nearest\" or \"interp\")")]
    InvalidMethod(String),

    /// Track has no usable points
    #[error("Track contains no usable points")]
    EmptyTrack,

    /// Coordinate outside [-90, 90] / [-180, 180]
    #[error("Coordinate out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    /// Stored result whose status and coordinates disagree
    #[error("Inconsistent match result: {0}")]
    InvalidResult(String),

    #[error("Invalid track point: {0}")]
    InvalidTrackPoint(String),

    #[error("Track parse error: {0}")]
    TrackParse(String),

    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),

    #[error("JPEG error: {0}")]
    Jpeg(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
