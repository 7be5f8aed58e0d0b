//! Error classification for raster loading, geometry and mosaic building

use thiserror::Error;

/// Result type for engine operations
pub type SonarResult<T> = Result<T, SonarError>;

/// Errors surfaced by the engine.
///
/// Only structurally invalid input is reported here. Numerically degenerate
/// input (zero ground range, missing altitude) resolves to fallback values in
/// the geometry code, and "no reacquisition found" is an empty result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SonarError {
    /// Empty samples, unordered timestamps, row/sample mismatch, bad range
    #[error("malformed raster '{filename}': {reason}")]
    MalformedRaster { filename: String, reason: String },

    /// Footprint hull collapsed to fewer than three points
    #[error("degenerate footprint geometry: {distinct_points} distinct hull points")]
    DegenerateGeometry { distinct_points: usize },

    /// Mosaic build superseded by a newer request
    #[error("mosaic build cancelled")]
    Cancelled,

    /// Referenced pixel file missing or undecodable
    #[error("image '{path}' unavailable: {reason}")]
    ImageUnavailable { path: String, reason: String },

    /// Requested canvas exceeds the configured limit
    #[error("mosaic canvas {width}x{height} exceeds limit of {limit} pixels per edge")]
    CanvasTooLarge { width: u64, height: u64, limit: u32 },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("parse error in '{source_name}': {message}")]
    Parse { source_name: String, message: String },

    #[error("invalid configuration '{parameter}' = '{value}': {reason}")]
    Config { parameter: String, value: String, reason: String },

    #[error("worker error: {message}")]
    Worker { message: String },
}

impl SonarError {
    pub fn malformed(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        SonarError::MalformedRaster {
            filename: filename.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SonarError::Cancelled)
    }

    /// Whether the caller can retry or fall back instead of giving up on the raster
    pub fn is_recoverable(&self) -> bool {
        match self {
            SonarError::Cancelled | SonarError::ImageUnavailable { .. } | SonarError::Io { .. } => true,
            SonarError::CanvasTooLarge { .. } | SonarError::Worker { .. } => true,
            SonarError::MalformedRaster { .. }
            | SonarError::DegenerateGeometry { .. }
            | SonarError::Parse { .. }
            | SonarError::Config { .. } => false,
        }
    }
}

impl From<std::io::Error> for SonarError {
    fn from(error: std::io::Error) -> Self {
        SonarError::Io { message: error.to_string() }
    }
}
