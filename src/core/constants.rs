//! Physical constants and engine defaults

/// WGS84 semi-major axis (meters)
pub const EARTH_RADIUS_WGS84: f64 = 6378137.0;

/// WGS84 flattening
pub const EARTH_FLATTENING_WGS84: f64 = 1.0 / 298.257223563;

/// WGS84 first eccentricity squared
pub const ECCENTRICITY_SQUARED_WGS84: f64 =
    2.0 * EARTH_FLATTENING_WGS84 - EARTH_FLATTENING_WGS84 * EARTH_FLATTENING_WGS84;

/// Ground ranges below this are considered to be at the vehicle (meters)
pub const GROUND_RANGE_EPSILON: f64 = 1e-6;

/// Scanlines rolled more than this are skipped by the compositor (degrees)
pub const DEFAULT_ROLL_LIMIT_DEG: f64 = 5.0;

/// Horizontal distance under which a target counts as re-observed (meters)
pub const DEFAULT_ACCEPTANCE_THRESHOLD_M: f64 = 2.0;

/// Exclusion window around seed observations (milliseconds)
pub const DEFAULT_EXCLUSION_WINDOW_MS: u64 = 5_000;

/// Samples skipped after each emitted observation
pub const DEFAULT_POST_DETECTION_SKIP: usize = 4;

/// Initial step of the along-track sample search
pub const DEFAULT_SAMPLE_SEARCH_STEP: usize = 8;

/// Image width assumed by the correlation search when the image is missing
pub const DEFAULT_NOMINAL_COLUMNS: u32 = 1000;

/// Ground resolution below which only the footprint is drawn (px/m)
pub const DEFAULT_MIN_MOSAIC_RESOLUTION: f64 = 2.0;

/// Upper bound on the mosaic build resolution (px/m)
pub const DEFAULT_MAX_MOSAIC_RESOLUTION: f64 = 32.0;

/// Largest mosaic canvas edge (pixels)
pub const DEFAULT_MAX_CANVAS_DIMENSION: u32 = 16_384;
