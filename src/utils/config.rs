use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::{
    DEFAULT_ACCEPTANCE_THRESHOLD_M, DEFAULT_EXCLUSION_WINDOW_MS, DEFAULT_MAX_CANVAS_DIMENSION,
    DEFAULT_MAX_MOSAIC_RESOLUTION, DEFAULT_MIN_MOSAIC_RESOLUTION, DEFAULT_NOMINAL_COLUMNS,
    DEFAULT_POST_DETECTION_SKIP, DEFAULT_ROLL_LIMIT_DEG, DEFAULT_SAMPLE_SEARCH_STEP,
};
use crate::validation::{SonarError, SonarResult};

/// Engine-wide configuration, stored as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EngineConfig {
    pub mosaic: MosaicConfig,
    pub correlation: CorrelationConfig,
    pub render: RenderConfig,
    /// Threads in the mosaic worker pool
    pub worker_threads: usize,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

/// Mosaic compositor parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct MosaicConfig {
    /// Use every n-th scanline (1 = all)
    pub step: usize,
    /// Scanlines rolled beyond this are skipped (degrees)
    pub roll_limit_deg: f64,
    /// Apply altitude correction when mapping ground to slant range
    pub slant_corrected: bool,
    /// Largest along-track strip stamped for one scanline (meters)
    pub max_strip_m: f64,
    /// Largest canvas edge in pixels
    pub max_canvas_dimension: u32,
}

/// Reacquisition search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CorrelationConfig {
    /// Distance under which a target counts as re-observed (meters)
    pub acceptance_threshold_m: f64,
    /// Half-width of the exclusion window around seed observations (ms)
    pub exclusion_window_ms: u64,
    /// Samples skipped after an emitted observation
    pub post_detection_skip: usize,
    /// Initial step of the along-track search (samples)
    pub sample_search_step: usize,
    /// Image width assumed when the raster image could not be read
    pub nominal_columns: u32,
    pub slant_corrected: bool,
    /// Iteration cap for each pattern search
    pub max_search_iterations: usize,
}

/// Render gate parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RenderConfig {
    /// Below this ground resolution only the footprint is drawn (px/m)
    pub min_mosaic_resolution: f64,
    /// Build resolutions are clamped to this (px/m)
    pub max_mosaic_resolution: f64,
    /// Round requested resolutions down to powers of two
    pub quantize_resolution: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mosaic: MosaicConfig::default(),
            correlation: CorrelationConfig::default(),
            render: RenderConfig::default(),
            worker_threads: 2,
            log_level: "info".to_string(),
        }
    }
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            step: 1,
            roll_limit_deg: DEFAULT_ROLL_LIMIT_DEG,
            slant_corrected: true,
            max_strip_m: 5.0,
            max_canvas_dimension: DEFAULT_MAX_CANVAS_DIMENSION,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold_m: DEFAULT_ACCEPTANCE_THRESHOLD_M,
            exclusion_window_ms: DEFAULT_EXCLUSION_WINDOW_MS,
            post_detection_skip: DEFAULT_POST_DETECTION_SKIP,
            sample_search_step: DEFAULT_SAMPLE_SEARCH_STEP,
            nominal_columns: DEFAULT_NOMINAL_COLUMNS,
            slant_corrected: true,
            max_search_iterations: 200,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_mosaic_resolution: DEFAULT_MIN_MOSAIC_RESOLUTION,
            max_mosaic_resolution: DEFAULT_MAX_MOSAIC_RESOLUTION,
            quantize_resolution: true,
        }
    }
}

impl CorrelationConfig {
    pub fn exclusion_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.exclusion_window_ms as i64)
    }
}

fn invalid(parameter: &str, value: impl ToString, reason: &str) -> SonarError {
    SonarError::Config {
        parameter: parameter.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl EngineConfig {
    /// Load and validate a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> SonarResult<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|e| SonarError::Io {
            message: format!("Failed to read config file '{}': {}", path_str, e),
        })?;

        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| SonarError::Parse {
            source_name: path_str.clone(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration as pretty-printed JSON
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> SonarResult<()> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = serde_json::to_string_pretty(self).map_err(|e| SonarError::Parse {
            source_name: path_str.clone(),
            message: e.to_string(),
        })?;

        fs::write(&path, content).map_err(|e| SonarError::Io {
            message: format!("Failed to write config file '{}': {}", path_str, e),
        })
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> SonarResult<()> {
        if self.worker_threads == 0 {
            return Err(invalid("worker-threads", self.worker_threads, "must be at least 1"));
        }

        let mosaic = &self.mosaic;
        if mosaic.step == 0 {
            return Err(invalid("mosaic.step", mosaic.step, "must be at least 1"));
        }
        if !(mosaic.roll_limit_deg > 0.0 && mosaic.roll_limit_deg <= 90.0) {
            return Err(invalid("mosaic.roll-limit-deg", mosaic.roll_limit_deg, "must be in (0, 90]"));
        }
        if !(mosaic.max_strip_m > 0.0) {
            return Err(invalid("mosaic.max-strip-m", mosaic.max_strip_m, "must be positive"));
        }
        if mosaic.max_canvas_dimension == 0 {
            return Err(invalid("mosaic.max-canvas-dimension", mosaic.max_canvas_dimension, "must be positive"));
        }

        let correlation = &self.correlation;
        if !(correlation.acceptance_threshold_m > 0.0) {
            return Err(invalid(
                "correlation.acceptance-threshold-m",
                correlation.acceptance_threshold_m,
                "must be positive",
            ));
        }
        if correlation.nominal_columns == 0 {
            return Err(invalid("correlation.nominal-columns", correlation.nominal_columns, "must be positive"));
        }
        if correlation.max_search_iterations == 0 {
            return Err(invalid(
                "correlation.max-search-iterations",
                correlation.max_search_iterations,
                "must be positive",
            ));
        }

        let render = &self.render;
        if !(render.min_mosaic_resolution > 0.0) {
            return Err(invalid(
                "render.min-mosaic-resolution",
                render.min_mosaic_resolution,
                "must be positive",
            ));
        }
        if render.max_mosaic_resolution < render.min_mosaic_resolution {
            return Err(invalid(
                "render.max-mosaic-resolution",
                render.max_mosaic_resolution,
                "must not be below min-mosaic-resolution",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.mosaic.roll_limit_deg, 5.0);
        assert_eq!(config.correlation.acceptance_threshold_m, 2.0);
        assert_eq!(config.correlation.exclusion_window().num_seconds(), 5);
        assert_eq!(config.correlation.post_detection_skip, 4);
        assert_eq!(config.render.min_mosaic_resolution, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"worker-threads": 4, "correlation": {"acceptance-threshold-m": 3.5}}"#).unwrap();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.correlation.acceptance_threshold_m, 3.5);
        assert_eq!(config.correlation.post_detection_skip, 4);
        assert_eq!(config.mosaic, MosaicConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");

        let mut config = EngineConfig::default();
        config.mosaic.step = 3;
        config.render.quantize_resolution = false;
        config.save_to_file(&path).unwrap();

        let loaded = EngineConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = EngineConfig::default();
        config.worker_threads = 0;
        assert!(matches!(config.validate(), Err(SonarError::Config { .. })));

        let mut config = EngineConfig::default();
        config.render.max_mosaic_resolution = 1.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.correlation.acceptance_threshold_m = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = EngineConfig::from_file("/nonexistent/engine.json");
        assert!(matches!(result, Err(SonarError::Io { .. })));
    }

    #[test]
    fn test_invalid_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"mosaic": {"step": 0}}"#).unwrap();
        assert!(matches!(EngineConfig::from_file(&path), Err(SonarError::Config { .. })));
    }
}
