//! Sidescan Raster Mosaic Engine
//!
//! Georeferencing for sidescan sonar rasters: ground projection of scanline
//! pixels, coverage footprints, geo-rectified mosaics built in the background
//! for display, and reacquisition of known point targets across survey passes.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod api;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use core::{Contact, GeoBounds, Location, Observation, Pose, Raster, RasterType, Sample, SensorInfo};
pub use algorithms::{find_reacquisitions, project, Footprint};
pub use processing::{
    build_mosaic, export_mosaics, load_contact, load_index, save_contact, CancelToken, FilePixelSource, Mosaic,
    PixelSource, RasterCatalog,
};
pub use validation::{SonarError, SonarResult};
pub use utils::{setup_logging, CorrelationConfig, EngineConfig, MosaicConfig, RenderConfig};
pub use api::{Canvas, GateState, LocalViewport, MapLayer, MosaicGate, MosaicWorker, Viewport};
