//! Configuration and logging

pub mod config;
pub mod logging;

pub use config::{CorrelationConfig, EngineConfig, MosaicConfig, RenderConfig};
pub use logging::setup_logging;
