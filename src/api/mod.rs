//! Background mosaic building and the render gate

pub mod render;
pub mod worker;

pub use render::{sort_layers, Canvas, GateState, LocalViewport, MapLayer, MosaicGate, Viewport};
pub use worker::{BuildInbox, BuildOutcome, MosaicWorker};
