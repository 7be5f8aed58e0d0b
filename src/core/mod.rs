//! Core types and constants for the sidescan raster engine

pub mod constants;
pub mod contact;
pub mod raster;
pub mod types;

pub use constants::*;
pub use contact::{Contact, Observation};
pub use raster::Raster;
pub use types::*;
