//! Error taxonomy

pub mod error;

pub use error::{SonarError, SonarResult};
