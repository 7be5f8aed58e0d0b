//! Point targets and their sightings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::Location;

/// One sighting of a target in a raster. Latitude/longitude are degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Observation {
    pub uuid: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub depth: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub raster_filename: String,
    #[serde(default)]
    pub system_name: String,
}

impl Observation {
    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude).with_depth(self.depth)
    }
}

/// Logged point target and the observations collected for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contact {
    #[serde(default)]
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl Contact {
    pub fn new(label: impl Into<String>, location: Location) -> Self {
        Self {
            label: label.into(),
            latitude: location.latitude,
            longitude: location.longitude,
            depth: None,
            observations: Vec::new(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.latitude, self.longitude).with_depth(self.depth.unwrap_or(0.0))
    }

    /// Instants the correlation search must not re-detect
    pub fn observation_times(&self) -> Vec<DateTime<Utc>> {
        self.observations.iter().map(|o| o.timestamp).collect()
    }

    /// Take ownership of new observations
    pub fn append_observations(&mut self, observations: Vec<Observation>) -> usize {
        let count = observations.len();
        self.observations.extend(observations);
        count
    }
}
