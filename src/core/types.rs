//! Core data types for the sidescan raster engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic location in decimal degrees, depth in meters (positive down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub depth: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, depth: 0.0 }
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Check the location against WGS84 coordinate ranges
    pub fn is_valid_wgs84(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// One vehicle navigation state.
///
/// Angles are in degrees. Everything except latitude/longitude is optional in
/// the index files; missing angles and rates default to zero, missing depth and
/// altitude stay `None` ("unknown").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    /// Roll
    #[serde(default)]
    pub phi: f64,
    /// Pitch
    #[serde(default)]
    pub theta: f64,
    /// Heading, clockwise from true north
    #[serde(default)]
    pub psi: f64,
    #[serde(default)]
    pub p: f64,
    #[serde(default)]
    pub q: f64,
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub u: f64,
    #[serde(default)]
    pub v: f64,
    #[serde(default)]
    pub w: f64,
}

impl Pose {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            depth: None,
            altitude: None,
            phi: 0.0,
            theta: 0.0,
            psi: 0.0,
            p: 0.0,
            q: 0.0,
            r: 0.0,
            u: 0.0,
            v: 0.0,
            w: 0.0,
        }
    }

    pub fn with_heading(mut self, psi_deg: f64) -> Self {
        self.psi = psi_deg;
        self
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_roll(mut self, phi_deg: f64) -> Self {
        self.phi = phi_deg;
        self
    }

    /// Vehicle position (depth defaults to the surface when unknown)
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            depth: self.depth.unwrap_or(0.0),
        }
    }

    /// Altitude above the seabed, `0.0` when unknown
    pub fn altitude_or_zero(&self) -> f64 {
        match self.altitude {
            Some(a) if a.is_finite() && a > 0.0 => a,
            _ => 0.0,
        }
    }
}

/// Navigation record attached to one scanline
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub index: i64,
    pub timestamp: DateTime<Utc>,
    pub pose: Pose,
}

impl Sample {
    pub fn new(index: i64, timestamp: DateTime<Utc>, pose: Pose) -> Self {
        Self { index, timestamp, pose }
    }
}

/// Sonar head description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SensorInfo {
    /// Signed range of the first image column (negative = port)
    pub min_range: f64,
    /// Signed range one past the last image column
    pub max_range: f64,
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub sensor_model: String,
    #[serde(default)]
    pub system_name: String,
}

impl SensorInfo {
    pub fn new(min_range: f64, max_range: f64) -> Self {
        Self {
            min_range,
            max_range,
            frequency: 0.0,
            sensor_model: String::new(),
            system_name: String::new(),
        }
    }

    pub fn swath_width(&self) -> f64 {
        self.max_range - self.min_range
    }

    /// Largest absolute range the sensor can see on either side
    pub fn max_abs_range(&self) -> f64 {
        self.min_range.abs().max(self.max_range.abs())
    }

    pub fn is_valid(&self) -> bool {
        self.min_range.is_finite() && self.max_range.is_finite() && self.max_range > self.min_range
    }
}

/// How the referenced pixel data was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RasterType {
    #[default]
    Image,
    Scanline,
    Video,
}

/// Axis-aligned geographic bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self { south, west, north, east }
    }

    /// Smallest box enclosing all points, `None` for an empty slice
    pub fn from_points(points: &[Location]) -> Option<Self> {
        let first = points.first()?;
        let mut bounds = GeoBounds::new(first.latitude, first.longitude, first.latitude, first.longitude);
        for p in &points[1..] {
            bounds.south = bounds.south.min(p.latitude);
            bounds.north = bounds.north.max(p.latitude);
            bounds.west = bounds.west.min(p.longitude);
            bounds.east = bounds.east.max(p.longitude);
        }
        Some(bounds)
    }

    pub fn north_west(&self) -> Location {
        Location::new(self.north, self.west)
    }

    pub fn south_east(&self) -> Location {
        Location::new(self.south, self.east)
    }

    pub fn intersects(&self, other: &GeoBounds) -> bool {
        self.south <= other.north
            && other.south <= self.north
            && self.west <= other.east
            && other.west <= self.east
    }

    pub fn contains(&self, location: &Location) -> bool {
        (self.south..=self.north).contains(&location.latitude)
            && (self.west..=self.east).contains(&location.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pose_defaults_from_minimal_json() {
        let pose: Pose = serde_json::from_str(r#"{"latitude": 41.18, "longitude": -8.70}"#).unwrap();
        assert_eq!(pose.depth, None);
        assert_eq!(pose.altitude, None);
        assert_eq!(pose.psi, 0.0);
        assert_eq!(pose.altitude_or_zero(), 0.0);
        assert_eq!(pose.location().depth, 0.0);
    }

    #[test]
    fn test_negative_altitude_treated_as_unknown() {
        let pose = Pose::new(0.0, 0.0).with_altitude(-3.0);
        assert_eq!(pose.altitude_or_zero(), 0.0);
    }

    #[test]
    fn test_sensor_swath() {
        let sensor = SensorInfo::new(-50.0, 30.0);
        assert_eq!(sensor.swath_width(), 80.0);
        assert_eq!(sensor.max_abs_range(), 50.0);
        assert!(sensor.is_valid());
        assert!(!SensorInfo::new(10.0, 10.0).is_valid());
    }

    #[test]
    fn test_bounds_intersection() {
        let a = GeoBounds::new(41.0, -9.0, 41.1, -8.9);
        let b = GeoBounds::new(41.05, -8.95, 41.2, -8.8);
        let c = GeoBounds::new(42.0, -8.0, 42.1, -7.9);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_bounds_from_points() {
        let points = [
            Location::new(41.0, -8.0),
            Location::new(41.2, -8.3),
            Location::new(40.9, -7.9),
        ];
        let bounds = GeoBounds::from_points(&points).unwrap();
        assert_eq!(bounds.south, 40.9);
        assert_eq!(bounds.north, 41.2);
        assert_eq!(bounds.west, -8.3);
        assert_eq!(bounds.east, -7.9);
        assert!(GeoBounds::from_points(&[]).is_none());
    }

    #[test]
    fn test_location_validation() {
        assert!(Location::new(41.0, -8.0).is_valid_wgs84());
        assert!(!Location::new(91.0, -8.0).is_valid_wgs84());
        assert!(!Location::new(f64::NAN, 0.0).is_valid_wgs84());
    }
}
