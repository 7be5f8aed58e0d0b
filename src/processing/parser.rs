//! Raster index and contact file parsing
//!
//! A raster index is a JSON document naming the pixel image and listing one
//! navigation sample per image row:
//!
//! ```json
//! {
//!   "filename": "leg03.png",
//!   "raster-type": "image",
//!   "sensor-info": { "min-range": -50, "max-range": 50, "system-name": "lauv-xplore-1" },
//!   "samples": [
//!     { "index": 0, "timestamp": 1715853600000,
//!       "pose": { "latitude": 41.18, "longitude": -8.70, "psi": 90, "altitude": 4.2 } }
//!   ]
//! }
//! ```
//!
//! Timestamps are epoch milliseconds or RFC 3339 strings.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{Contact, Pose, Raster, RasterType, Sample, SensorInfo};
use crate::validation::{SonarError, SonarResult};

/// On-disk form of a raster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RasterIndex {
    pub filename: String,
    #[serde(default)]
    pub raster_type: RasterType,
    pub sensor_info: SensorInfo,
    pub samples: Vec<IndexSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSample {
    pub index: i64,
    pub timestamp: IndexTimestamp,
    pub pose: Pose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexTimestamp {
    Millis(i64),
    Text(DateTime<Utc>),
}

impl IndexTimestamp {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            IndexTimestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            IndexTimestamp::Text(t) => Some(*t),
        }
    }
}

impl RasterIndex {
    pub fn from_raster(raster: &Raster) -> Self {
        Self {
            filename: raster.filename().to_string(),
            raster_type: raster.raster_type(),
            sensor_info: raster.sensor_info().clone(),
            samples: raster
                .samples()
                .iter()
                .map(|s| IndexSample {
                    index: s.index,
                    timestamp: IndexTimestamp::Text(s.timestamp),
                    pose: s.pose.clone(),
                })
                .collect(),
        }
    }

    /// Validate into a raster
    pub fn into_raster(self) -> SonarResult<Raster> {
        let mut samples = Vec::with_capacity(self.samples.len());
        for (i, sample) in self.samples.into_iter().enumerate() {
            let timestamp = sample.timestamp.resolve().ok_or_else(|| {
                SonarError::malformed(&self.filename, format!("sample {} has an out-of-range timestamp", i))
            })?;
            samples.push(Sample::new(sample.index, timestamp, sample.pose));
        }
        Raster::new(self.filename, self.raster_type, samples, self.sensor_info)
    }
}

/// Parse an index document. `source_name` is only used in error messages.
pub fn parse_index(json: &str, source_name: &str) -> SonarResult<Raster> {
    let index: RasterIndex = serde_json::from_str(json).map_err(|e| SonarError::Parse {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })?;
    index.into_raster()
}

/// Load an index file and read the header of the image it references.
///
/// The image is resolved relative to the index file. Only its header is read.
/// A missing or unreadable image still yields a raster (with unknown column
/// count); an image whose row count disagrees with the samples does not.
pub fn load_index<P: AsRef<Path>>(path: P) -> SonarResult<Raster> {
    let path = path.as_ref();
    let source_name = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|e| SonarError::Io {
        message: format!("Failed to read raster index '{}': {}", source_name, e),
    })?;

    let mut raster = parse_index(&content, &source_name)?;
    if let Some(dir) = path.parent() {
        raster = raster.with_base_dir(dir);
    }

    let image_path = raster.image_path();
    match image::image_dimensions(&image_path) {
        Ok((width, height)) => {
            raster.check_image_dimensions(width, height)?;
            debug!(index = %source_name, width, height, "raster image header read");
            Ok(raster.with_columns(width))
        }
        Err(e) => {
            warn!(
                index = %source_name,
                image = %image_path.display(),
                error = %e,
                "raster image unavailable, column count unknown"
            );
            Ok(raster)
        }
    }
}

/// Supplies decoded scanline images for rasters
pub trait PixelSource: Send + Sync {
    fn load(&self, raster: &Raster) -> SonarResult<GrayImage>;
}

/// Decodes the image file next to the raster index
#[derive(Debug, Clone, Copy, Default)]
pub struct FilePixelSource;

impl PixelSource for FilePixelSource {
    fn load(&self, raster: &Raster) -> SonarResult<GrayImage> {
        let path = raster.image_path();
        let image = image::open(&path).map_err(|e| SonarError::ImageUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let image = image.to_luma8();
        raster.check_image_dimensions(image.width(), image.height())?;
        Ok(image)
    }
}

/// Write a raster's index document
pub fn save_index<P: AsRef<Path>>(raster: &Raster, path: P) -> SonarResult<()> {
    write_json(&RasterIndex::from_raster(raster), path.as_ref())
}

pub fn load_contact<P: AsRef<Path>>(path: P) -> SonarResult<Contact> {
    let path = path.as_ref();
    let source_name = path.to_string_lossy().to_string();
    let content = fs::read_to_string(path).map_err(|e| SonarError::Io {
        message: format!("Failed to read contact '{}': {}", source_name, e),
    })?;
    serde_json::from_str(&content).map_err(|e| SonarError::Parse {
        source_name,
        message: e.to_string(),
    })
}

pub fn save_contact<P: AsRef<Path>>(contact: &Contact, path: P) -> SonarResult<()> {
    write_json(contact, path.as_ref())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> SonarResult<()> {
    let source_name = path.to_string_lossy().to_string();
    let content = serde_json::to_string_pretty(value).map_err(|e| SonarError::Parse {
        source_name: source_name.clone(),
        message: e.to_string(),
    })?;
    fs::write(path, content).map_err(|e| SonarError::Io {
        message: format!("Failed to write '{}': {}", source_name, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Location;
    use crate::test_utils::{column_ramp_image, straight_track};

    const INDEX: &str = r#"{
        "filename": "leg03.png",
        "raster-type": "scanline",
        "sensor-info": { "min-range": -50, "max-range": 50, "frequency": 900000, "system-name": "lauv-xplore-1" },
        "samples": [
            { "index": 10, "timestamp": 1715853600000,
              "pose": { "latitude": 41.18, "longitude": -8.70, "psi": 90, "altitude": 4.2, "depth": 1.5 } },
            { "index": 11, "timestamp": "2024-05-16T10:00:01Z",
              "pose": { "latitude": 41.18, "longitude": -8.6999 } }
        ]
    }"#;

    #[test]
    fn test_parse_index() {
        let raster = parse_index(INDEX, "inline").unwrap();
        assert_eq!(raster.filename(), "leg03.png");
        assert_eq!(raster.raster_type(), RasterType::Scanline);
        assert_eq!(raster.len(), 2);
        assert_eq!(raster.sensor_info().system_name, "lauv-xplore-1");
        assert_eq!(raster.columns(), None);

        let first = &raster.samples()[0];
        assert_eq!(first.index, 10);
        assert_eq!(first.timestamp, Utc.with_ymd_and_hms(2024, 5, 16, 10, 0, 0).unwrap());
        assert_eq!(first.pose.altitude, Some(4.2));
        assert_eq!(first.pose.psi, 90.0);

        let second = &raster.samples()[1];
        assert_eq!(second.pose.altitude, None);
        assert_eq!(second.pose.depth, None);
        assert_eq!(second.pose.phi, 0.0);
        assert_eq!(raster.end_time() - raster.start_time(), chrono::Duration::seconds(1));
    }

    #[test]
    fn test_parse_errors_classified() {
        assert!(matches!(parse_index("{ not json", "bad"), Err(SonarError::Parse { .. })));

        let empty = r#"{ "filename": "x.png", "sensor-info": { "min-range": -5, "max-range": 5 }, "samples": [] }"#;
        assert!(matches!(parse_index(empty, "empty"), Err(SonarError::MalformedRaster { .. })));

        let bad_lat = INDEX.replace("41.18, \"longitude\": -8.70", "91.0, \"longitude\": -8.70");
        assert!(matches!(parse_index(&bad_lat, "lat"), Err(SonarError::MalformedRaster { .. })));
    }

    #[test]
    fn test_load_index_reads_image_header() {
        let dir = tempfile::tempdir().unwrap();
        let raster = straight_track(25, 1.0, 0.0, -30.0, 30.0, Some(3.0));
        save_index(&raster, dir.path().join("track.json")).unwrap();
        column_ramp_image(120, 25).save(dir.path().join("track.png")).unwrap();

        let loaded = load_index(dir.path().join("track.json")).unwrap();
        assert_eq!(loaded.columns(), Some(120));
        assert_eq!(loaded.len(), 25);
        assert_eq!(loaded.image_path(), dir.path().join("track.png"));
        assert_eq!(loaded.samples()[7].timestamp, raster.samples()[7].timestamp);
    }

    #[test]
    fn test_load_index_without_image() {
        let dir = tempfile::tempdir().unwrap();
        let raster = straight_track(5, 1.0, 0.0, -30.0, 30.0, None);
        save_index(&raster, dir.path().join("track.json")).unwrap();

        let loaded = load_index(dir.path().join("track.json")).unwrap();
        assert_eq!(loaded.columns(), None);
    }

    #[test]
    fn test_load_index_row_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let raster = straight_track(5, 1.0, 0.0, -30.0, 30.0, None);
        save_index(&raster, dir.path().join("track.json")).unwrap();
        column_ramp_image(50, 6).save(dir.path().join("track.png")).unwrap();

        let result = load_index(dir.path().join("track.json"));
        assert!(matches!(result, Err(SonarError::MalformedRaster { .. })));
    }

    #[test]
    fn test_file_pixel_source() {
        let dir = tempfile::tempdir().unwrap();
        let raster = straight_track(8, 1.0, 0.0, -30.0, 30.0, None).with_base_dir(dir.path());

        let missing = FilePixelSource.load(&raster);
        assert!(matches!(missing, Err(SonarError::ImageUnavailable { .. })));

        column_ramp_image(64, 8).save(dir.path().join("track.png")).unwrap();
        let image = FilePixelSource.load(&raster).unwrap();
        assert_eq!(image.dimensions(), (64, 8));
        assert_eq!(image.get_pixel(63, 0).0[0], 255);
    }

    #[test]
    fn test_missing_index_is_io_error() {
        assert!(matches!(load_index("/nonexistent/index.json"), Err(SonarError::Io { .. })));
    }

    #[test]
    fn test_contact_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact.json");
        let mut contact = Contact::new("anchor", Location::new(41.19, -8.71));
        contact.depth = Some(12.0);
        save_contact(&contact, &path).unwrap();

        let loaded = load_contact(&path).unwrap();
        assert_eq!(loaded, contact);
        assert!(loaded.observations.is_empty());
        assert_eq!(loaded.observation_times().len(), 0);
    }
}
