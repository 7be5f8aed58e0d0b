//! Validated sidescan raster
//!
//! A raster pairs an external scanline image with one navigation sample per
//! image row. Construction rejects anything the geometry code cannot work with;
//! after that the sample data never changes, so derived geometry is cached.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::algorithms::footprint::{compute_footprint, Footprint};
use crate::core::{GeoBounds, RasterType, Sample, SensorInfo};
use crate::validation::{SonarError, SonarResult};

#[derive(Debug)]
pub struct Raster {
    id: Uuid,
    filename: String,
    raster_type: RasterType,
    samples: Vec<Sample>,
    sensor_info: SensorInfo,
    base_dir: Option<PathBuf>,
    columns: Option<u32>,
    footprint: OnceLock<SonarResult<Footprint>>,
}

impl Raster {
    /// Validate and build a raster.
    ///
    /// Fails with `MalformedRaster` for an empty sample list, timestamps going
    /// backwards, positions outside WGS84 ranges or `max_range <= min_range`.
    pub fn new(
        filename: impl Into<String>,
        raster_type: RasterType,
        samples: Vec<Sample>,
        sensor_info: SensorInfo,
    ) -> SonarResult<Self> {
        let filename = filename.into();

        if samples.is_empty() {
            return Err(SonarError::malformed(filename, "raster has no samples"));
        }
        if !sensor_info.is_valid() {
            return Err(SonarError::malformed(
                filename,
                format!(
                    "max-range ({}) must exceed min-range ({})",
                    sensor_info.max_range, sensor_info.min_range
                ),
            ));
        }
        for (i, sample) in samples.iter().enumerate() {
            if !sample.pose.location().is_valid_wgs84() {
                return Err(SonarError::malformed(
                    filename,
                    format!("sample {} has invalid position", i),
                ));
            }
            if i > 0 && sample.timestamp < samples[i - 1].timestamp {
                return Err(SonarError::malformed(
                    filename,
                    format!("sample timestamps go backwards at index {}", i),
                ));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            filename,
            raster_type,
            samples,
            sensor_info,
            base_dir: None,
            columns: None,
            footprint: OnceLock::new(),
        })
    }

    /// Directory the image filename is resolved against
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Record the image width once it is known
    pub fn with_columns(mut self, columns: u32) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Identity used to key mosaics
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn raster_type(&self) -> RasterType {
        self.raster_type
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sensor_info(&self) -> &SensorInfo {
        &self.sensor_info
    }

    pub fn columns(&self) -> Option<u32> {
        self.columns
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn image_path(&self) -> PathBuf {
        match &self.base_dir {
            Some(dir) => dir.join(&self.filename),
            None => Path::new(&self.filename).to_path_buf(),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.samples[0].timestamp
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].timestamp
    }

    /// Check that an image has one row per sample
    pub fn check_image_dimensions(&self, width: u32, height: u32) -> SonarResult<()> {
        if width == 0 {
            return Err(SonarError::malformed(&self.filename, "image has zero columns"));
        }
        if height as usize != self.samples.len() {
            return Err(SonarError::malformed(
                &self.filename,
                format!("image has {} rows but raster has {} samples", height, self.samples.len()),
            ));
        }
        Ok(())
    }

    /// Footprint polygon, computed on first use
    pub fn footprint(&self) -> SonarResult<&Footprint> {
        self.footprint
            .get_or_init(|| compute_footprint(&self.samples, &self.sensor_info))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Bounding box of the footprint, for viewport culling
    pub fn bounds(&self) -> SonarResult<GeoBounds> {
        self.footprint().map(|f| f.bounds())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Pose;
    use crate::test_utils::{epoch, straight_track};
    use chrono::Duration;

    #[test]
    fn test_empty_samples_rejected() {
        let result = Raster::new("empty.png", RasterType::Image, vec![], SensorInfo::new(-50.0, 50.0));
        match result {
            Err(SonarError::MalformedRaster { filename, .. }) => assert_eq!(filename, "empty.png"),
            other => panic!("expected MalformedRaster, got {:?}", other),
        }
    }

    #[test]
    fn test_inverted_range_rejected() {
        let samples = vec![Sample::new(0, epoch(), Pose::new(41.0, -8.0))];
        let result = Raster::new("bad.png", RasterType::Image, samples, SensorInfo::new(50.0, -50.0));
        assert!(matches!(result, Err(SonarError::MalformedRaster { .. })));
    }

    #[test]
    fn test_unordered_timestamps_rejected() {
        let samples = vec![
            Sample::new(0, epoch() + Duration::seconds(2), Pose::new(41.0, -8.0)),
            Sample::new(1, epoch(), Pose::new(41.0, -8.0)),
        ];
        let result = Raster::new("bad.png", RasterType::Image, samples, SensorInfo::new(-50.0, 50.0));
        assert!(matches!(result, Err(SonarError::MalformedRaster { .. })));
    }

    #[test]
    fn test_equal_timestamps_accepted() {
        let samples = vec![
            Sample::new(0, epoch(), Pose::new(41.0, -8.0)),
            Sample::new(1, epoch(), Pose::new(41.0001, -8.0)),
        ];
        assert!(Raster::new("ok.png", RasterType::Scanline, samples, SensorInfo::new(-50.0, 50.0)).is_ok());
    }

    #[test]
    fn test_image_dimension_check() {
        let raster = straight_track(20, 1.0, 0.0, -30.0, 30.0, None);
        assert!(raster.check_image_dimensions(200, 20).is_ok());
        assert!(raster.check_image_dimensions(200, 21).is_err());
        assert!(raster.check_image_dimensions(0, 20).is_err());
    }

    #[test]
    fn test_footprint_cached() {
        let raster = straight_track(20, 1.0, 0.0, -30.0, 30.0, None);
        let a = raster.footprint().unwrap() as *const Footprint;
        let b = raster.footprint().unwrap() as *const Footprint;
        assert_eq!(a, b);
    }

    #[test]
    fn test_image_path_resolution() {
        let raster = straight_track(2, 1.0, 0.0, -30.0, 30.0, None).with_base_dir("/data/run1");
        assert_eq!(raster.image_path(), PathBuf::from("/data/run1/track.png"));
    }
}
