//! Synthetic rasters and images shared by the unit tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use image::{GrayImage, Luma};

use crate::algorithms::geodesy::offset_along_bearing;
use crate::core::{Location, Pose, Raster, RasterType, Sample, SensorInfo};
use crate::processing::parser::PixelSource;
use crate::validation::{SonarError, SonarResult};

pub const ORIGIN: Location = Location {
    latitude: 41.185,
    longitude: -8.705,
    depth: 0.0,
};

pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 16, 10, 0, 0).unwrap()
}

/// Samples along a straight line, one per second
pub fn track_samples(
    start: Location,
    first_index: i64,
    start_time: DateTime<Utc>,
    count: usize,
    spacing_m: f64,
    heading_deg: f64,
    altitude: Option<f64>,
) -> Vec<Sample> {
    (0..count)
        .map(|i| {
            let p = offset_along_bearing(&start, heading_deg, i as f64 * spacing_m);
            let mut pose = Pose::new(p.latitude, p.longitude).with_heading(heading_deg).with_depth(2.0);
            pose.altitude = altitude;
            Sample::new(first_index + i as i64, start_time + Duration::seconds(i as i64), pose)
        })
        .collect()
}

pub fn straight_track(
    count: usize,
    spacing_m: f64,
    heading_deg: f64,
    min_range: f64,
    max_range: f64,
    altitude: Option<f64>,
) -> Raster {
    let samples = track_samples(ORIGIN, 0, epoch(), count, spacing_m, heading_deg, altitude);
    let mut sensor = SensorInfo::new(min_range, max_range);
    sensor.system_name = "lauv-test".to_string();
    Raster::new("track.png", RasterType::Image, samples, sensor).unwrap()
}

/// Image whose pixel value encodes the column (left dark, right bright)
pub fn column_ramp_image(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, _| {
        let value = if width > 1 { x * 254 / (width - 1) + 1 } else { 128 };
        Luma([value as u8])
    })
}

/// Serves ramp images sized to each raster; `missing.png` is unavailable
pub struct RampSource {
    pub columns: u32,
}

impl PixelSource for RampSource {
    fn load(&self, raster: &Raster) -> SonarResult<GrayImage> {
        if raster.filename() == "missing.png" {
            return Err(SonarError::ImageUnavailable {
                path: raster.filename().to_string(),
                reason: "not found".to_string(),
            });
        }
        Ok(column_ramp_image(self.columns, raster.len() as u32))
    }
}
