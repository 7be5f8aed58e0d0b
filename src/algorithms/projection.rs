//! Range-to-ground projection
//!
//! Maps a pixel column of a scanline to the geographic point it images. Columns
//! span the sensor's signed range domain linearly: negative ranges are on the
//! port side, positive ranges on starboard.

use crate::algorithms::geodesy::offset_along_bearing;
use crate::core::{Location, Sample, SensorInfo, GROUND_RANGE_EPSILON};

/// Signed slant range of a pixel column
pub fn slant_range(sensor: &SensorInfo, column: f64, image_width: u32) -> f64 {
    if image_width == 0 {
        return sensor.min_range;
    }
    column * (sensor.swath_width() / image_width as f64) + sensor.min_range
}

/// Signed ground range for a slant range.
///
/// Inside the nadir shadow (`|slant| <= altitude`) there is no valid ground
/// range and `0.0` is returned.
pub fn ground_range(slant: f64, altitude: f64) -> f64 {
    if slant.abs() > altitude {
        slant.signum() * (slant * slant - altitude * altitude).sqrt()
    } else {
        0.0
    }
}

/// Signed slant range observed at a signed ground range (inverse of [`ground_range`])
pub fn slant_for_ground(ground: f64, altitude: f64) -> f64 {
    let magnitude = (ground * ground + altitude * altitude).sqrt();
    if ground < 0.0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Project a signed slant range from the sample's position.
///
/// Port ranges are laid along `heading - 90°`, starboard along `heading + 90°`.
/// A missing altitude counts as zero, so correction is a no-op.
pub fn project_slant(sample: &Sample, slant: f64, slant_corrected: bool) -> Location {
    let pose = &sample.pose;
    let ground = if slant_corrected {
        ground_range(slant, pose.altitude_or_zero())
    } else {
        slant
    };

    let origin = pose.location();
    if ground.abs() < GROUND_RANGE_EPSILON {
        return origin;
    }

    let bearing = if ground < 0.0 { pose.psi - 90.0 } else { pose.psi + 90.0 };
    offset_along_bearing(&origin, bearing, ground.abs())
}

/// Ground location imaged by `column` of the sample's scanline
pub fn project(
    sensor: &SensorInfo,
    sample: &Sample,
    column: f64,
    image_width: u32,
    slant_corrected: bool,
) -> Location {
    project_slant(sample, slant_range(sensor, column, image_width), slant_corrected)
}
