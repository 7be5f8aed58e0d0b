//! WGS84 local tangent plane offsets
//!
//! Converts between geodetic locations and east/north offsets in meters using
//! the ellipsoid's meridional and prime-vertical radii of curvature, evaluated
//! at the mid latitude of the two points. Accurate to centimeters over the few
//! kilometers a sidescan raster spans.

use nalgebra::Vector2;

use crate::core::{Location, EARTH_RADIUS_WGS84, ECCENTRICITY_SQUARED_WGS84};

/// Meridional (M) and prime-vertical (N) radii of curvature at a latitude
pub fn radii_of_curvature(latitude_deg: f64) -> (f64, f64) {
    let sin_lat = latitude_deg.to_radians().sin();
    let w2 = 1.0 - ECCENTRICITY_SQUARED_WGS84 * sin_lat * sin_lat;
    let n = EARTH_RADIUS_WGS84 / w2.sqrt();
    let m = EARTH_RADIUS_WGS84 * (1.0 - ECCENTRICITY_SQUARED_WGS84) / w2.powf(1.5);
    (m, n)
}

fn wrap_longitude_delta(delta_deg: f64) -> f64 {
    let mut d = delta_deg;
    while d > 180.0 {
        d -= 360.0;
    }
    while d < -180.0 {
        d += 360.0;
    }
    d
}

fn wrap_longitude(lon_deg: f64) -> f64 {
    wrap_longitude_delta(lon_deg)
}

/// East/north offset in meters from `origin` to `target`
pub fn local_offset(origin: &Location, target: &Location) -> Vector2<f64> {
    let mid_lat = 0.5 * (origin.latitude + target.latitude);
    let (m, n) = radii_of_curvature(mid_lat);
    let d_lat = (target.latitude - origin.latitude).to_radians();
    let d_lon = wrap_longitude_delta(target.longitude - origin.longitude).to_radians();
    Vector2::new(n * mid_lat.to_radians().cos() * d_lon, m * d_lat)
}

/// Horizontal distance in meters, ignoring depth
pub fn horizontal_distance(a: &Location, b: &Location) -> f64 {
    local_offset(a, b).norm()
}

/// Location displaced by `east`/`north` meters; depth is carried over
pub fn offset_by(origin: &Location, east: f64, north: f64) -> Location {
    // First pass at the origin latitude, second at the mid latitude so the
    // result inverts `local_offset`.
    let (m0, _) = radii_of_curvature(origin.latitude);
    let approx_lat = origin.latitude + (north / m0).to_degrees();
    let mid_lat = 0.5 * (origin.latitude + approx_lat);
    let (m, n) = radii_of_curvature(mid_lat);

    let latitude = origin.latitude + (north / m).to_degrees();
    let cos_lat = mid_lat.to_radians().cos().max(1e-12);
    let longitude = wrap_longitude(origin.longitude + (east / (n * cos_lat)).to_degrees());

    Location {
        latitude,
        longitude,
        depth: origin.depth,
    }
}

/// Location `distance` meters from `origin` along a bearing (degrees clockwise from north)
pub fn offset_along_bearing(origin: &Location, bearing_deg: f64, distance: f64) -> Location {
    let b = bearing_deg.to_radians();
    offset_by(origin, distance * b.sin(), distance * b.cos())
}
