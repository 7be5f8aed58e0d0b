//! Geo-rectified mosaic compositor
//!
//! Every scanline is stamped onto a north-up canvas anchored at the footprint's
//! north-west corner. Stamping is done by inverse mapping: for each canvas pixel
//! inside the scanline's rotated strip, the across-track ground offset is turned
//! back into a slant range and then into an image column, so the canvas has no
//! holes at any resolution.
//!
//! Canvas coordinates: x grows east, y grows south, one pixel is
//! `1 / resolution` meters.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::{GrayAlphaImage, GrayImage, LumaA};
use nalgebra::{Point2, Rotation2, Vector2};
use tracing::{debug, info};
use uuid::Uuid;

use crate::algorithms::geodesy::{horizontal_distance, local_offset, offset_by};
use crate::algorithms::projection::{ground_range, slant_for_ground};
use crate::core::{Location, Raster};
use crate::utils::config::MosaicConfig;
use crate::validation::{SonarError, SonarResult};

/// Cooperative cancellation flag shared between a requester and a build
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Composite image of one raster at one ground resolution
#[derive(Debug, Clone)]
pub struct Mosaic {
    raster_id: Uuid,
    resolution: f64,
    origin: Location,
    pixels: GrayAlphaImage,
    stamped: usize,
    skipped: usize,
}

impl Mosaic {
    pub fn raster_id(&self) -> Uuid {
        self.raster_id
    }

    /// Pixels per meter
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// North-west corner of the canvas
    pub fn origin(&self) -> Location {
        self.origin
    }

    pub fn pixels(&self) -> &GrayAlphaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Scanlines drawn onto the canvas
    pub fn stamped_samples(&self) -> usize {
        self.stamped
    }

    /// Scanlines rejected for excessive roll
    pub fn skipped_samples(&self) -> usize {
        self.skipped
    }

    /// South-east corner of the canvas
    pub fn south_east(&self) -> Location {
        offset_by(
            &self.origin,
            self.width() as f64 / self.resolution,
            -(self.height() as f64) / self.resolution,
        )
    }

    /// Geographic location of a pixel center
    pub fn location_of_pixel(&self, x: u32, y: u32) -> Location {
        offset_by(
            &self.origin,
            (x as f64 + 0.5) / self.resolution,
            -(y as f64 + 0.5) / self.resolution,
        )
    }

    /// Pixel containing a location, if it lies on the canvas
    pub fn pixel_of(&self, location: &Location) -> Option<(u32, u32)> {
        let offset = local_offset(&self.origin, location);
        let x = (offset.x * self.resolution).floor();
        let y = (-offset.y * self.resolution).floor();
        if x < 0.0 || y < 0.0 || x >= self.width() as f64 || y >= self.height() as f64 {
            return None;
        }
        Some((x as u32, y as u32))
    }
}

/// Canvas size in pixels for a raster's footprint at `resolution`
pub fn canvas_size(raster: &Raster, resolution: f64, config: &MosaicConfig) -> SonarResult<(u32, u32, Location)> {
    if !(resolution.is_finite() && resolution > 0.0) {
        return Err(SonarError::Config {
            parameter: "resolution".to_string(),
            value: resolution.to_string(),
            reason: "must be a positive number of pixels per meter".to_string(),
        });
    }

    let bounds = raster.bounds()?;
    let origin = bounds.north_west();
    let extent = local_offset(&origin, &bounds.south_east());
    let width = (extent.x.abs() * resolution).round().max(1.0);
    let height = (extent.y.abs() * resolution).round().max(1.0);

    let limit = config.max_canvas_dimension;
    if width > limit as f64 || height > limit as f64 {
        return Err(SonarError::CanvasTooLarge {
            width: width as u64,
            height: height as u64,
            limit,
        });
    }
    Ok((width as u32, height as u32, origin))
}

/// Values of `t` for which `lo <= slope * t + offset <= hi`
fn linear_band(slope: f64, offset: f64, lo: f64, hi: f64) -> Option<(f64, f64)> {
    if slope.abs() < 1e-12 {
        return (lo..=hi)
            .contains(&offset)
            .then_some((f64::NEG_INFINITY, f64::INFINITY));
    }
    let a = (lo - offset) / slope;
    let b = (hi - offset) / slope;
    Some((a.min(b), a.max(b)))
}

/// Columns `[x0, x1)` of canvas row `py` crossed by a scanline's strip.
///
/// The strip spans `across_px` along `across` and `±half_strip` along
/// `forward`, both in pixels from `center`. The span is padded by a pixel on
/// each side; callers still test each pixel against the strip.
fn row_span(
    center: Point2<f64>,
    across: Vector2<f64>,
    forward: Vector2<f64>,
    py: u32,
    across_px: (f64, f64),
    half_strip: f64,
    width: u32,
) -> Option<(u32, u32)> {
    let dy = py as f64 + 0.5 - center.y;
    let (a0, a1) = linear_band(across.x, across.y * dy, across_px.0, across_px.1)?;
    let (f0, f1) = linear_band(forward.x, forward.y * dy, -half_strip, half_strip)?;
    let lo = a0.max(f0) + center.x - 0.5;
    let hi = a1.min(f1) + center.x - 0.5;
    if lo > hi {
        return None;
    }
    let x0 = (lo.floor() - 1.0).max(0.0) as u32;
    let x1 = ((hi.ceil() + 2.0).max(0.0) as u32).min(width);
    (x0 < x1).then_some((x0, x1))
}

/// Build a mosaic of `raster` from its scanline `image`.
///
/// `cancel` is polled before every scanline; once set the build stops and
/// returns `Cancelled` without a partial result.
pub fn build_mosaic(
    raster: &Raster,
    image: &GrayImage,
    resolution: f64,
    config: &MosaicConfig,
    cancel: &CancelToken,
) -> SonarResult<Mosaic> {
    raster.check_image_dimensions(image.width(), image.height())?;
    let (width, height, origin) = canvas_size(raster, resolution, config)?;

    debug!(
        raster = raster.filename(),
        resolution,
        width,
        height,
        "building mosaic"
    );

    let sensor = raster.sensor_info();
    let samples = raster.samples();
    let columns = image.width();
    let swath = sensor.swath_width();
    let step = config.step.max(1);

    let mut canvas = GrayAlphaImage::new(width, height);
    let mut stamped = 0;
    let mut skipped = 0;

    for i in (0..samples.len()).step_by(step) {
        if cancel.is_cancelled() {
            debug!(raster = raster.filename(), resolution, "mosaic build cancelled");
            return Err(SonarError::Cancelled);
        }

        let sample = &samples[i];
        let pose = &sample.pose;
        if pose.phi.abs() > config.roll_limit_deg {
            skipped += 1;
            continue;
        }

        // Along-track spacing to the neighbouring stamped scanline
        let neighbour = if i + step < samples.len() {
            Some(&samples[i + step])
        } else if i >= step {
            Some(&samples[i - step])
        } else {
            None
        };
        let spacing = neighbour
            .map(|n| horizontal_distance(&pose.location(), &n.pose.location()))
            .unwrap_or(0.0)
            .min(config.max_strip_m);
        let half_strip = (spacing * resolution / 2.0).max(0.5) + 0.5;

        let offset = local_offset(&origin, &pose.location());
        let center = Point2::new(offset.x * resolution, -offset.y * resolution);
        let rotation = Rotation2::new(pose.psi.to_radians());
        let across = rotation * Vector2::x();
        let forward = rotation * Vector2::new(0.0, -1.0);

        let altitude = if config.slant_corrected { pose.altitude_or_zero() } else { 0.0 };
        let port = ground_range(sensor.min_range, altitude) * resolution;
        let starboard = ground_range(sensor.max_range, altitude) * resolution;

        let mut min = Vector2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vector2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for u in [port, starboard] {
            for w in [-half_strip, half_strip] {
                let corner = center + across * u + forward * w;
                min = min.inf(&corner.coords);
                max = max.sup(&corner.coords);
            }
        }
        let y0 = min.y.floor().max(0.0) as u32;
        let y1 = (max.y.ceil().max(0.0) as u32).min(height);

        for py in y0..y1 {
            let Some((x0, x1)) = row_span(center, across, forward, py, (port, starboard), half_strip, width) else {
                continue;
            };
            for px in x0..x1 {
                let d = Point2::new(px as f64 + 0.5, py as f64 + 0.5) - center;
                if d.dot(&forward).abs() > half_strip {
                    continue;
                }
                let ground = d.dot(&across) / resolution;
                let slant = if altitude > 0.0 { slant_for_ground(ground, altitude) } else { ground };
                if slant < sensor.min_range || slant >= sensor.max_range {
                    continue;
                }
                let column = (((slant - sensor.min_range) / swath) * columns as f64) as u32;
                let value = image.get_pixel(column.min(columns - 1), i as u32).0[0];
                canvas.put_pixel(px, py, LumaA([value, 255]));
            }
        }
        stamped += 1;
    }

    info!(
        raster = raster.filename(),
        resolution,
        stamped,
        skipped,
        "mosaic built"
    );

    Ok(Mosaic {
        raster_id: raster.id(),
        resolution,
        origin,
        pixels: canvas,
        stamped,
        skipped,
    })
}
