//! Per-raster render gate
//!
//! Decides on every paint whether a raster is drawn at all, as its footprint
//! outline, or as a mosaic, and schedules mosaic builds in the background.
//! Paint never blocks: while a build is pending the outline is drawn instead.
//!
//! The gate is the single owner of its mosaic buffer. Workers only post
//! outcomes to the gate's inbox; the gate commits them during `paint` (or
//! `wait_for_build`) and discards any outcome from a superseded request.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use image::GrayAlphaImage;
use nalgebra::{Matrix3, Point2, Vector2};
use tracing::{debug, warn};

use crate::algorithms::geodesy::{local_offset, offset_by};
use crate::api::worker::{BuildInbox, MosaicWorker};
use crate::core::{GeoBounds, Location, Raster};
use crate::processing::mosaic::{CancelToken, Mosaic};
use crate::utils::config::RenderConfig;
use crate::validation::SonarError;

/// Map view the gate renders into
pub trait Viewport {
    fn visible_bounds(&self) -> GeoBounds;

    /// Screen pixels per ground meter
    fn ground_resolution(&self) -> f64;

    fn to_screen(&self, location: &Location) -> Point2<f64>;
}

/// Drawing surface
pub trait Canvas {
    fn draw_outline(&mut self, points: &[Point2<f64>]);

    /// Draw `image` with `transform` mapping image pixels to screen pixels
    fn draw_image(&mut self, image: &GrayAlphaImage, transform: &Matrix3<f64>);
}

/// Anything stacked on the map. Layers with a key are painted in key order,
/// keyless layers after them.
pub trait MapLayer {
    fn ordering_key(&self) -> Option<DateTime<Utc>>;

    fn paint(&mut self, viewport: &dyn Viewport, canvas: &mut dyn Canvas);
}

/// Stable sort into paint order
pub fn sort_layers(layers: &mut [Box<dyn MapLayer>]) {
    layers.sort_by(|a, b| match (a.ordering_key(), b.ordering_key()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// North-up viewport centered on a location
#[derive(Debug, Clone, PartialEq)]
pub struct LocalViewport {
    pub center: Location,
    /// Screen pixels per meter
    pub resolution: f64,
    pub width: u32,
    pub height: u32,
}

impl LocalViewport {
    pub fn new(center: Location, resolution: f64, width: u32, height: u32) -> Self {
        Self {
            center,
            resolution,
            width,
            height,
        }
    }
}

impl Viewport for LocalViewport {
    fn visible_bounds(&self) -> GeoBounds {
        let half_w = self.width as f64 / 2.0 / self.resolution;
        let half_h = self.height as f64 / 2.0 / self.resolution;
        let nw = offset_by(&self.center, -half_w, half_h);
        let se = offset_by(&self.center, half_w, -half_h);
        GeoBounds::new(se.latitude, nw.longitude, nw.latitude, se.longitude)
    }

    fn ground_resolution(&self) -> f64 {
        self.resolution
    }

    fn to_screen(&self, location: &Location) -> Point2<f64> {
        let offset = local_offset(&self.center, location);
        Point2::new(
            self.width as f64 / 2.0 + offset.x * self.resolution,
            self.height as f64 / 2.0 - offset.y * self.resolution,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateState {
    Hidden,
    Footprint,
    MosaicPending(f64),
    MosaicReady(f64),
}

#[derive(Debug)]
struct PendingBuild {
    generation: u64,
    resolution: f64,
    cancel: CancelToken,
}

/// Render state machine for one raster
pub struct MosaicGate {
    raster: Arc<Raster>,
    worker: Arc<MosaicWorker>,
    config: RenderConfig,
    inbox: Arc<BuildInbox>,
    state: GateState,
    generation: u64,
    pending: Option<PendingBuild>,
    ready: Option<Arc<Mosaic>>,
    image_unavailable: bool,
    failed_resolution: Option<f64>,
}

impl MosaicGate {
    pub fn new(raster: Arc<Raster>, worker: Arc<MosaicWorker>, config: RenderConfig) -> Self {
        Self {
            raster,
            worker,
            config,
            inbox: Arc::new(BuildInbox::new()),
            state: GateState::Hidden,
            generation: 0,
            pending: None,
            ready: None,
            image_unavailable: false,
            failed_resolution: None,
        }
    }

    pub fn raster(&self) -> &Arc<Raster> {
        &self.raster
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Last committed mosaic, if still held
    pub fn mosaic(&self) -> Option<&Arc<Mosaic>> {
        self.ready.as_ref()
    }

    /// Resolution a build is requested at for viewport resolution `r`
    pub fn build_resolution(&self, r: f64) -> f64 {
        let r = if self.config.quantize_resolution {
            2f64.powi(r.log2().floor() as i32)
        } else {
            r
        };
        r.min(self.config.max_mosaic_resolution)
    }

    /// Update state for `viewport` and draw
    pub fn paint(&mut self, viewport: &dyn Viewport, canvas: &mut dyn Canvas) -> GateState {
        self.collect_builds();

        let raster = Arc::clone(&self.raster);
        let footprint = match raster.footprint() {
            Ok(footprint) => footprint,
            Err(e) => {
                debug!(raster = raster.filename(), error = %e, "no footprint, not drawn");
                self.hide();
                return self.state;
            }
        };

        if !footprint.bounds().intersects(&viewport.visible_bounds()) {
            self.hide();
            return self.state;
        }

        let outline: Vec<Point2<f64>> = footprint.hull().iter().map(|p| viewport.to_screen(p)).collect();
        let r = viewport.ground_resolution();

        if !(r >= self.config.min_mosaic_resolution) || self.image_unavailable {
            self.cancel_pending();
            self.transition(GateState::Footprint);
            canvas.draw_outline(&outline);
            return self.state;
        }

        let target = self.build_resolution(r);

        if let Some(mosaic) = self.ready.as_ref().filter(|m| m.resolution() == target) {
            let transform = draw_transform(mosaic, viewport);
            canvas.draw_image(mosaic.pixels(), &transform);
            self.transition(GateState::MosaicReady(target));
            return self.state;
        }

        if self.failed_resolution == Some(target) {
            self.transition(GateState::Footprint);
            canvas.draw_outline(&outline);
            return self.state;
        }

        if self.pending.as_ref().map(|p| p.resolution) != Some(target) {
            self.request(target);
        }
        self.transition(GateState::MosaicPending(target));
        canvas.draw_outline(&outline);
        self.state
    }

    /// Block until the pending build reports or `timeout` passes.
    /// Returns `true` once nothing is pending.
    pub fn wait_for_build(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.collect_builds();
            if self.pending.is_none() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || !self.inbox.wait(remaining) {
                self.collect_builds();
                return self.pending.is_none();
            }
        }
    }

    fn request(&mut self, resolution: f64) {
        self.cancel_pending();
        // A buffer at another resolution must never be shown for this request
        self.ready = None;

        self.generation += 1;
        let cancel = CancelToken::new();
        self.worker.submit(
            Arc::clone(&self.raster),
            resolution,
            self.generation,
            cancel.clone(),
            Arc::clone(&self.inbox),
        );
        debug!(
            raster = self.raster.filename(),
            generation = self.generation,
            resolution,
            "mosaic build requested"
        );
        self.pending = Some(PendingBuild {
            generation: self.generation,
            resolution,
            cancel,
        });
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
            debug!(
                raster = self.raster.filename(),
                generation = pending.generation,
                "mosaic build cancelled"
            );
        }
    }

    fn hide(&mut self) {
        self.cancel_pending();
        self.ready = None;
        self.transition(GateState::Hidden);
    }

    fn transition(&mut self, next: GateState) {
        if self.state != next {
            debug!(raster = self.raster.filename(), from = ?self.state, to = ?next, "gate transition");
            self.state = next;
        }
    }

    fn collect_builds(&mut self) {
        for outcome in self.inbox.drain() {
            let current = self
                .pending
                .as_ref()
                .map_or(false, |p| p.generation == outcome.generation);
            if !current {
                debug!(generation = outcome.generation, "discarding superseded build");
                continue;
            }
            self.pending = None;

            match outcome.result {
                Ok(mosaic) => {
                    self.ready = Some(mosaic);
                    self.transition(GateState::MosaicReady(outcome.resolution));
                }
                Err(SonarError::Cancelled) => {}
                Err(e @ SonarError::ImageUnavailable { .. }) | Err(e @ SonarError::MalformedRaster { .. }) => {
                    warn!(raster = self.raster.filename(), error = %e, "raster image unusable, drawing footprint only");
                    self.image_unavailable = true;
                    self.transition(GateState::Footprint);
                }
                Err(e) => {
                    warn!(
                        raster = self.raster.filename(),
                        resolution = outcome.resolution,
                        error = %e,
                        "mosaic build failed"
                    );
                    self.failed_resolution = Some(outcome.resolution);
                    self.transition(GateState::Footprint);
                }
            }
        }
    }
}

impl Drop for MosaicGate {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

impl MapLayer for MosaicGate {
    fn ordering_key(&self) -> Option<DateTime<Utc>> {
        Some(self.raster.start_time())
    }

    fn paint(&mut self, viewport: &dyn Viewport, canvas: &mut dyn Canvas) {
        MosaicGate::paint(self, viewport, canvas);
    }
}

/// Mosaic pixels to screen pixels. The scale comes from the viewport at paint
/// time, so a buffer built at a different resolution is stretched to fit.
fn draw_transform(mosaic: &Mosaic, viewport: &dyn Viewport) -> Matrix3<f64> {
    let nw = viewport.to_screen(&mosaic.origin());
    let se = viewport.to_screen(&mosaic.south_east());
    let scale = Vector2::new(
        (se.x - nw.x) / mosaic.width() as f64,
        (se.y - nw.y) / mosaic.height() as f64,
    );
    Matrix3::new_translation(&nw.coords) * Matrix3::new_nonuniform_scaling(&scale)
}
