//! Collection of rasters from one survey
//!
//! Rasters are immutable once loaded and shared behind `Arc`, so the same
//! instance can be painted, mosaicked and searched concurrently.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::algorithms::correlation::find_reacquisitions_excluding;
use crate::core::{Contact, GeoBounds, Observation, Raster};
use crate::processing::parser::load_index;
use crate::utils::config::CorrelationConfig;
use crate::validation::{SonarError, SonarResult};

#[derive(Debug, Default)]
pub struct RasterCatalog {
    rasters: Vec<Arc<Raster>>,
}

impl RasterCatalog {
    /// Catalog ordered by first sample time
    pub fn new(rasters: Vec<Raster>) -> Self {
        let mut rasters: Vec<Arc<Raster>> = rasters.into_iter().map(Arc::new).collect();
        rasters.sort_by_key(|r| r.start_time());
        Self { rasters }
    }

    /// Load every `*.json` raster index in `dir`.
    ///
    /// Files that are not valid indices are skipped with a warning.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> SonarResult<Self> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|e| SonarError::Io {
            message: format!("Failed to list '{}': {}", dir.display(), e),
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut rasters = Vec::with_capacity(paths.len());
        for path in paths {
            match load_index(&path) {
                Ok(raster) => rasters.push(raster),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping raster index"),
            }
        }

        info!(dir = %dir.display(), rasters = rasters.len(), "raster catalog loaded");
        Ok(Self::new(rasters))
    }

    pub fn rasters(&self) -> &[Arc<Raster>] {
        &self.rasters
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn find(&self, filename: &str) -> Option<&Arc<Raster>> {
        self.rasters.iter().find(|r| r.filename() == filename)
    }

    /// Rasters whose footprint bounds overlap `view`. Rasters with degenerate
    /// footprints are never visible.
    pub fn visible_in(&self, view: &GeoBounds) -> Vec<Arc<Raster>> {
        self.rasters
            .iter()
            .filter(|r| r.bounds().map_or(false, |b| b.intersects(view)))
            .cloned()
            .collect()
    }

    /// Search every raster for new sightings of `contact`, excluding the
    /// neighbourhood of each sighting it already has.
    pub fn find_reacquisitions(&self, contact: &Contact, config: &CorrelationConfig) -> Vec<Observation> {
        let target = contact.location();
        let exclusions = contact.observation_times();
        let window = config.exclusion_window();

        let per_raster: Vec<Vec<Observation>> = self
            .rasters
            .par_iter()
            .map(|raster| {
                let found = find_reacquisitions_excluding(raster, &target, &exclusions, window, config);
                debug!(raster = raster.filename(), found = found.len(), "raster searched");
                found
            })
            .collect();

        per_raster.into_iter().flatten().collect()
    }

    /// Append new sightings to `contact`; returns how many were added
    pub fn correlate_contact(&self, contact: &mut Contact, config: &CorrelationConfig) -> usize {
        let found = self.find_reacquisitions(contact, config);
        let added = contact.append_observations(found);
        info!(contact = %contact.label, added, total = contact.observations.len(), "contact correlated");
        added
    }
}
