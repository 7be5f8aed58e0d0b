//! Mosaic export to PNG with a JSON georeference sidecar

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{Location, Raster};
use crate::processing::mosaic::{build_mosaic, CancelToken, Mosaic};
use crate::processing::parser::PixelSource;
use crate::utils::config::MosaicConfig;
use crate::validation::{SonarError, SonarResult};

/// Where a mosaic image sits on the ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MosaicGeoreference {
    pub raster: String,
    pub north_west: Location,
    pub south_east: Location,
    /// Pixels per meter
    pub resolution: f64,
    pub width: u32,
    pub height: u32,
}

impl MosaicGeoreference {
    pub fn of(mosaic: &Mosaic, raster_filename: &str) -> Self {
        Self {
            raster: raster_filename.to_string(),
            north_west: mosaic.origin(),
            south_east: mosaic.south_east(),
            resolution: mosaic.resolution(),
            width: mosaic.width(),
            height: mosaic.height(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(String, SonarError)>,
}

/// Sidecar path for a mosaic image (`x.png` -> `x.json`)
pub fn sidecar_path(png_path: &Path) -> PathBuf {
    png_path.with_extension("json")
}

/// Write `mosaic` as PNG plus its sidecar
pub fn write_mosaic(mosaic: &Mosaic, raster_filename: &str, png_path: &Path) -> SonarResult<()> {
    mosaic.pixels().save(png_path).map_err(|e| SonarError::Io {
        message: format!("Failed to write mosaic '{}': {}", png_path.display(), e),
    })?;

    let sidecar = sidecar_path(png_path);
    let georef = MosaicGeoreference::of(mosaic, raster_filename);
    let content = serde_json::to_string_pretty(&georef).map_err(|e| SonarError::Parse {
        source_name: sidecar.display().to_string(),
        message: e.to_string(),
    })?;
    fs::write(&sidecar, content).map_err(|e| SonarError::Io {
        message: format!("Failed to write '{}': {}", sidecar.display(), e),
    })
}

fn export_one(
    raster: &Raster,
    source: &dyn PixelSource,
    resolution: f64,
    out_dir: &Path,
    config: &MosaicConfig,
) -> SonarResult<PathBuf> {
    let image = source.load(raster)?;
    let mosaic = build_mosaic(raster, &image, resolution, config, &CancelToken::new())?;

    let stem = Path::new(raster.filename())
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| raster.id().to_string());
    let png_path = out_dir.join(format!("{}_mosaic.png", stem));
    write_mosaic(&mosaic, raster.filename(), &png_path)?;
    Ok(png_path)
}

/// Build and write mosaics for `rasters` in parallel.
///
/// A raster that fails is recorded in the report; the rest still export.
pub fn export_mosaics(
    rasters: &[Arc<Raster>],
    source: &dyn PixelSource,
    resolution: f64,
    out_dir: &Path,
    config: &MosaicConfig,
) -> SonarResult<ExportReport> {
    fs::create_dir_all(out_dir).map_err(|e| SonarError::Io {
        message: format!("Failed to create '{}': {}", out_dir.display(), e),
    })?;

    let results: Vec<(String, SonarResult<PathBuf>)> = rasters
        .par_iter()
        .map(|raster| {
            let result = export_one(raster, source, resolution, out_dir, config);
            (raster.filename().to_string(), result)
        })
        .collect();

    let mut report = ExportReport::default();
    for (filename, result) in results {
        match result {
            Ok(path) => report.written.push(path),
            Err(e) => {
                warn!(raster = %filename, error = %e, "mosaic export failed");
                report.failed.push((filename, e));
            }
        }
    }

    info!(
        out_dir = %out_dir.display(),
        written = report.written.len(),
        failed = report.failed.len(),
        "mosaic export finished"
    );
    Ok(report)
}
