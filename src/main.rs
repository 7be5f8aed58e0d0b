//! Sidescan mosaic command line
//!
//! ```bash
//! # Coverage polygon of a raster
//! sidescan-mosaic footprint survey/leg03.json
//!
//! # Geo-rectified mosaic at 4 px/m
//! sidescan-mosaic mosaic survey/leg03.json --resolution 4 --out leg03_mosaic.png
//!
//! # Look for new sightings of a contact in every raster of a survey
//! sidescan-mosaic correlate contacts/tyre.json survey/ --write
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use sidescan_mosaic::processing::write_mosaic;
use sidescan_mosaic::{
    build_mosaic, load_contact, load_index, save_contact, setup_logging, CancelToken, EngineConfig, FilePixelSource,
    PixelSource, RasterCatalog, SonarError, SonarResult,
};

#[derive(Parser)]
#[command(name = "sidescan-mosaic")]
#[command(version)]
#[command(about = "Georeferencing, mosaicking and target reacquisition for sidescan rasters")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (JSON)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset (overrides the configuration)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a raster's footprint hull and bounds as JSON
    Footprint {
        /// Raster index file
        index: PathBuf,
    },

    /// Build a mosaic and write it as PNG with a georeference sidecar
    Mosaic {
        /// Raster index file
        index: PathBuf,

        /// Ground resolution in pixels per meter
        #[arg(long, short)]
        resolution: f64,

        /// Output PNG path
        #[arg(long, short)]
        out: PathBuf,

        /// Use every n-th scanline
        #[arg(long)]
        step: Option<usize>,
    },

    /// Search a directory of rasters for new sightings of a contact
    Correlate {
        /// Contact file
        contact: PathBuf,

        /// Directory of raster index files
        rasters: PathBuf,

        /// Append the new observations to the contact file
        #[arg(long)]
        write: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => EngineConfig::default(),
    };

    setup_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(config.worker_threads)
        .build_global()
    {
        warn!(error = %e, "using default rayon pool");
    }

    let result = match cli.command {
        Commands::Footprint { index } => cmd_footprint(index),
        Commands::Mosaic {
            index,
            resolution,
            out,
            step,
        } => cmd_mosaic(index, resolution, out, step, &config),
        Commands::Correlate { contact, rasters, write } => cmd_correlate(contact, rasters, write, &config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_json(value: &serde_json::Value) -> SonarResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| SonarError::Parse {
        source_name: "stdout".to_string(),
        message: e.to_string(),
    })?;
    println!("{}", text);
    Ok(())
}

fn cmd_footprint(index: PathBuf) -> SonarResult<()> {
    let raster = load_index(&index)?;
    let footprint = raster.footprint()?;

    print_json(&serde_json::json!({
        "raster": raster.filename(),
        "samples": raster.len(),
        "hull": footprint.hull(),
        "bounds": footprint.bounds(),
        "area-m2": footprint.area_m2(),
    }))
}

fn cmd_mosaic(
    index: PathBuf,
    resolution: f64,
    out: PathBuf,
    step: Option<usize>,
    config: &EngineConfig,
) -> SonarResult<()> {
    let mut mosaic_config = config.mosaic.clone();
    if let Some(step) = step {
        mosaic_config.step = step.max(1);
    }

    let raster = load_index(&index)?;
    let image = FilePixelSource.load(&raster)?;
    let mosaic = build_mosaic(&raster, &image, resolution, &mosaic_config, &CancelToken::new())?;
    write_mosaic(&mosaic, raster.filename(), &out)?;

    info!(
        out = %out.display(),
        width = mosaic.width(),
        height = mosaic.height(),
        skipped = mosaic.skipped_samples(),
        "mosaic written"
    );
    Ok(())
}

fn cmd_correlate(contact_path: PathBuf, rasters: PathBuf, write: bool, config: &EngineConfig) -> SonarResult<()> {
    let mut contact = load_contact(&contact_path)?;
    let catalog = RasterCatalog::load_dir(&rasters)?;

    let found = catalog.find_reacquisitions(&contact, &config.correlation);
    print_json(&serde_json::json!(found))?;

    if write && !found.is_empty() {
        let added = contact.append_observations(found);
        save_contact(&contact, &contact_path)?;
        info!(contact = %contact_path.display(), added, "contact updated");
    }
    Ok(())
}
