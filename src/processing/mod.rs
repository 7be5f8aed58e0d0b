//! Raster loading, mosaic building and export

pub mod catalog;
pub mod export;
pub mod mosaic;
pub mod parser;

pub use catalog::RasterCatalog;
pub use export::{export_mosaics, write_mosaic, ExportReport, MosaicGeoreference};
pub use mosaic::{build_mosaic, CancelToken, Mosaic};
pub use parser::{load_contact, load_index, save_contact, FilePixelSource, PixelSource};
