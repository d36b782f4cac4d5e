//! Configuration management for bin-atlas.
//!
//! Command-line arguments via clap, with `BIN_ATLAS_`-prefixed environment
//! variables standing in for any flag, and sensible defaults for all
//! optional settings.
//!
//! # Environment Variables
//!
//! - `BIN_ATLAS_DB` - path of the catalog database
//! - `BIN_ATLAS_DATASET` - dataset name to operate on
//! - `BIN_ATLAS_BATCH_SIZE` - records per accession batch (default: 100)
//! - `BIN_ATLAS_PAGE_WIDTH` / `BIN_ATLAS_PAGE_HEIGHT` - mosaic page extent
//! - `BIN_ATLAS_SCALE` - thumbnail scale (default: 0.33)
//! - `BIN_ATLAS_MAX_PAGES` - overflow page cap (default: 20)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::accession::DEFAULT_BATCH_SIZE;
use crate::mosaic::{DEFAULT_BG_COLOR, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SHAPE, DEFAULT_SCALE};

// =============================================================================
// CLI
// =============================================================================

/// bin-atlas - ingestion and mosaic rendering for sample bin collections.
#[derive(Parser, Debug)]
#[command(name = "bin-atlas")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan data directories and accession new samples into a dataset.
    Sync(SyncConfig),
    /// Render one mosaic page of a sample to a PNG file.
    Mosaic(MosaicConfig),
}

// =============================================================================
// Sync Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct SyncConfig {
    /// Path of the catalog database (created if absent).
    #[arg(long, env = "BIN_ATLAS_DB")]
    pub db: PathBuf,

    /// Dataset to sync (created if absent).
    #[arg(long, env = "BIN_ATLAS_DATASET")]
    pub dataset: String,

    /// Data directory to register before syncing; repeatable, scanned in
    /// the order given. Previously registered directories are always
    /// included.
    #[arg(long = "dir")]
    pub directories: Vec<PathBuf>,

    /// Records per batch transaction.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, env = "BIN_ATLAS_BATCH_SIZE")]
    pub batch_size: usize,

    /// Skip records at or before the newest committed sample.
    #[arg(long, default_value_t = false)]
    pub newest_only: bool,

    /// Fixed deployment latitude stamped onto ingested samples.
    #[arg(long)]
    pub latitude: Option<f64>,

    /// Fixed deployment longitude stamped onto ingested samples.
    #[arg(long)]
    pub longitude: Option<f64>,

    /// Fixed deployment depth in meters.
    #[arg(long)]
    pub depth: Option<f64>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl SyncConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.dataset.is_empty() {
            return Err("dataset name is required. Set --dataset or BIN_ATLAS_DATASET".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch_size must be greater than 0".to_string());
        }
        for dir in &self.directories {
            if !dir.is_dir() {
                return Err(format!("not a directory: {}", dir.display()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Mosaic Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct MosaicConfig {
    /// Path of the catalog database.
    #[arg(long, env = "BIN_ATLAS_DB")]
    pub db: PathBuf,

    /// Dataset whose data directories hold the sample.
    #[arg(long, env = "BIN_ATLAS_DATASET")]
    pub dataset: String,

    /// Sample pid to render.
    #[arg(long)]
    pub pid: String,

    /// Mosaic page number.
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    /// Page width in pixels.
    #[arg(long, default_value_t = DEFAULT_PAGE_SHAPE.width, env = "BIN_ATLAS_PAGE_WIDTH")]
    pub width: u32,

    /// Page height in pixels.
    #[arg(long, default_value_t = DEFAULT_PAGE_SHAPE.height, env = "BIN_ATLAS_PAGE_HEIGHT")]
    pub height: u32,

    /// Thumbnail scale applied to ROI extents.
    #[arg(long, default_value_t = DEFAULT_SCALE, env = "BIN_ATLAS_SCALE")]
    pub scale: f64,

    /// Background gray level (0-255).
    #[arg(long, default_value_t = DEFAULT_BG_COLOR)]
    pub bg_color: u8,

    /// Overflow page cap per layout.
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES, env = "BIN_ATLAS_MAX_PAGES")]
    pub max_pages: u32,

    /// Output PNG path.
    #[arg(long, short)]
    pub out: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl MosaicConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.pid.is_empty() {
            return Err("a sample pid is required".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("page extent must be non-zero".to_string());
        }
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err("scale must be in (0, 1]".to_string());
        }
        if self.max_pages == 0 {
            return Err("max_pages must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
