//! # bin-atlas
//!
//! Ingestion and mosaic rendering for collections of microscope-acquired
//! sample "bins".
//!
//! An instrument deposits one fileset per acquisition run into transfer
//! directories; each run extracts thousands of small particle images.
//! This library accessions those runs into a catalog and tiles their
//! images onto composite pages for rapid visual browsing.
//!
//! ## Features
//!
//! - **Batched, crash-safe accession**: one storage transaction per batch,
//!   provisional rows hidden until commit, cooperative cancellation, and a
//!   summary that always returns
//! - **QAQC classification**: malformed records are rejected, empty
//!   captures are remembered but kept out of datasets
//! - **Deterministic mosaics**: best-area-fit guillotine packing with
//!   overflow pages, identical output for identical input
//! - **Memoized layouts**: placement tables cached in an injected
//!   key-value store, computed on a bounded worker pool
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`source`] - raw record boundary, fileset adapter, bin registry
//! - [`store`] - catalog repositories on SQLite and the key-value store
//! - [`accession`] - QAQC, metric extraction, and the sync orchestrator
//! - [`mosaic`] - rectangle packer, layout driver, renderer, coordinate cache
//! - [`service`] - the dashboard facade the API layer consumes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bin_atlas::accession::{CancellationToken, Control, SyncOptions};
//! use bin_atlas::service::Dashboard;
//! use bin_atlas::source::{FilesetSource, ScanSpec};
//! use bin_atlas::store::{MemoryKvStore, SqliteStore, Store};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("atlas.db")?);
//!     store.create_dataset("mvco", "Coastal observatory")?;
//!
//!     let source = FilesetSource::new(vec![ScanSpec::new("/data/mvco")]);
//!     let dashboard = Dashboard::new(store, Arc::new(MemoryKvStore::new()), source);
//!
//!     let summary = dashboard.sync(
//!         "mvco",
//!         SyncOptions::default(),
//!         &mut |_| Control::Continue,
//!         &CancellationToken::new(),
//!     )?;
//!     println!("added {} samples", summary.added);
//!     Ok(())
//! }
//! ```

pub mod accession;
pub mod config;
pub mod error;
pub mod mosaic;
pub mod service;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use accession::{
    Accession, CancellationToken, Control, Summary, SyncOptions, SyncOutcome, DEFAULT_BATCH_SIZE,
    MIN_SIZE,
};
pub use config::{Cli, Command, MosaicConfig, SyncConfig};
pub use error::{AccessionError, MetricsError, MosaicError, SourceError, StoreError};
pub use mosaic::{
    CoordinateCache, CoordinateKey, PageShape, Placement, DEFAULT_BG_COLOR, DEFAULT_MAX_PAGES,
    DEFAULT_PAGE_SHAPE, DEFAULT_SCALE,
};
pub use service::{Dashboard, DashboardConfig, DEFAULT_COORDINATE_WAIT};
pub use source::{
    BinRegistry, BinSource, FileSizes, FilesetBin, FilesetSource, HeaderMap, Pid, RawBin,
    RoiIndex, RoiRecord, ScanSpec, SchemaVersion,
};
pub use store::{
    BinMetrics, DataDirectory, Dataset, Instrument, KeyValueStore, MemoryKvStore, Sample,
    SampleSeed, SqliteStore, Store, StoreTx,
};
