//! Dashboard service facade.
//!
//! Ties the subsystems together behind the four operations the API layer
//! consumes:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Dashboard                             │
//! │   sync / sync_one          mosaic_coordinates / render_page   │
//! │        │                              │                       │
//! │        ▼                              ▼                       │
//! │   ┌──────────┐   ┌────────────┐   ┌─────────────────┐         │
//! │   │ Accession│   │ BinRegistry│   │ CoordinateCache │         │
//! │   └──────────┘   └────────────┘   └─────────────────┘         │
//! │        │                │                  │                  │
//! │        ▼                ▼                  ▼                  │
//! │     Store           BinSource         KeyValueStore           │
//! └───────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use image::GrayImage;

use crate::accession::{Accession, CancellationToken, Control, Summary, SyncOptions, SyncOutcome};
use crate::error::{AccessionError, MosaicError};
use crate::mosaic::{
    pack, render_page, scaled_shapes, CoordinateCache, CoordinateKey, PageShape, Placement,
    DEFAULT_BG_COLOR, DEFAULT_COORDINATE_WORKERS, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SHAPE,
    DEFAULT_SCALE,
};
use crate::source::{BinRegistry, BinSource};
use crate::store::{KeyValueStore, Store};

/// Default time a rendering caller waits for coordinates.
pub const DEFAULT_COORDINATE_WAIT: Duration = Duration::from_secs(30);

/// Mosaic and worker tuning for a [`Dashboard`].
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub page_shape: PageShape,
    pub scale: f64,
    pub bg_color: u8,
    /// Overflow page cap per layout.
    pub max_pages: u32,
    /// Concurrent background layout computations.
    pub coordinate_workers: usize,
    /// How long blocking callers wait for a layout before falling back to
    /// an empty table.
    pub coordinate_wait: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_shape: DEFAULT_PAGE_SHAPE,
            scale: DEFAULT_SCALE,
            bg_color: DEFAULT_BG_COLOR,
            max_pages: DEFAULT_MAX_PAGES,
            coordinate_workers: DEFAULT_COORDINATE_WORKERS,
            coordinate_wait: DEFAULT_COORDINATE_WAIT,
        }
    }
}

/// The dashboard's application service.
pub struct Dashboard<S: BinSource + 'static> {
    store: Arc<dyn Store>,
    kv: Arc<dyn KeyValueStore>,
    source: Arc<S>,
    registry: Arc<BinRegistry<S>>,
    coordinates: CoordinateCache,
    config: DashboardConfig,
}

impl<S: BinSource + 'static> Dashboard<S> {
    /// Create a dashboard with default configuration.
    pub fn new(store: Arc<dyn Store>, kv: Arc<dyn KeyValueStore>, source: S) -> Self {
        Self::with_config(store, kv, source, DashboardConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn Store>,
        kv: Arc<dyn KeyValueStore>,
        source: S,
        config: DashboardConfig,
    ) -> Self {
        let source = Arc::new(source);
        Self {
            coordinates: CoordinateCache::new(kv.clone(), config.coordinate_workers),
            registry: Arc::new(BinRegistry::new(source.clone())),
            store,
            kv,
            source,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<BinRegistry<S>> {
        &self.registry
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Run a full accession sync for a dataset.
    pub fn sync(
        &self,
        dataset: &str,
        options: SyncOptions,
        progress: &mut dyn FnMut(&Summary) -> Control,
        cancel: &CancellationToken,
    ) -> Result<Summary, AccessionError> {
        Accession::with_options(
            self.store.as_ref(),
            self.source.as_ref(),
            self.kv.as_ref(),
            dataset,
            options,
        )
        .sync(progress, cancel)
    }

    /// Ingest one record on demand into a dataset.
    pub fn sync_one(&self, dataset: &str, pid: &str) -> Result<SyncOutcome, AccessionError> {
        Accession::new(
            self.store.as_ref(),
            self.source.as_ref(),
            self.kv.as_ref(),
            dataset,
        )
        .sync_one(pid)
    }

    /// The placement table for a sample, computed or memoized.
    ///
    /// Blocks up to the configured wait; a timeout yields an empty table
    /// while the layout finishes in the background.
    pub async fn mosaic_coordinates(
        &self,
        pid: &str,
        shape: PageShape,
        scale: f64,
    ) -> Result<Vec<Placement>, MosaicError> {
        self.check_sample(pid)?;
        let key = CoordinateKey::new(pid, shape, scale);
        let compute = self.layout_fn(pid, shape, scale);
        self.coordinates
            .get_or_compute(&key, self.config.coordinate_wait, compute)
            .await
    }

    /// Non-blocking variant: `None` means the layout is being computed in
    /// the background and the caller should come back.
    pub fn try_mosaic_coordinates(
        &self,
        pid: &str,
        shape: PageShape,
        scale: f64,
    ) -> Result<Option<Vec<Placement>>, MosaicError> {
        self.check_sample(pid)?;
        let key = CoordinateKey::new(pid, shape, scale);
        let compute = self.layout_fn(pid, shape, scale);
        Ok(self.coordinates.get_or_spawn(&key, compute))
    }

    /// Render one mosaic page to pixels.
    pub async fn render_mosaic_page(
        &self,
        pid: &str,
        page: u32,
        shape: PageShape,
        scale: f64,
        bg_color: u8,
    ) -> Result<GrayImage, MosaicError> {
        let placements = self.mosaic_coordinates(pid, shape, scale).await?;
        let pages = placements
            .iter()
            .map(|p| p.page + 1)
            .max()
            .unwrap_or(1);
        if page >= pages {
            return Err(MosaicError::PageOutOfRange { page, pages });
        }

        let registry = self.registry.clone();
        let pid = pid.to_string();
        tokio::task::spawn_blocking(move || {
            let bin = registry.get(&pid)?;
            render_page(bin.as_ref(), &placements, page, shape, bg_color)
        })
        .await
        .map_err(|e| MosaicError::Worker(e.to_string()))?
    }

    /// Drop the memoized table for one key.
    pub fn invalidate_coordinates(&self, pid: &str, shape: PageShape, scale: f64) {
        self.coordinates
            .invalidate(&CoordinateKey::new(pid, shape, scale));
        self.registry.invalidate(pid);
    }

    /// Number of layout computations performed (cache misses served).
    pub fn coordinate_computations(&self) -> u64 {
        self.coordinates.computations()
    }

    /// A sample can be rendered once committed and not permanently bad.
    /// Provisional rows (`skip = true`) are invisible here, which is what
    /// keeps half-ingested samples off screens.
    fn check_sample(&self, pid: &str) -> Result<(), MosaicError> {
        match self.store.get_sample(pid)? {
            Some(sample) if !sample.skip && !sample.qc_bad => Ok(()),
            _ => Err(MosaicError::SampleNotFound(pid.to_string())),
        }
    }

    fn layout_fn(
        &self,
        pid: &str,
        shape: PageShape,
        scale: f64,
    ) -> impl FnOnce() -> Result<Vec<Placement>, MosaicError> + Send + 'static {
        let registry = self.registry.clone();
        let max_pages = self.config.max_pages;
        let pid = pid.to_string();
        move || {
            let bin = registry.get(&pid)?;
            let index = bin.index()?;
            Ok(pack(&scaled_shapes(&index, scale), shape, max_pages))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
