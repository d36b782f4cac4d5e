//! Coordinate cache.
//!
//! Placement tables are pure functions of `(sample, page shape, scale)`,
//! so they are memoized in the injected key-value store and recomputed on
//! demand. Computation runs on a bounded background worker pool; callers
//! either wait with a timeout or continue without coordinates while the
//! table builds behind them. Entries never expire on their own.
//!
//! Concurrent misses for the same key are not deduplicated: both callers
//! compute, both write, and the results are identical because layout is
//! deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::MosaicError;
use crate::store::KeyValueStore;

use super::layout::{PageShape, Placement};

/// Default size of the coordinate worker pool.
pub const DEFAULT_COORDINATE_WORKERS: usize = 4;

// =============================================================================
// Cache Key
// =============================================================================

/// Identifies one memoized placement table.
///
/// Scale participates in the key at millis precision; page shapes and
/// scales used in practice are coarse, so collisions are not a concern.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateKey {
    pub pid: String,
    pub shape: PageShape,
    pub scale: f64,
}

impl CoordinateKey {
    pub fn new(pid: impl Into<String>, shape: PageShape, scale: f64) -> Self {
        Self {
            pid: pid.into(),
            shape,
            scale,
        }
    }

    /// The key-value store key for this table.
    pub fn storage_key(&self) -> String {
        format!(
            "mosaic:coords:{}:{}:{:.3}",
            self.pid, self.shape, self.scale
        )
    }
}

// =============================================================================
// Coordinate Cache
// =============================================================================

/// Memoization layer in front of mosaic layout computation.
pub struct CoordinateCache {
    kv: Arc<dyn KeyValueStore>,
    workers: Arc<Semaphore>,
    computations: Arc<AtomicU64>,
}

impl CoordinateCache {
    /// Create a cache over the given store with `workers` concurrent
    /// layout computations.
    pub fn new(kv: Arc<dyn KeyValueStore>, workers: usize) -> Self {
        Self {
            kv,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            computations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetch a memoized table without computing anything.
    ///
    /// An undecodable entry is dropped and treated as a miss; the store is
    /// non-authoritative and the table is always recomputable.
    pub fn get(&self, key: &CoordinateKey) -> Option<Vec<Placement>> {
        let storage_key = key.storage_key();
        let raw = self.kv.get(&storage_key)?;
        match serde_json::from_slice(&raw) {
            Ok(table) => Some(table),
            Err(e) => {
                warn!(key = %storage_key, error = %e, "dropping undecodable cache entry");
                self.kv.remove(&storage_key);
                None
            }
        }
    }

    /// Fetch the table, computing it on a worker and waiting up to
    /// `wait`. A timed-out or lost worker yields an empty table (the
    /// computation keeps running and will populate the cache); an error
    /// from `compute` itself propagates.
    pub async fn get_or_compute<F>(
        &self,
        key: &CoordinateKey,
        wait: Duration,
        compute: F,
    ) -> Result<Vec<Placement>, MosaicError>
    where
        F: FnOnce() -> Result<Vec<Placement>, MosaicError> + Send + 'static,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let handle = self.spawn_compute(key.storage_key(), compute);
        match tokio::time::timeout(wait, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => {
                warn!(key = %key.storage_key(), error = %join_error, "coordinate worker lost");
                Ok(Vec::new())
            }
            Err(_) => {
                warn!(key = %key.storage_key(), "timed out waiting for coordinates");
                Ok(Vec::new())
            }
        }
    }

    /// Non-blocking variant: a hit returns the table, a miss kicks off a
    /// background computation and returns `None` immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_or_spawn<F>(&self, key: &CoordinateKey, compute: F) -> Option<Vec<Placement>>
    where
        F: FnOnce() -> Result<Vec<Placement>, MosaicError> + Send + 'static,
    {
        if let Some(hit) = self.get(key) {
            return Some(hit);
        }
        debug!(key = %key.storage_key(), "computing coordinates in the background");
        drop(self.spawn_compute(key.storage_key(), compute));
        None
    }

    /// Explicitly drop one memoized table.
    pub fn invalidate(&self, key: &CoordinateKey) {
        self.kv.remove(&key.storage_key());
    }

    /// Number of layout computations performed so far.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::SeqCst)
    }

    fn spawn_compute<F>(
        &self,
        storage_key: String,
        compute: F,
    ) -> JoinHandle<Result<Vec<Placement>, MosaicError>>
    where
        F: FnOnce() -> Result<Vec<Placement>, MosaicError> + Send + 'static,
    {
        let kv = self.kv.clone();
        let workers = self.workers.clone();
        let computations = self.computations.clone();
        tokio::spawn(async move {
            let _permit = workers
                .acquire_owned()
                .await
                .map_err(|e| MosaicError::Worker(e.to_string()))?;
            let table = tokio::task::spawn_blocking(compute)
                .await
                .map_err(|e| MosaicError::Worker(e.to_string()))??;
            computations.fetch_add(1, Ordering::SeqCst);
            let encoded =
                serde_json::to_vec(&table).map_err(|e| MosaicError::Encoding(e.to_string()))?;
            kv.set(&storage_key, Bytes::from(encoded));
            Ok(table)
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
