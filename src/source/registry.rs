//! Registry of opened raw bins.
//!
//! Locating a fileset walks the data directories and first use parses the
//! ROI index, so mosaic requests go through this LRU front instead of
//! re-resolving the pid on every page.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use crate::error::SourceError;

use super::{BinSource, RawBin};

/// Default number of opened bins to keep.
const DEFAULT_REGISTRY_CAPACITY: usize = 64;

/// LRU cache of opened bins keyed by pid.
pub struct BinRegistry<S: BinSource> {
    source: Arc<S>,
    cache: Mutex<LruCache<String, Arc<dyn RawBin>>>,
}

impl<S: BinSource> BinRegistry<S> {
    /// Create a registry with the default capacity.
    pub fn new(source: Arc<S>) -> Self {
        Self::with_capacity(source, DEFAULT_REGISTRY_CAPACITY)
    }

    pub fn with_capacity(source: Arc<S>, capacity: usize) -> Self {
        Self {
            source,
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Get a bin, resolving and caching it on first access.
    pub fn get(&self, pid: &str) -> Result<Arc<dyn RawBin>, SourceError> {
        if let Some(bin) = self.lock().get(pid) {
            return Ok(bin.clone());
        }
        let bin = self.source.locate(pid)?;
        self.lock().put(pid.to_string(), bin.clone());
        Ok(bin)
    }

    /// Drop a cached bin, forcing re-resolution on next access.
    pub fn invalidate(&self, pid: &str) {
        self.lock().pop(pid);
    }

    pub fn cached_count(&self) -> usize {
        self.lock().len()
    }

    /// The underlying source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<dyn RawBin>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::{FileSizes, HeaderMap, Pid, RoiIndex, ScanSpec};
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubBin {
        pid: Pid,
    }

    impl RawBin for StubBin {
        fn pid(&self) -> &Pid {
            &self.pid
        }
        fn file_sizes(&self) -> FileSizes {
            FileSizes::default()
        }
        fn headers(&self) -> Result<HeaderMap, SourceError> {
            Ok(HeaderMap::new())
        }
        fn index(&self) -> Result<Arc<RoiIndex>, SourceError> {
            Ok(Arc::new(RoiIndex::default()))
        }
        fn image(&self, roi: u32) -> Result<GrayImage, SourceError> {
            Err(SourceError::RoiOutOfRange {
                pid: self.pid.lid.clone(),
                roi,
                count: 0,
            })
        }
    }

    struct CountingSource {
        locates: AtomicUsize,
    }

    impl BinSource for CountingSource {
        fn scan(&self, _spec: &ScanSpec) -> Result<Vec<Arc<dyn RawBin>>, SourceError> {
            Ok(Vec::new())
        }

        fn locate(&self, pid: &str) -> Result<Arc<dyn RawBin>, SourceError> {
            self.locates.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubBin {
                pid: Pid::parse(pid)?,
            }))
        }
    }

    #[test]
    fn registry_caches_located_bins() {
        let source = Arc::new(CountingSource {
            locates: AtomicUsize::new(0),
        });
        let registry = BinRegistry::new(source.clone());

        registry.get("D20190102T093000_IFCB927").unwrap();
        registry.get("D20190102T093000_IFCB927").unwrap();
        assert_eq!(source.locates.load(Ordering::SeqCst), 1);

        registry.get("D20190102T100000_IFCB927").unwrap();
        assert_eq!(source.locates.load(Ordering::SeqCst), 2);
        assert_eq!(registry.cached_count(), 2);
    }

    #[test]
    fn invalidate_forces_reresolution() {
        let source = Arc::new(CountingSource {
            locates: AtomicUsize::new(0),
        });
        let registry = BinRegistry::new(source.clone());

        registry.get("D20190102T093000_IFCB927").unwrap();
        registry.invalidate("D20190102T093000_IFCB927");
        registry.get("D20190102T093000_IFCB927").unwrap();
        assert_eq!(source.locates.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let source = Arc::new(CountingSource {
            locates: AtomicUsize::new(0),
        });
        let registry = BinRegistry::with_capacity(source.clone(), 1);

        registry.get("D20190102T093000_IFCB927").unwrap();
        registry.get("D20190102T100000_IFCB927").unwrap();
        registry.get("D20190102T093000_IFCB927").unwrap();
        assert_eq!(source.locates.load(Ordering::SeqCst), 3);
        assert_eq!(registry.cached_count(), 1);
    }
}
