//! The accession orchestrator.
//!
//! Drives batched scanning of a dataset's data directories, classifies and
//! validates each raw record, and commits every batch in one storage
//! transaction. Resyncing an unchanged source is a no-op: existing rows
//! are attached to the dataset and counted, never re-validated.
//!
//! # Crash safety
//!
//! Provisional rows are created with `skip = true` and flipped at commit
//! time inside the batch transaction. A crash mid-batch therefore leaves
//! previously committed batches intact and no trace of the current one.
//!
//! # Cancellation
//!
//! Cancellation is cooperative. The token and the progress callback are
//! both consulted between batches, never mid-batch, and a cancelled sync
//! still returns the partial summary.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{AccessionError, MetricsError, StoreError};
use crate::source::{BinSource, RawBin, SchemaVersion};
use crate::store::{KeyValueStore, SampleSeed, Store, StoreTx};

use super::metrics::extract_metrics;
use super::qaqc;

/// Default number of records per batch transaction.
pub const DEFAULT_BATCH_SIZE: usize = 100;

// =============================================================================
// Options, Summary, Cancellation
// =============================================================================

/// Tuning knobs for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Records per storage transaction.
    pub batch_size: usize,
    /// Skip raw records at or before the newest committed sample time,
    /// bounding repeated full-history rescans.
    pub newest_only: bool,
    /// Fixed deployment-site coordinates stamped onto ingested samples.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth: Option<f64>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            newest_only: false,
            latitude: None,
            longitude: None,
            depth: None,
        }
    }
}

/// Running tally of one sync, reported after every batch and returned at
/// the end (partial if cancelled).
///
/// `existing` counts rows that already existed plus newly committed
/// empty captures; neither joins the dataset's `added` count, and empty
/// captures are deliberately excluded from `bad`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    /// Identifier of the most recently processed record.
    pub last_pid: Option<String>,
    /// Records examined.
    pub total: u64,
    /// Newly committed samples added to the dataset.
    pub added: u64,
    /// Pre-existing rows, plus newly committed empty captures.
    pub existing: u64,
    /// Malformed records rejected outright.
    pub bad: u64,
    /// Per-sample extraction failures, keyed by pid.
    pub errors: BTreeMap<String, String>,
}

/// Verdict a progress callback returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Cancel,
}

/// Shared cooperative cancellation flag, checked between batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of ingesting a single record on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Committed and added to the dataset.
    Added,
    /// Row already existed.
    Existing,
    /// Committed as an empty capture; not in the dataset.
    NoRois,
}

enum RecordOutcome {
    Added,
    Existing,
    NoRois,
    Bad,
    Rejected(MetricsError),
}

// =============================================================================
// Sync Lock
// =============================================================================

/// Mutual exclusion for syncs, one per dataset, built on the key-value
/// store's atomic insert-if-absent. Released on drop.
struct SyncLock<'a> {
    kv: &'a dyn KeyValueStore,
    key: String,
}

impl<'a> SyncLock<'a> {
    fn acquire(kv: &'a dyn KeyValueStore, dataset: &str) -> Result<Self, AccessionError> {
        let key = format!("accession:sync:{dataset}");
        if !kv.insert_if_absent(&key, Bytes::from_static(b"1")) {
            return Err(AccessionError::SyncInProgress {
                dataset: dataset.to_string(),
            });
        }
        Ok(Self { kv, key })
    }
}

impl Drop for SyncLock<'_> {
    fn drop(&mut self) {
        self.kv.remove(&self.key);
    }
}

// =============================================================================
// Accession
// =============================================================================

/// Orchestrates ingestion for one dataset.
pub struct Accession<'a> {
    store: &'a dyn Store,
    source: &'a dyn BinSource,
    kv: &'a dyn KeyValueStore,
    dataset: String,
    options: SyncOptions,
}

impl<'a> Accession<'a> {
    pub fn new(
        store: &'a dyn Store,
        source: &'a dyn BinSource,
        kv: &'a dyn KeyValueStore,
        dataset: impl Into<String>,
    ) -> Self {
        Self::with_options(store, source, kv, dataset, SyncOptions::default())
    }

    pub fn with_options(
        store: &'a dyn Store,
        source: &'a dyn BinSource,
        kv: &'a dyn KeyValueStore,
        dataset: impl Into<String>,
        options: SyncOptions,
    ) -> Self {
        Self {
            store,
            source,
            kv,
            dataset: dataset.into(),
            options,
        }
    }

    /// Scan every data directory of the dataset and ingest what is new.
    ///
    /// `progress` runs after each committed batch with the running
    /// [`Summary`]; returning [`Control::Cancel`] stops the scan at the
    /// next batch boundary, as does cancelling the token. Both paths
    /// still return the partial summary.
    pub fn sync(
        &self,
        progress: &mut dyn FnMut(&Summary) -> Control,
        cancel: &CancellationToken,
    ) -> Result<Summary, AccessionError> {
        let _lock = SyncLock::acquire(self.kv, &self.dataset)?;

        let directories = self.store.directories(&self.dataset)?;
        let cutoff = if self.options.newest_only {
            self.store.latest_sample_time(&self.dataset)?
        } else {
            None
        };
        if let Some(cutoff) = cutoff {
            debug!(dataset = %self.dataset, %cutoff, "newest-only sync");
        }

        let mut summary = Summary::default();
        let mut seen_instruments = HashSet::new();
        let mut cancelled = false;

        'directories: for directory in &directories {
            let mut bins = self.source.scan(&directory.scan_spec())?;
            if let Some(cutoff) = cutoff {
                let before = bins.len();
                bins.retain(|b| b.pid().timestamp > cutoff);
                debug!(
                    directory = %directory.path.display(),
                    skipped = before - bins.len(),
                    "skipped already-ingested records"
                );
            }
            for batch in bins.chunks(self.options.batch_size.max(1)) {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'directories;
                }
                self.process_batch(batch, &mut seen_instruments, &mut summary)?;
                if progress(&summary) == Control::Cancel {
                    cancelled = true;
                    break 'directories;
                }
            }
        }

        if cancelled {
            info!(dataset = %self.dataset, "sync cancelled, returning partial summary");
        }
        info!(
            dataset = %self.dataset,
            total = summary.total,
            added = summary.added,
            existing = summary.existing,
            bad = summary.bad,
            errors = summary.errors.len(),
            "sync finished"
        );
        Ok(summary)
    }

    /// Ingest a single record on demand, with the same validation as a
    /// full sync. Used when an external event announces one new fileset.
    pub fn sync_one(&self, pid: &str) -> Result<SyncOutcome, AccessionError> {
        let bin = self.source.locate(pid)?;
        let mut seen = HashSet::new();
        let mut outcome = None;
        self.store.in_transaction(&mut |tx| {
            outcome = Some(self.ingest_record(tx, bin.as_ref(), &mut seen)?);
            Ok(())
        })?;
        match outcome.ok_or_else(|| StoreError::Database("transaction did not run".to_string()))? {
            RecordOutcome::Added => Ok(SyncOutcome::Added),
            RecordOutcome::Existing => Ok(SyncOutcome::Existing),
            RecordOutcome::NoRois => Ok(SyncOutcome::NoRois),
            RecordOutcome::Bad => Err(AccessionError::Malformed {
                pid: pid.to_string(),
            }),
            RecordOutcome::Rejected(e) => Err(AccessionError::Metrics(e)),
        }
    }

    /// Commit one batch in a single transaction.
    fn process_batch(
        &self,
        batch: &[Arc<dyn RawBin>],
        seen_instruments: &mut HashSet<u32>,
        summary: &mut Summary,
    ) -> Result<(), AccessionError> {
        self.store.in_transaction(&mut |tx| {
            for bin in batch {
                let lid = bin.pid().lid.clone();
                summary.total += 1;
                match self.ingest_record(tx, bin.as_ref(), seen_instruments)? {
                    RecordOutcome::Added => summary.added += 1,
                    RecordOutcome::Existing | RecordOutcome::NoRois => summary.existing += 1,
                    RecordOutcome::Bad => summary.bad += 1,
                    RecordOutcome::Rejected(e) => {
                        summary.errors.insert(lid.clone(), e.to_string());
                    }
                }
                summary.last_pid = Some(lid);
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Classify and ingest one record inside an open transaction.
    ///
    /// Only storage failures propagate; data problems become outcomes so
    /// that one bad record never takes its batch down.
    fn ingest_record(
        &self,
        tx: &mut dyn StoreTx,
        bin: &dyn RawBin,
        seen_instruments: &mut HashSet<u32>,
    ) -> Result<RecordOutcome, StoreError> {
        let pid = bin.pid();

        if seen_instruments.insert(pid.instrument) {
            let version = SchemaVersion::for_instrument(pid.instrument).as_number();
            if tx.ensure_instrument(pid.instrument, version)? {
                info!(instrument = pid.instrument, version, "registered instrument");
            }
        }

        let seed = SampleSeed {
            pid: pid.lid.clone(),
            timestamp: pid.timestamp,
            sample_time: pid.timestamp,
            instrument: pid.instrument,
            latitude: self.options.latitude,
            longitude: self.options.longitude,
            depth: self.options.depth,
        };
        let (sample, created) = tx.get_or_create_sample(&seed)?;

        if !created {
            // never re-validate; bad and empty rows stay out of datasets
            if !sample.qc_bad && !sample.qc_no_rois {
                tx.add_to_dataset(&self.dataset, &pid.lid)?;
            }
            debug!(pid = %pid.lid, "already accessioned");
            return Ok(RecordOutcome::Existing);
        }

        if qaqc::is_malformed(bin) {
            tx.delete_sample(&pid.lid)?;
            info!(pid = %pid.lid, "rejected malformed record");
            return Ok(RecordOutcome::Bad);
        }

        let no_rois = qaqc::has_no_rois(bin);
        let metrics = match extract_metrics(bin) {
            Ok(m) => m,
            Err(e) => {
                tx.delete_sample(&pid.lid)?;
                warn!(pid = %pid.lid, error = %e, "metric extraction failed");
                return Ok(RecordOutcome::Rejected(e));
            }
        };

        tx.commit_sample(&pid.lid, &metrics, no_rois)?;
        if no_rois {
            debug!(pid = %pid.lid, "committed empty capture");
            return Ok(RecordOutcome::NoRois);
        }
        tx.add_to_dataset(&self.dataset, &pid.lid)?;
        Ok(RecordOutcome::Added)
    }
}

// =============================================================================
// Tests
// =============================================================================
