//! Repository interfaces over catalog storage.
//!
//! The accession pipeline talks to storage through these traits so that
//! batch semantics stay explicit: everything inside one
//! [`Store::in_transaction`] call commits atomically or not at all.

use chrono::{DateTime, Utc};

use crate::error::StoreError;

use super::records::{DataDirectory, Dataset, Instrument, Sample, SampleSeed};
use super::BinMetrics;

/// Mutations available inside one batch transaction.
pub trait StoreTx {
    /// Fetch the sample row for `seed.pid`, creating a provisional row
    /// (`skip = true`) if none exists. Returns the row and whether this
    /// call created it.
    fn get_or_create_sample(&mut self, seed: &SampleSeed) -> Result<(Sample, bool), StoreError>;

    /// Register an instrument if it is not yet known. Returns `true` if
    /// this call created the record.
    fn ensure_instrument(&mut self, number: u32, version: u32) -> Result<bool, StoreError>;

    /// Finalize a provisional row: apply metrics and QC flags and flip
    /// `skip` to `false`.
    fn commit_sample(
        &mut self,
        pid: &str,
        metrics: &BinMetrics,
        no_rois: bool,
    ) -> Result<(), StoreError>;

    /// Add a sample to a dataset. Idempotent.
    fn add_to_dataset(&mut self, dataset: &str, pid: &str) -> Result<(), StoreError>;

    /// Remove a sample row (and its dataset memberships).
    fn delete_sample(&mut self, pid: &str) -> Result<(), StoreError>;
}

/// Catalog storage.
pub trait Store: Send + Sync {
    /// Run `f` inside one transaction. The transaction commits iff `f`
    /// returns `Ok`; on error every mutation made through the
    /// [`StoreTx`] is rolled back.
    fn in_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn StoreTx) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Fetch a sample row by pid, including provisional rows.
    fn get_sample(&self, pid: &str) -> Result<Option<Sample>, StoreError>;

    /// Total number of sample rows, provisional rows included.
    fn sample_count(&self) -> Result<u64, StoreError>;

    /// Pids belonging to a dataset, sorted.
    fn dataset_members(&self, dataset: &str) -> Result<Vec<String>, StoreError>;

    /// Acquisition time of the newest committed sample in a dataset.
    fn latest_sample_time(&self, dataset: &str) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Raw data directories of a dataset in scan (priority) order.
    fn directories(&self, dataset: &str) -> Result<Vec<DataDirectory>, StoreError>;

    /// Create a dataset if it does not already exist.
    fn create_dataset(&self, name: &str, title: &str) -> Result<(), StoreError>;

    /// Fetch a dataset record by name.
    fn get_dataset(&self, name: &str) -> Result<Option<Dataset>, StoreError>;

    /// Attach a data directory to a dataset.
    fn add_directory(&self, dataset: &str, directory: &DataDirectory) -> Result<(), StoreError>;

    /// Fetch an instrument record.
    fn get_instrument(&self, number: u32) -> Result<Option<Instrument>, StoreError>;
}
