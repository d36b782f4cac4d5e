//! The accession (ingestion) pipeline.
//!
//! Raw records flow from a [`BinSource`](crate::source::BinSource) through
//! QAQC classification and metric extraction into catalog storage, batch
//! by batch:
//!
//! ```text
//! scan directories -> batch -> per record:
//!     register instrument (first sighting)
//!     get-or-create row (skip = true)
//!     existing?  attach to dataset, done
//!     malformed? delete row
//!     extract metrics; failure? delete row, record error
//!     commit row (skip = false), attach unless empty capture
//! -> commit batch transaction -> report progress
//! ```

mod metrics;
mod qaqc;
mod runner;

pub use metrics::extract_metrics;
pub use qaqc::{has_no_rois, is_malformed, MIN_SIZE};
pub use runner::{
    Accession, CancellationToken, Control, Summary, SyncOptions, SyncOutcome, DEFAULT_BATCH_SIZE,
};
