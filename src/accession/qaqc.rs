//! QAQC classification of raw records.
//!
//! Two pure checks gate ingestion. A *malformed* record is structurally
//! unusable and never becomes a committed sample; an *empty capture* is a
//! legitimate acquisition run that extracted no images, committed so that
//! rescans do not keep re-attempting it, but never added to a dataset.

use crate::source::RawBin;

/// Minimum plausible fileset size in bytes. Anything smaller cannot hold
/// even the fixed header preamble.
pub const MIN_SIZE: u64 = 32;

/// True if the record is malformed and impossible to use: the fileset is
/// below the size floor, or its image index cannot be read at all.
pub fn is_malformed(bin: &dyn RawBin) -> bool {
    if bin.file_sizes().total() < MIN_SIZE {
        return true;
    }
    bin.index().is_err()
}

/// True if the record holds no extracted images: any member file is
/// zero-length, or the ROI payload is the one-byte file old instrument
/// software wrote for an empty capture.
pub fn has_no_rois(bin: &dyn RawBin) -> bool {
    let sizes = bin.file_sizes();
    sizes.any_empty() || sizes.roi <= 1
}

// =============================================================================
// Tests
// =============================================================================
