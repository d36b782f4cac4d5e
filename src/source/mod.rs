//! Raw-record source boundary.
//!
//! A *bin* is one acquisition run of the instrument, stored on disk as a
//! triad of files sharing a stem: a textual header (`.hdr`), a CSV index of
//! extracted regions of interest (`.adc`), and the raw 8-bit ROI payload
//! (`.roi`). This module defines the trait boundary the rest of the crate
//! consumes ([`RawBin`] / [`BinSource`]) plus the filesystem-backed adapter
//! ([`FilesetSource`]) and an LRU registry of opened bins ([`BinRegistry`]).
//!
//! The instrument's payload encoding beyond "8-bit grayscale at a byte
//! offset" is deliberately not interpreted here.

mod fileset;
mod header;
mod index;
mod pid;
mod registry;

use std::collections::BTreeMap;
use std::sync::Arc;

use image::GrayImage;

use crate::error::SourceError;

pub use fileset::{FilesetBin, FilesetSource, ScanSpec};
pub use header::parse_headers;
pub use index::{RoiIndex, RoiRecord};
pub use pid::Pid;
pub use registry::BinRegistry;

/// Nominal sample flow rate of the instrument, in ml per minute.
///
/// Volume analyzed is derived from run time minus inhibit time at this rate.
pub const FLOW_RATE_ML_PER_MIN: f64 = 0.25;

/// Instrument data schema generations.
///
/// Version 1 covers the legacy units (instrument numbers 1-9) whose index
/// files carry no byte offsets and may skip frames; version 2 is everything
/// since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    /// Default schema version for a given instrument number.
    pub fn for_instrument(number: u32) -> Self {
        if number <= 9 {
            SchemaVersion::V1
        } else {
            SchemaVersion::V2
        }
    }

    /// Numeric tag persisted with the instrument record.
    pub fn as_number(self) -> u32 {
        match self {
            SchemaVersion::V1 => 1,
            SchemaVersion::V2 => 2,
        }
    }
}

/// Parsed header attributes, keyed by attribute name.
pub type HeaderMap = BTreeMap<String, String>;

/// Byte sizes of the three fileset members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSizes {
    pub adc: u64,
    pub hdr: u64,
    pub roi: u64,
}

impl FileSizes {
    /// Total size of the fileset in bytes.
    pub fn total(&self) -> u64 {
        self.adc + self.hdr + self.roi
    }

    /// True if any member file is empty.
    pub fn any_empty(&self) -> bool {
        self.adc == 0 || self.hdr == 0 || self.roi == 0
    }
}

/// One raw instrument record, addressable by pid.
///
/// Implementations keep access lazy: constructing a record handle must not
/// read payload data, so that directory scans stay cheap.
pub trait RawBin: Send + Sync {
    /// The record's parsed permanent identifier.
    fn pid(&self) -> &Pid;

    /// Byte sizes of the constituent files.
    fn file_sizes(&self) -> FileSizes;

    /// Parsed header attributes.
    fn headers(&self) -> Result<HeaderMap, SourceError>;

    /// The ROI index. An error here means the record is structurally
    /// corrupt and unusable.
    fn index(&self) -> Result<Arc<RoiIndex>, SourceError>;

    /// Extract one ROI as an 8-bit grayscale image.
    fn image(&self, roi: u32) -> Result<GrayImage, SourceError>;

    /// Volume of sample analyzed, in ml.
    ///
    /// Derived from the header's run and inhibit times at the nominal flow
    /// rate. Fixture implementations may report it directly.
    fn ml_analyzed(&self) -> Result<f64, SourceError> {
        let headers = self.headers()?;
        let run = header_f64(&headers, "runTime", self.pid())?;
        let inhibit = header_f64(&headers, "inhibitTime", self.pid())?;
        Ok(FLOW_RATE_ML_PER_MIN * (run - inhibit) / 60.0)
    }
}

fn header_f64(headers: &HeaderMap, key: &str, pid: &Pid) -> Result<f64, SourceError> {
    let raw = headers.get(key).ok_or_else(|| SourceError::BadHeader {
        pid: pid.lid.clone(),
        message: format!("missing attribute {key}"),
    })?;
    raw.trim().parse().map_err(|_| SourceError::BadHeader {
        pid: pid.lid.clone(),
        message: format!("attribute {key} is not numeric: {raw:?}"),
    })
}

/// A provider of raw records.
///
/// `scan` yields every record under one storage directory in pid order;
/// `locate` resolves a single pid across all configured directories.
pub trait BinSource: Send + Sync {
    fn scan(&self, spec: &ScanSpec) -> Result<Vec<Arc<dyn RawBin>>, SourceError>;

    fn locate(&self, pid: &str) -> Result<Arc<dyn RawBin>, SourceError>;
}
