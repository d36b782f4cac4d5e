//! Catalog record types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::source::ScanSpec;

/// Directory kind holding raw instrument filesets.
pub const DATA_DIRECTORY_RAW: &str = "raw";

/// A named grouping of samples for a deployment or site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub title: String,
}

/// One directory a dataset ingests from.
///
/// Directories are scanned in ascending `priority` order. `whitelist` and
/// `blacklist` carry directory names controlling traversal, matching the
/// conventions of the transfer rigs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDirectory {
    pub path: PathBuf,
    pub kind: String,
    pub priority: i32,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl DataDirectory {
    /// A raw data directory with default traversal controls.
    pub fn raw(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: DATA_DIRECTORY_RAW.to_string(),
            priority: 1,
            whitelist: Vec::new(),
            blacklist: vec!["skip".to_string(), "bad".to_string()],
        }
    }

    /// Traversal spec for the source layer.
    pub fn scan_spec(&self) -> ScanSpec {
        ScanSpec {
            path: self.path.clone(),
            whitelist: self.whitelist.clone(),
            blacklist: self.blacklist.clone(),
        }
    }
}

/// An instrument, registered lazily the first time one of its samples is
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instrument {
    pub number: u32,
    pub version: u32,
}

/// One committed (or in-flight) sample row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub pid: String,
    pub timestamp: DateTime<Utc>,
    pub sample_time: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth: Option<f64>,
    pub instrument: u32,
    /// Permanently unusable; never joins a dataset.
    pub qc_bad: bool,
    /// Usable but holds zero extracted images; never joins a dataset.
    pub qc_no_rois: bool,
    /// True while ingestion of this row is incomplete. Committed rows have
    /// `skip == false`; readers must treat `skip == true` rows as absent.
    pub skip: bool,
    pub size: u64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub run_time: Option<f64>,
    pub look_time: Option<f64>,
    pub ml_analyzed: Option<f64>,
    pub n_triggers: u32,
    pub n_images: u32,
    /// `n_images / ml_analyzed`; present only on committed rows.
    pub concentration: Option<f64>,
    /// Free-form header metadata as a JSON object.
    pub metadata: String,
}

/// Creation-time fields for a provisional sample row (`skip = true`).
#[derive(Debug, Clone)]
pub struct SampleSeed {
    pub pid: String,
    pub timestamp: DateTime<Utc>,
    pub sample_time: DateTime<Utc>,
    pub instrument: u32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub depth: Option<f64>,
}

/// Metrics extracted from a validated record, applied at batch commit.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMetrics {
    pub size: u64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub run_time: Option<f64>,
    pub look_time: Option<f64>,
    pub ml_analyzed: f64,
    pub n_triggers: u32,
    pub n_images: u32,
    pub concentration: f64,
    /// Header attributes serialized as a JSON object.
    pub metadata: String,
}
