use thiserror::Error;

/// Errors raised by the raw-record source (fileset discovery and access)
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Filesystem error while reading raw data
    #[error("I/O error: {0}")]
    Io(String),

    /// Sample identifier does not match either pid style
    #[error("unparseable pid {pid:?}: {reason}")]
    BadPid { pid: String, reason: String },

    /// A required member of the fileset triad is missing
    #[error("fileset for {pid} is missing its {kind} file")]
    MissingFile { pid: String, kind: &'static str },

    /// The ROI index cannot be read (structurally corrupt record)
    #[error("corrupt index for {pid}: {message}")]
    CorruptIndex { pid: String, message: String },

    /// Header metadata is not parseable
    #[error("bad header for {pid}: {message}")]
    BadHeader { pid: String, message: String },

    /// Requested ROI number is not in the index
    #[error("{pid} has no ROI {roi} (index holds {count})")]
    RoiOutOfRange { pid: String, roi: u32, count: usize },

    /// No raw record with this pid in any configured directory
    #[error("no raw record found for {0}")]
    NotFound(String),
}

/// Errors from the catalog storage layer
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(String),

    /// Named dataset does not exist
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),

    /// Referenced sample row does not exist
    #[error("unknown sample: {0}")]
    UnknownSample(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Metric extraction failures; fatal for the sample being ingested
#[derive(Debug, Clone, Error)]
pub enum MetricsError {
    /// Volume analyzed must be strictly positive
    #[error("{pid}: volume analyzed is not positive ({ml_analyzed})")]
    VolumeNotPositive { pid: String, ml_analyzed: f64 },

    /// A header attribute is present but not interpretable
    #[error("{pid}: bad header value for {key}: {message}")]
    HeaderValue {
        pid: String,
        key: &'static str,
        message: String,
    },

    /// Derived concentration came out negative
    #[error("{pid}: negative concentration ({concentration})")]
    NegativeConcentration { pid: String, concentration: f64 },

    /// Record access failed while extracting
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors from the accession pipeline
#[derive(Debug, Clone, Error)]
pub enum AccessionError {
    /// Another sync is already running for this dataset
    #[error("a sync is already running for dataset {dataset}")]
    SyncInProgress { dataset: String },

    /// Record was structurally malformed and rejected
    #[error("{pid} is malformed and cannot be ingested")]
    Malformed { pid: String },

    /// Metric extraction rejected the record
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors from mosaic layout, rendering, and the coordinate cache
#[derive(Debug, Error)]
pub enum MosaicError {
    /// Sample is unknown, still being ingested, or permanently bad
    #[error("sample not available: {0}")]
    SampleNotFound(String),

    /// Requested page is beyond the layout
    #[error("page {page} out of range (layout has {pages})")]
    PageOutOfRange { page: u32, pages: u32 },

    /// Cached placement table could not be encoded or decoded
    #[error("placement encoding error: {0}")]
    Encoding(String),

    /// Background coordinate worker was lost
    #[error("coordinate worker failed: {0}")]
    Worker(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
