//! Filesystem-backed raw record source.
//!
//! Instrument transfer directories hold one fileset per sample: the
//! `.adc`/`.hdr`/`.roi` triad named after the pid, usually nested in
//! per-day subdirectories. [`FilesetSource`] walks those trees, groups the
//! triads, and hands out [`FilesetBin`] handles that read lazily.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use image::GrayImage;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::SourceError;

use super::{parse_headers, BinSource, FileSizes, HeaderMap, Pid, RawBin, RoiIndex};

// =============================================================================
// Scan Specification
// =============================================================================

/// One directory to scan, with traversal controls.
///
/// `blacklist` prunes directory names anywhere in the tree (transfer rigs
/// conventionally park rejects in `skip/` or `bad/`). A non-empty
/// `whitelist` restricts which top-level subdirectories are entered; files
/// sitting directly in the root are always considered.
#[derive(Debug, Clone)]
pub struct ScanSpec {
    pub path: PathBuf,
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl ScanSpec {
    /// Scan a directory with default traversal controls.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            whitelist: Vec::new(),
            blacklist: vec!["skip".to_string(), "bad".to_string()],
        }
    }

    fn enters(&self, entry: &walkdir::DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if self.blacklist.iter().any(|b| b == name.as_ref()) {
            return false;
        }
        if !self.whitelist.is_empty() && entry.depth() == 1 {
            return self.whitelist.iter().any(|w| w == name.as_ref());
        }
        true
    }
}

// =============================================================================
// Fileset Source
// =============================================================================

/// Raw record source over local instrument transfer directories.
pub struct FilesetSource {
    roots: Vec<ScanSpec>,
}

impl FilesetSource {
    /// Create a source that can `locate` pids across the given roots.
    pub fn new(roots: Vec<ScanSpec>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[ScanSpec] {
        &self.roots
    }

    fn open_fileset(adc_path: &Path) -> Result<FilesetBin, SourceError> {
        let stem = adc_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let pid = Pid::parse(&stem)?;
        let hdr_path = adc_path.with_extension("hdr");
        let roi_path = adc_path.with_extension("roi");
        let sizes = FileSizes {
            adc: file_len(adc_path)?,
            hdr: file_len(&hdr_path).map_err(|_| missing(&pid, "hdr"))?,
            roi: file_len(&roi_path).map_err(|_| missing(&pid, "roi"))?,
        };
        Ok(FilesetBin {
            pid,
            adc_path: adc_path.to_path_buf(),
            hdr_path,
            roi_path,
            sizes,
            index: OnceLock::new(),
        })
    }
}

impl BinSource for FilesetSource {
    fn scan(&self, spec: &ScanSpec) -> Result<Vec<Arc<dyn RawBin>>, SourceError> {
        let mut bins: Vec<Arc<dyn RawBin>> = Vec::new();
        for entry in WalkDir::new(&spec.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| spec.enters(e))
        {
            let entry = entry.map_err(|e| SourceError::Io(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("adc") {
                continue;
            }
            match Self::open_fileset(entry.path()) {
                Ok(bin) => bins.push(Arc::new(bin)),
                // incomplete or foreign filesets don't block the scan
                Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping fileset"),
            }
        }
        bins.sort_by(|a, b| a.pid().lid.cmp(&b.pid().lid));
        debug!(root = %spec.path.display(), count = bins.len(), "scanned directory");
        Ok(bins)
    }

    fn locate(&self, pid: &str) -> Result<Arc<dyn RawBin>, SourceError> {
        let parsed = Pid::parse(pid)?;
        let wanted = format!("{}.adc", parsed.lid);
        for spec in &self.roots {
            for entry in WalkDir::new(&spec.path)
                .into_iter()
                .filter_entry(|e| spec.enters(e))
                .flatten()
            {
                if entry.file_type().is_file() && entry.file_name().to_string_lossy() == wanted.as_str()
                {
                    return Ok(Arc::new(Self::open_fileset(entry.path())?));
                }
            }
        }
        Err(SourceError::NotFound(pid.to_string()))
    }
}

// =============================================================================
// Fileset Bin
// =============================================================================

/// One on-disk sample fileset.
///
/// The handle is cheap: only file sizes are read at construction. The ROI
/// index is parsed once on first use and shared.
pub struct FilesetBin {
    pid: Pid,
    adc_path: PathBuf,
    hdr_path: PathBuf,
    roi_path: PathBuf,
    sizes: FileSizes,
    index: OnceLock<Arc<RoiIndex>>,
}

impl RawBin for FilesetBin {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn file_sizes(&self) -> FileSizes {
        self.sizes
    }

    fn headers(&self) -> Result<HeaderMap, SourceError> {
        let text = std::fs::read_to_string(&self.hdr_path)
            .map_err(|e| SourceError::Io(format!("{}: {e}", self.hdr_path.display())))?;
        parse_headers(&self.pid.lid, &text)
    }

    fn index(&self) -> Result<Arc<RoiIndex>, SourceError> {
        if let Some(index) = self.index.get() {
            return Ok(index.clone());
        }
        let text = std::fs::read_to_string(&self.adc_path)
            .map_err(|e| SourceError::Io(format!("{}: {e}", self.adc_path.display())))?;
        let parsed = Arc::new(RoiIndex::parse(self.pid.schema, &self.pid.lid, &text)?);
        let _ = self.index.set(parsed.clone());
        Ok(parsed)
    }

    fn image(&self, roi: u32) -> Result<GrayImage, SourceError> {
        let index = self.index()?;
        let record = match index.get(roi) {
            Some(r) if r.byte_len() > 0 => *r,
            _ => {
                return Err(SourceError::RoiOutOfRange {
                    pid: self.pid.lid.clone(),
                    roi,
                    count: index.len(),
                })
            }
        };
        let mut file = File::open(&self.roi_path)
            .map_err(|e| SourceError::Io(format!("{}: {e}", self.roi_path.display())))?;
        file.seek(SeekFrom::Start(record.start))
            .map_err(|e| SourceError::Io(e.to_string()))?;
        let mut buf = vec![0u8; record.byte_len() as usize];
        file.read_exact(&mut buf)
            .map_err(|_| SourceError::CorruptIndex {
                pid: self.pid.lid.clone(),
                message: format!("payload truncated at ROI {roi}"),
            })?;
        GrayImage::from_raw(record.width, record.height, buf).ok_or_else(|| {
            SourceError::CorruptIndex {
                pid: self.pid.lid.clone(),
                message: format!("ROI {roi} payload does not match its extent"),
            }
        })
    }
}

fn file_len(path: &Path) -> Result<u64, SourceError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| SourceError::Io(format!("{}: {e}", path.display())))
}

fn missing(pid: &Pid, kind: &'static str) -> SourceError {
    SourceError::MissingFile {
        pid: pid.lid.clone(),
        kind,
    }
}

// =============================================================================
// Tests
// =============================================================================
