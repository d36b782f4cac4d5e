//! Shared fixtures: on-disk filesets and a wired-up dashboard.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bin_atlas::accession::{CancellationToken, Control, Summary, SyncOptions};
use bin_atlas::service::Dashboard;
use bin_atlas::source::{FilesetSource, ScanSpec};
use bin_atlas::store::{DataDirectory, MemoryKvStore, SqliteStore, Store};

pub const DATASET: &str = "mvco";

/// Header yielding 5.0 ml analyzed (0.25 ml/min over 1200 s).
pub const HEADER: &str = "softwareVersion: 2.1.0\n\
temperature: 31.5\n\
humidity: 70.25\n\
runTime: 1320\n\
inhibitTime: 120\n\
lookTime: 1100\n";

/// Write one fileset triad under `dir`.
pub fn write_fileset(dir: &Path, pid: &str, adc: &str, hdr: &str, roi: &[u8]) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(format!("{pid}.adc")), adc).unwrap();
    std::fs::write(dir.join(format!("{pid}.hdr")), hdr).unwrap();
    std::fs::write(dir.join(format!("{pid}.roi")), roi).unwrap();
}

/// A healthy fileset with `n` images of `width` x `height`; ROI `i` is a
/// constant gray of `(i * 7 % 250) as u8`.
pub fn write_healthy(dir: &Path, pid: &str, n: u32, width: u32, height: u32) {
    let mut adc = String::new();
    let mut roi = Vec::new();
    let mut start = 0u64;
    for i in 1..=n {
        adc.push_str(&format!("{i},0,0,{width},{height},{start}\n"));
        let len = (width * height) as usize;
        roi.extend(std::iter::repeat((i * 7 % 250) as u8).take(len));
        start += len as u64;
    }
    write_fileset(dir, pid, &adc, HEADER, &roi);
}

/// A legacy empty capture: zero-area triggers and a one-byte ROI file.
pub fn write_empty_capture(dir: &Path, pid: &str) {
    write_fileset(dir, pid, "1,0,0,0,0,0\n2,0,0,0,0,0\n", HEADER, &[0]);
}

/// A malformed fileset: 10 bytes in total, far below the size floor.
pub fn write_malformed(dir: &Path, pid: &str) {
    write_fileset(dir, pid, "xxxx", "yyy", &[0, 0, 0]);
}

/// Open (or create) the catalog and dashboard for a data root.
pub fn dashboard(db: &Path, root: &Path) -> Dashboard<FilesetSource> {
    let store = SqliteStore::open(db).unwrap();
    store.create_dataset(DATASET, "Test deployment").unwrap();
    if store.directories(DATASET).unwrap().is_empty() {
        store
            .add_directory(DATASET, &DataDirectory::raw(root))
            .unwrap();
    }
    let roots: Vec<ScanSpec> = store
        .directories(DATASET)
        .unwrap()
        .iter()
        .map(|d| d.scan_spec())
        .collect();
    Dashboard::new(
        Arc::new(store),
        Arc::new(MemoryKvStore::new()),
        FilesetSource::new(roots),
    )
}

/// Run a full sync with no cancellation.
pub fn sync(dashboard: &Dashboard<FilesetSource>) -> Summary {
    dashboard
        .sync(
            DATASET,
            SyncOptions::default(),
            &mut |_| Control::Continue,
            &CancellationToken::new(),
        )
        .unwrap()
}

/// A scratch area holding the catalog and one data root.
pub struct Scratch {
    pub db: PathBuf,
    pub root: PathBuf,
    _dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("data");
        std::fs::create_dir(&root).unwrap();
        Self {
            db: dir.path().join("atlas.db"),
            root,
            _dir: dir,
        }
    }
}
