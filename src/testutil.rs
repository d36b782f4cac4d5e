//! Shared in-memory fixtures for unit tests.

use std::sync::Arc;

use image::{GrayImage, Luma};

use crate::error::SourceError;
use crate::source::{
    BinSource, FileSizes, HeaderMap, Pid, RawBin, RoiIndex, ScanSpec, SchemaVersion,
};

/// A fabricated raw record with controllable QAQC characteristics.
///
/// Defaults describe a healthy sample: a comfortable fileset size, headers
/// yielding 5.0 ml analyzed, and 100 extracted 10x10 images.
pub struct FixtureBin {
    pub pid: Pid,
    pub sizes: FileSizes,
    pub headers: HeaderMap,
    pub index: Result<Arc<RoiIndex>, SourceError>,
    pub ml_override: Option<f64>,
}

impl FixtureBin {
    pub fn new(lid: &str) -> Self {
        let pid = Pid::parse(lid).expect("fixture pid must parse");
        let mut headers = HeaderMap::new();
        headers.insert("temperature".to_string(), "31.5".to_string());
        headers.insert("humidity".to_string(), "70.25".to_string());
        // 0.25 ml/min over 1200 s of un-inhibited run -> 5.0 ml analyzed
        headers.insert("runTime".to_string(), "1320".to_string());
        headers.insert("inhibitTime".to_string(), "120".to_string());
        headers.insert("lookTime".to_string(), "1100".to_string());
        Self {
            index: Ok(Arc::new(build_index(pid.schema, 100, 10, 10))),
            pid,
            sizes: FileSizes {
                adc: 2048,
                hdr: 512,
                roi: 10_000,
            },
            headers,
            ml_override: None,
        }
    }

    /// Images with explicit extents, one ROI per entry.
    pub fn with_image_shapes(mut self, shapes: &[(u32, u32)]) -> Self {
        let mut text = String::new();
        let mut start = 0u64;
        for (i, (w, h)) in shapes.iter().enumerate() {
            text.push_str(&format!("{},0,0,{w},{h},{start}\n", i + 1));
            start += *w as u64 * *h as u64;
        }
        self.index = Ok(Arc::new(
            RoiIndex::parse(SchemaVersion::V2, &self.pid.lid, &text)
                .expect("fixture index must parse"),
        ));
        self
    }

    /// A legacy empty capture: one-byte ROI payload file, no images.
    pub fn empty_capture(mut self) -> Self {
        self.sizes.roi = 1;
        self.index = Ok(Arc::new(RoiIndex::default()));
        self
    }

    /// A structurally hopeless record, far below the size floor.
    pub fn malformed(mut self) -> Self {
        self.sizes = FileSizes {
            adc: 4,
            hdr: 3,
            roi: 3,
        };
        self
    }

    /// An unreadable index on an otherwise plausible fileset.
    pub fn corrupt_index(mut self) -> Self {
        self.index = Err(SourceError::CorruptIndex {
            pid: self.pid.lid.clone(),
            message: "fixture corruption".to_string(),
        });
        self
    }

    pub fn with_ml_analyzed(mut self, ml: f64) -> Self {
        self.ml_override = Some(ml);
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }
}

impl RawBin for FixtureBin {
    fn pid(&self) -> &Pid {
        &self.pid
    }

    fn file_sizes(&self) -> FileSizes {
        self.sizes
    }

    fn headers(&self) -> Result<HeaderMap, SourceError> {
        Ok(self.headers.clone())
    }

    fn index(&self) -> Result<Arc<RoiIndex>, SourceError> {
        self.index.clone()
    }

    fn image(&self, roi: u32) -> Result<GrayImage, SourceError> {
        let index = self.index()?;
        match index.get(roi) {
            Some(r) if r.byte_len() > 0 => Ok(GrayImage::from_pixel(
                r.width,
                r.height,
                Luma([(roi * 37 % 251) as u8]),
            )),
            _ => Err(SourceError::RoiOutOfRange {
                pid: self.pid.lid.clone(),
                roi,
                count: index.len(),
            }),
        }
    }

    fn ml_analyzed(&self) -> Result<f64, SourceError> {
        match self.ml_override {
            Some(ml) => Ok(ml),
            None => {
                let headers = self.headers()?;
                let get = |key: &str| -> Result<f64, SourceError> {
                    headers
                        .get(key)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| SourceError::BadHeader {
                            pid: self.pid.lid.clone(),
                            message: format!("missing attribute {key}"),
                        })
                };
                Ok(crate::source::FLOW_RATE_ML_PER_MIN * (get("runTime")? - get("inhibitTime")?)
                    / 60.0)
            }
        }
    }
}

fn build_index(schema: SchemaVersion, n: u32, width: u32, height: u32) -> RoiIndex {
    let mut text = String::new();
    let mut start = 0u64;
    for i in 1..=n {
        match schema {
            SchemaVersion::V2 => text.push_str(&format!("{i},0,0,{width},{height},{start}\n")),
            SchemaVersion::V1 => text.push_str(&format!("{i},0,0,{width},{height}\n")),
        }
        start += width as u64 * height as u64;
    }
    RoiIndex::parse(schema, "fixture", &text).expect("fixture index must parse")
}

/// A source over a fixed set of fixture bins.
pub struct FixtureSource {
    bins: Vec<Arc<FixtureBin>>,
}

impl FixtureSource {
    pub fn new(bins: Vec<FixtureBin>) -> Self {
        let mut bins: Vec<Arc<FixtureBin>> = bins.into_iter().map(Arc::new).collect();
        bins.sort_by(|a, b| a.pid.lid.cmp(&b.pid.lid));
        Self { bins }
    }
}

impl BinSource for FixtureSource {
    fn scan(&self, _spec: &ScanSpec) -> Result<Vec<Arc<dyn RawBin>>, SourceError> {
        Ok(self
            .bins
            .iter()
            .map(|b| b.clone() as Arc<dyn RawBin>)
            .collect())
    }

    fn locate(&self, pid: &str) -> Result<Arc<dyn RawBin>, SourceError> {
        self.bins
            .iter()
            .find(|b| b.pid.lid == pid)
            .map(|b| b.clone() as Arc<dyn RawBin>)
            .ok_or_else(|| SourceError::NotFound(pid.to_string()))
    }
}
