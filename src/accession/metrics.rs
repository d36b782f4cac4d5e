//! Metric extraction for records that passed the structural checks.
//!
//! Pulls environmental readings from the header, counts triggers and
//! images from the index, and derives concentration. Any failure here is
//! fatal for the sample being ingested; the caller decides what happens to
//! the row.

use crate::error::MetricsError;
use crate::source::{HeaderMap, RawBin};
use crate::store::BinMetrics;

/// Extract and validate the metrics of one record.
///
/// Volume analyzed is validated before the derived concentration, so a
/// non-positive volume always reports as a volume error.
pub fn extract_metrics(bin: &dyn RawBin) -> Result<BinMetrics, MetricsError> {
    let pid = &bin.pid().lid;

    let ml_analyzed = bin.ml_analyzed()?;
    if !(ml_analyzed > 0.0) {
        return Err(MetricsError::VolumeNotPositive {
            pid: pid.clone(),
            ml_analyzed,
        });
    }

    let headers = bin.headers()?;
    let index = bin.index()?;
    let n_images = index.image_count();
    let n_triggers = index.trigger_count();

    let concentration = n_images as f64 / ml_analyzed;
    if concentration < 0.0 {
        return Err(MetricsError::NegativeConcentration {
            pid: pid.clone(),
            concentration,
        });
    }

    let metadata = serde_json::to_string(&headers).map_err(|e| MetricsError::HeaderValue {
        pid: pid.clone(),
        key: "metadata",
        message: e.to_string(),
    })?;

    Ok(BinMetrics {
        size: bin.file_sizes().total(),
        temperature: optional_f64(&headers, "temperature", pid)?,
        humidity: optional_f64(&headers, "humidity", pid)?,
        run_time: optional_f64(&headers, "runTime", pid)?,
        look_time: optional_f64(&headers, "lookTime", pid)?,
        ml_analyzed,
        n_triggers,
        n_images,
        concentration,
        metadata,
    })
}

/// Read an optional numeric header attribute. Absence is fine; a value
/// that fails to parse is not.
fn optional_f64(
    headers: &HeaderMap,
    key: &'static str,
    pid: &str,
) -> Result<Option<f64>, MetricsError> {
    match headers.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MetricsError::HeaderValue {
                pid: pid.to_string(),
                key,
                message: format!("not numeric: {raw:?}"),
            }),
    }
}

// =============================================================================
// Tests
// =============================================================================
