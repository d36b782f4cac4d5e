//! ROI index parsing.
//!
//! The `.adc` file is a CSV table with one row per detector trigger event.
//! Rows record the ROI geometry and, in the current schema, the byte offset
//! of the ROI payload:
//!
//! - version 2: `trigger,x,y,width,height,start`
//! - version 1: `trigger,x,y,width,height` with no offsets; a reconciliation
//!   pass reconstructs them from the cumulative payload sizes, and trigger
//!   gaps stand in for frames the legacy firmware dropped from the table.
//!
//! A row with zero area is a trigger that produced no usable image; such
//! rows occupy no payload bytes.

use crate::error::SourceError;

use super::SchemaVersion;

/// One row of the ROI index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiRecord {
    /// ROI number; 1-based position in the index.
    pub roi: u32,
    /// Detector trigger number this ROI came from.
    pub trigger: u32,
    /// Capture position on the camera frame.
    pub x: u32,
    pub y: u32,
    /// ROI extent in pixels. Zero area means no image was extracted.
    pub width: u32,
    pub height: u32,
    /// Byte offset of the payload in the `.roi` file.
    pub start: u64,
}

impl RoiRecord {
    /// Payload length in bytes (8-bit grayscale, row-major).
    pub fn byte_len(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Parsed, reconciled ROI index for one sample.
#[derive(Debug, Clone, Default)]
pub struct RoiIndex {
    records: Vec<RoiRecord>,
}

impl RoiIndex {
    /// Parse index text for the given schema version.
    pub fn parse(schema: SchemaVersion, pid: &str, text: &str) -> Result<RoiIndex, SourceError> {
        let columns = match schema {
            SchemaVersion::V1 => 5,
            SchemaVersion::V2 => 6,
        };
        let mut records = Vec::new();
        let mut next_start = 0u64;
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != columns {
                return Err(corrupt(
                    pid,
                    format!(
                        "row {} has {} columns, expected {columns}",
                        lineno + 1,
                        fields.len()
                    ),
                ));
            }
            let num = |i: usize| -> Result<u64, SourceError> {
                fields[i].parse().map_err(|_| {
                    corrupt(
                        pid,
                        format!("row {} column {} is not numeric", lineno + 1, i + 1),
                    )
                })
            };
            let mut record = RoiRecord {
                roi: records.len() as u32 + 1,
                trigger: num(0)? as u32,
                x: num(1)? as u32,
                y: num(2)? as u32,
                width: num(3)? as u32,
                height: num(4)? as u32,
                start: 0,
            };
            match schema {
                SchemaVersion::V2 => record.start = num(5)?,
                SchemaVersion::V1 => {
                    // legacy rows carry no offsets; payloads are contiguous
                    record.start = next_start;
                    next_start += record.byte_len();
                }
            }
            records.push(record);
        }
        Ok(RoiIndex { records })
    }

    /// Number of index rows, including zero-area triggers.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of ROIs that carry an image.
    pub fn image_count(&self) -> u32 {
        self.records.iter().filter(|r| r.byte_len() > 0).count() as u32
    }

    /// Number of detector triggers.
    ///
    /// The highest trigger number seen, so that legacy gaps (frames missing
    /// from the table entirely) still count as triggers.
    pub fn trigger_count(&self) -> u32 {
        self.records.iter().map(|r| r.trigger).max().unwrap_or(0)
    }

    /// Look up one row by ROI number.
    pub fn get(&self, roi: u32) -> Option<&RoiRecord> {
        if roi == 0 {
            return None;
        }
        self.records.get(roi as usize - 1)
    }

    /// Iterate the rows that carry an image, in ROI order.
    pub fn images(&self) -> impl Iterator<Item = &RoiRecord> {
        self.records.iter().filter(|r| r.byte_len() > 0)
    }
}

fn corrupt(pid: &str, message: String) -> SourceError {
    SourceError::CorruptIndex {
        pid: pid.to_string(),
        message,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PID: &str = "D20190102T093000_IFCB927";

    #[test]
    fn parses_v2_rows() {
        let text = "1,10,20,30,40,0\n2,5,5,0,0,1200\n3,0,0,8,8,1200\n";
        let ix = RoiIndex::parse(SchemaVersion::V2, PID, text).unwrap();
        assert_eq!(ix.len(), 3);
        assert_eq!(ix.image_count(), 2);
        assert_eq!(ix.trigger_count(), 3);
        let r = ix.get(3).unwrap();
        assert_eq!((r.width, r.height, r.start), (8, 8, 1200));
    }

    #[test]
    fn v1_offsets_are_cumulative() {
        // 4x4 image, a zero-area trigger, then a 2x3 image
        let text = "1,0,0,4,4\n2,0,0,0,0\n4,0,0,2,3\n";
        let ix = RoiIndex::parse(SchemaVersion::V1, PID, text).unwrap();
        assert_eq!(ix.get(1).unwrap().start, 0);
        assert_eq!(ix.get(2).unwrap().byte_len(), 0);
        assert_eq!(ix.get(3).unwrap().start, 16);
        // trigger 3 is a dropped frame; it still counts as a trigger
        assert_eq!(ix.trigger_count(), 4);
        assert_eq!(ix.image_count(), 2);
    }

    #[test]
    fn rejects_wrong_column_count() {
        let err = RoiIndex::parse(SchemaVersion::V2, PID, "1,2,3\n").unwrap_err();
        assert!(matches!(err, SourceError::CorruptIndex { .. }));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let err = RoiIndex::parse(SchemaVersion::V2, PID, "1,2,3,four,5,6\n").unwrap_err();
        assert!(err.to_string().contains("not numeric"));
    }

    #[test]
    fn empty_index_is_valid() {
        let ix = RoiIndex::parse(SchemaVersion::V2, PID, "").unwrap();
        assert!(ix.is_empty());
        assert_eq!(ix.image_count(), 0);
        assert_eq!(ix.trigger_count(), 0);
    }
}
