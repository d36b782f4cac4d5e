//! Permanent sample identifiers.
//!
//! Two pid styles exist in the wild:
//!
//! - `DYYYYMMDDTHHMMSS_IFCBNNN`: the current style; timestamp first, then
//!   the instrument tag.
//! - `IFCBn_YYYY_DDD_HHMMSS`: the legacy style used by version-1 units;
//!   the day is expressed as a day-of-year ordinal.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::SourceError;

use super::SchemaVersion;

/// A parsed permanent identifier.
///
/// Carries everything the ingestion path derives from the name alone: the
/// acquisition timestamp, the instrument number, and the schema generation
/// implied by the pid style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pid {
    /// The full identifier string, e.g. `D20190102T093000_IFCB927`.
    pub lid: String,
    /// Acquisition timestamp encoded in the identifier.
    pub timestamp: DateTime<Utc>,
    /// Instrument number.
    pub instrument: u32,
    /// Schema generation implied by the pid style.
    pub schema: SchemaVersion,
}

impl Pid {
    /// Parse either pid style.
    pub fn parse(lid: &str) -> Result<Pid, SourceError> {
        if lid.starts_with('D') {
            Self::parse_current(lid)
        } else if lid.starts_with("IFCB") {
            Self::parse_legacy(lid)
        } else {
            Err(bad(lid, "does not start with 'D' or 'IFCB'"))
        }
    }

    /// `DYYYYMMDDTHHMMSS_IFCBNNN`
    fn parse_current(lid: &str) -> Result<Pid, SourceError> {
        let rest = &lid[1..];
        let (stamp, tag) = rest
            .split_once('_')
            .ok_or_else(|| bad(lid, "missing instrument tag"))?;
        let number: u32 = tag
            .strip_prefix("IFCB")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| bad(lid, "instrument tag is not IFCB<number>"))?;
        let (date, time) = stamp
            .split_once('T')
            .ok_or_else(|| bad(lid, "missing 'T' separator"))?;
        if date.len() != 8 || time.len() != 6 {
            return Err(bad(lid, "timestamp fields have the wrong width"));
        }
        let naive = NaiveDate::from_ymd_opt(
            field(lid, &date[0..4])? as i32,
            field(lid, &date[4..6])?,
            field(lid, &date[6..8])?,
        )
        .and_then(|d| {
            d.and_hms_opt(
                field(lid, &time[0..2]).ok()?,
                field(lid, &time[2..4]).ok()?,
                field(lid, &time[4..6]).ok()?,
            )
        })
        .ok_or_else(|| bad(lid, "timestamp is not a valid instant"))?;
        Ok(Pid {
            lid: lid.to_string(),
            timestamp: Utc.from_utc_datetime(&naive),
            instrument: number,
            schema: SchemaVersion::V2,
        })
    }

    /// `IFCBn_YYYY_DDD_HHMMSS`
    fn parse_legacy(lid: &str) -> Result<Pid, SourceError> {
        let mut parts = lid.split('_');
        let tag = parts.next().unwrap_or_default();
        let number: u32 = tag
            .strip_prefix("IFCB")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| bad(lid, "instrument tag is not IFCB<number>"))?;
        let year = parts
            .next()
            .ok_or_else(|| bad(lid, "missing year field"))
            .and_then(|s| field(lid, s))?;
        let ordinal = parts
            .next()
            .ok_or_else(|| bad(lid, "missing day-of-year field"))
            .and_then(|s| field(lid, s))?;
        let time = parts.next().ok_or_else(|| bad(lid, "missing time field"))?;
        if parts.next().is_some() || time.len() != 6 {
            return Err(bad(lid, "unexpected trailing fields"));
        }
        let naive = NaiveDate::from_yo_opt(year as i32, ordinal)
            .and_then(|d| {
                d.and_hms_opt(
                    field(lid, &time[0..2]).ok()?,
                    field(lid, &time[2..4]).ok()?,
                    field(lid, &time[4..6]).ok()?,
                )
            })
            .ok_or_else(|| bad(lid, "timestamp is not a valid instant"))?;
        Ok(Pid {
            lid: lid.to_string(),
            timestamp: Utc.from_utc_datetime(&naive),
            instrument: number,
            schema: SchemaVersion::V1,
        })
    }
}

impl std::fmt::Display for Pid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lid)
    }
}

fn bad(lid: &str, reason: &str) -> SourceError {
    SourceError::BadPid {
        pid: lid.to_string(),
        reason: reason.to_string(),
    }
}

fn field(lid: &str, s: &str) -> Result<u32, SourceError> {
    s.parse()
        .map_err(|_| bad(lid, &format!("non-numeric field {s:?}")))
}

// =============================================================================
// Tests
// =============================================================================
