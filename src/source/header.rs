//! Header file parsing.
//!
//! Header files are plain text, one `key: value` attribute per line.
//! Attribute values are kept as strings; interpretation (numeric parsing,
//! unit handling) belongs to metric extraction.

use crate::error::SourceError;

use super::HeaderMap;

/// Parse header text into an attribute map.
///
/// Blank lines are skipped. A non-blank line without a `:` separator makes
/// the whole header unparseable, since truncated headers usually fail this
/// way.
pub fn parse_headers(pid: &str, text: &str) -> Result<HeaderMap, SourceError> {
    let mut map = HeaderMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = line.split_once(':').ok_or_else(|| SourceError::BadHeader {
            pid: pid.to_string(),
            message: format!("line {} has no ':' separator", lineno + 1),
        })?;
        map.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(map)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes() {
        let text = "softwareVersion: 1.2.3\ntemperature: 31.5\n\nrunTime: 1320\n";
        let map = parse_headers("D20190102T093000_IFCB927", text).unwrap();
        assert_eq!(map.get("temperature").map(String::as_str), Some("31.5"));
        assert_eq!(map.get("runTime").map(String::as_str), Some("1320"));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn rejects_lines_without_separator() {
        let err = parse_headers("p", "temperature 31.5").unwrap_err();
        assert!(err.to_string().contains("no ':' separator"));
    }

    #[test]
    fn empty_header_is_empty_map() {
        assert!(parse_headers("p", "").unwrap().is_empty());
    }

    #[test]
    fn values_may_contain_colons() {
        let map = parse_headers("p", "sampleTime: 09:30:00").unwrap();
        assert_eq!(map.get("sampleTime").map(String::as_str), Some("09:30:00"));
    }
}
