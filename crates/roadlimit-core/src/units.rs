//! Speed unit handling
//!
//! Parses the free-form `maxspeed` values found in OSM tags and normalizes
//! everything to km/h, which is the unit the rest of the pipeline (and the
//! one-byte display protocol) works in.

use regex::Regex;

/// Miles per hour to kilometres per hour
pub const MPH_TO_KMH: f64 = 1.60934;

/// Convert a mph value to km/h, truncating to whole km/h
pub fn mph_to_kmh(mph: u32) -> u32 {
    (mph as f64 * MPH_TO_KMH) as u32
}

/// Parse an OSM `maxspeed` tag value into km/h.
///
/// Handles the common shapes: plain numbers ("50"), annotated numbers
/// ("80 km/h"), imperial values ("30 mph"), and the special tokens `none`,
/// `unlimited`, `walk`. Returns `None` when no numeric limit can be derived.
pub fn parse_maxspeed(raw: &str) -> Option<u32> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    match value.to_ascii_lowercase().as_str() {
        "none" | "unlimited" => return None,
        "walk" | "walking" => return Some(5),
        _ => {}
    }

    let digits = leading_number(value)?;
    if value.to_ascii_lowercase().contains("mph") {
        Some(mph_to_kmh(digits))
    } else {
        Some(digits)
    }
}

/// First run of digits in the string, e.g. "30 mph" -> 30
fn leading_number(value: &str) -> Option<u32> {
    let re = Regex::new(r"[0-9]+").unwrap();
    re.find(value)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number() {
        assert_eq!(parse_maxspeed("50"), Some(50));
        assert_eq!(parse_maxspeed(" 80 "), Some(80));
        assert_eq!(parse_maxspeed("60 km/h"), Some(60));
    }

    #[test]
    fn test_mph_converted() {
        // 30 mph = 48.28 km/h, truncated
        assert_eq!(parse_maxspeed("30 mph"), Some(48));
        assert_eq!(parse_maxspeed("70MPH"), Some(112));
    }

    #[test]
    fn test_special_tokens() {
        assert_eq!(parse_maxspeed("none"), None);
        assert_eq!(parse_maxspeed("unlimited"), None);
        assert_eq!(parse_maxspeed("walk"), Some(5));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_maxspeed(""), None);
        assert_eq!(parse_maxspeed("RO:urban"), None);
        assert_eq!(parse_maxspeed("signals"), None);
    }

    #[test]
    fn test_zero_is_preserved() {
        // Callers decide whether a zero limit is usable
        assert_eq!(parse_maxspeed("0"), Some(0));
    }
}
