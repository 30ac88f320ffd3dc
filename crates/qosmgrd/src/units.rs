//! Unit parsers for bandwidth, rate-limit, DSCP and protocol strings.
//!
//! All parsers are lenient: a malformed value is logged and `None` is
//! returned, leaving it to the caller to degrade gracefully. The schema layer
//! is expected to have rejected truly invalid input already.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// `<number>[<multiplier>][bit|bps]`, case-insensitive.
static BANDWIDTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(ki|mi|gi|ti|k|m|g|t)?(bit|bps)?\s*$")
        .expect("Invalid regex pattern")
});

/// `<number>%`
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*%\s*$").expect("Invalid regex pattern"));

/// `<number>[k|m]pps`, case-insensitive.
static RATELIMIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+(?:\.\d+)?)\s*(?:(k|m)?pps)?\s*$").expect("Invalid regex pattern")
});

/// Highest valid DSCP code point.
pub const DSCP_MAX: u8 = 63;

/// Highest valid PCP value.
pub const PCP_MAX: u8 = 7;

/// Named DSCP code points.
const DSCP_NAMES: &[(&str, u8)] = &[
    ("default", 0),
    ("cs0", 0),
    ("cs1", 8),
    ("cs2", 16),
    ("cs3", 24),
    ("cs4", 32),
    ("cs5", 40),
    ("cs6", 48),
    ("cs7", 56),
    ("af11", 10),
    ("af12", 12),
    ("af13", 14),
    ("af21", 18),
    ("af22", 20),
    ("af23", 22),
    ("af31", 26),
    ("af32", 28),
    ("af33", 30),
    ("af41", 34),
    ("af42", 36),
    ("af43", 38),
    ("va", 44),
    ("ef", 46),
];

const PROTOCOL_NAMES: &[(&str, u8)] = &[
    ("icmp", 1),
    ("igmp", 2),
    ("tcp", 6),
    ("udp", 17),
    ("gre", 47),
    ("esp", 50),
    ("ah", 51),
    ("ipv6-icmp", 58),
    ("icmpv6", 58),
    ("ospf", 89),
    ("pim", 103),
    ("vrrp", 112),
    ("l2tp", 115),
    ("sctp", 132),
];

fn multiplier(suffix: &str) -> f64 {
    match suffix.to_ascii_lowercase().as_str() {
        "k" => 1e3,
        "m" => 1e6,
        "g" => 1e9,
        "t" => 1e12,
        "ki" => 1024.0,
        "mi" => 1024.0 * 1024.0,
        "gi" => 1024.0 * 1024.0 * 1024.0,
        "ti" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    }
}

/// Converts a bandwidth string into bytes per second.
///
/// A bare number is taken as kbit. A multiplier without a unit is taken as
/// bits.
///
/// ```
/// use sonic_qosmgrd::units::parse_bandwidth;
///
/// assert_eq!(parse_bandwidth("1Gbit"), Some(125_000_000));
/// assert_eq!(parse_bandwidth("2Kbps"), Some(2000));
/// assert_eq!(parse_bandwidth("bad"), None);
/// ```
pub fn parse_bandwidth(value: &str) -> Option<u64> {
    let Some(caps) = BANDWIDTH_RE.captures(value) else {
        warn!(value, "Malformed bandwidth");
        return None;
    };
    let number: f64 = caps[1].parse().ok()?;
    let mult = caps.get(2).map(|m| m.as_str());
    let unit = caps.get(3).map(|m| m.as_str().to_ascii_lowercase());

    let bits_or_bytes = match (mult, unit.as_deref()) {
        (None, None) => number * 1e3 / 8.0,
        (m, Some("bps")) => number * m.map(multiplier).unwrap_or(1.0),
        (m, _) => number * m.map(multiplier).unwrap_or(1.0) / 8.0,
    };
    Some(bits_or_bytes as u64)
}

/// Extracts the percentage from a `<n>%` string.
pub fn parse_percent(value: &str) -> Option<f64> {
    let caps = PERCENT_RE.captures(value)?;
    caps[1].parse().ok()
}

/// Converts a rate-limit string into packets per second.
pub fn parse_ratelimit(value: &str) -> Option<u64> {
    let Some(caps) = RATELIMIT_RE.captures(value) else {
        warn!(value, "Malformed rate limit");
        return None;
    };
    let number: f64 = caps[1].parse().ok()?;
    let scale = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "k" => 1e3,
        Some(ref s) if s == "m" => 1e6,
        _ => 1.0,
    };
    Some((number * scale) as u64)
}

/// Resolves a DSCP name or number to its code point.
pub fn dscp_value(value: &str) -> Option<u8> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u8>() {
        return (n <= DSCP_MAX).then_some(n);
    }
    let lower = value.to_ascii_lowercase();
    DSCP_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, v)| *v)
}

/// Expands a DSCP value or an inclusive `low-high` range.
///
/// ```
/// use sonic_qosmgrd::units::dscp_range;
///
/// assert_eq!(dscp_range("cs2-cs3"), Some((16..=24).collect()));
/// assert_eq!(dscp_range("64"), None);
/// ```
pub fn dscp_range(value: &str) -> Option<Vec<u8>> {
    let result = match value.split_once('-') {
        Some((low, high)) => match (dscp_value(low), dscp_value(high)) {
            (Some(low), Some(high)) if low <= high => Some((low..=high).collect()),
            _ => None,
        },
        None => dscp_value(value).map(|v| vec![v]),
    };
    if result.is_none() {
        warn!(value, "Malformed DSCP value or range");
    }
    result
}

/// Resolves an IP protocol name or number.
pub fn protocol_number(value: &str) -> Option<u8> {
    let value = value.trim();
    if let Ok(n) = value.parse::<u8>() {
        return Some(n);
    }
    let lower = value.to_ascii_lowercase();
    let found = PROTOCOL_NAMES
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, v)| *v);
    if found.is_none() {
        warn!(value, "Unknown protocol");
    }
    found
}
