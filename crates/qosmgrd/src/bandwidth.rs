//! Shaping rate and burst.

use serde_json::Value;
use tracing::{error, warn};

use crate::tables::shaper_fields;
use crate::units::{parse_bandwidth, parse_percent};
use crate::value_ext::ValueExt;

/// Default burst size in bytes.
pub const DEFAULT_BURST: u64 = 16_000;

/// Configured rate, absolute or relative to the parent level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rate {
    /// Bytes per second. `None` when the string did not parse.
    Absolute(Option<u64>),
    /// Percentage of the parent rate.
    Percent(f64),
}

impl Rate {
    /// Parses a bandwidth or percentage string.
    pub fn parse(text: &str) -> Self {
        match parse_percent(text) {
            Some(pct) => Rate::Percent(pct),
            None => Rate::Absolute(parse_bandwidth(text)),
        }
    }
}

/// Token bucket depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Burst {
    Bytes(u64),
    Msec(u64),
}

impl Burst {
    fn token(&self) -> String {
        match self {
            Burst::Bytes(b) => format!("size {}", b),
            Burst::Msec(ms) => format!("msec {}", ms),
        }
    }
}

/// Rate plus burst for one shaping level.
#[derive(Debug, Clone, PartialEq)]
pub struct Bandwidth {
    pub rate: Rate,
    pub burst: Burst,
}

impl Bandwidth {
    /// Parses the `bandwidth`, `burst` and `burst-msec` leaves of `value`,
    /// falling back to `default_rate` when no bandwidth is configured.
    pub fn parse(value: &Value, default_rate: &str) -> Self {
        let rate = value
            .get_text(shaper_fields::BANDWIDTH)
            .map(|text| Rate::parse(&text))
            .unwrap_or_else(|| Rate::parse(default_rate));

        let bytes = value.get_u64(shaper_fields::BURST);
        let msec = value.get_u64(shaper_fields::BURST_MSEC);
        let burst = match (bytes, msec) {
            (Some(b), Some(_)) => {
                warn!(burst = b, "Both burst and burst-msec configured, using burst");
                Burst::Bytes(b)
            }
            (Some(b), None) => Burst::Bytes(b),
            (None, Some(ms)) => Burst::Msec(ms),
            (None, None) => Burst::Bytes(DEFAULT_BURST),
        };

        Self { rate, burst }
    }

    /// Creates an absolute bandwidth with the default burst.
    pub fn absolute(bytes_per_sec: u64) -> Self {
        Self {
            rate: Rate::Absolute(Some(bytes_per_sec)),
            burst: Burst::Bytes(DEFAULT_BURST),
        }
    }

    /// Resolves the rate in bytes per second.
    ///
    /// A malformed rate resolves to zero. So does a percentage without a
    /// parent, which is logged as an error.
    pub fn bytes_per_sec(&self, parent: Option<u64>) -> u64 {
        match self.rate {
            Rate::Absolute(bps) => bps.unwrap_or(0),
            Rate::Percent(pct) => match parent {
                Some(parent) => (parent as f64 * pct / 100.0) as u64,
                None => {
                    error!(percent = pct, "Percentage bandwidth without a parent rate");
                    0
                }
            },
        }
    }

    /// Renders ` rate <bps> size <b>` or ` rate <bps> msec <n>`.
    pub fn commands(&self, parent: Option<u64>) -> String {
        format!(
            " rate {} {}",
            self.bytes_per_sec(parent),
            self.burst.token()
        )
    }
}
