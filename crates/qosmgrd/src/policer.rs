//! Policer descriptor encoding.

use serde_json::Value;
use sonic_cfgmgr_common::CheckFailure;
use tracing::warn;

use crate::tables::policer_fields;
use crate::units::{dscp_value, parse_bandwidth, parse_ratelimit, PCP_MAX};
use crate::value_ext::ValueExt;

/// Default policer burst in bytes.
pub const DEFAULT_BURST: u64 = 16_000;

/// Default frame overhead in bytes.
pub const DEFAULT_FRAME_OVERHEAD: u64 = 24;

/// Default token-bucket refill period in milliseconds.
pub const DEFAULT_TC_MSEC: u64 = 20;

/// Re-marking of a packet's DSCP or PCP field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marking {
    Dscp(u8),
    Pcp(u8),
}

impl Marking {
    /// Parses a `{"dscp": ..}` or `{"pcp": ..}` container.
    pub fn parse(value: &Value) -> Option<Self> {
        if let Some(dscp) = value.get_text(policer_fields::DSCP) {
            return dscp_value(&dscp).map(Marking::Dscp).or_else(|| {
                warn!(dscp = %dscp, "Ignoring invalid DSCP marking");
                None
            });
        }
        if let Some(pcp) = value.get_u64(policer_fields::PCP) {
            if pcp <= u64::from(PCP_MAX) {
                return Some(Marking::Pcp(pcp as u8));
            }
            warn!(pcp, "Ignoring out of range PCP marking");
        }
        None
    }

    /// Result-processing fragment, e.g. `markdscp(46)` or `markpcp(3,none)`.
    pub fn rproc(&self) -> String {
        match self {
            Marking::Dscp(v) => format!("markdscp({})", v),
            Marking::Pcp(v) => format!("markpcp({},none)", v),
        }
    }
}

/// What a policer does to out-of-profile traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceedAction {
    #[default]
    Drop,
    Mark(Marking),
}

impl ExceedAction {
    fn token(&self) -> String {
        match self {
            ExceedAction::Drop => "drop".to_string(),
            ExceedAction::Mark(Marking::Dscp(v)) => format!("markdscp={}", v),
            ExceedAction::Mark(Marking::Pcp(v)) => format!("markpcp={}", v),
        }
    }
}

/// A single-rate policer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policer {
    /// Rate in bytes per second, if configured as a bandwidth.
    pub bandwidth: Option<u64>,
    /// Rate in packets per second, if configured as a rate limit.
    pub ratelimit: Option<u64>,
    bandwidth_set: bool,
    ratelimit_set: bool,
    pub burst: u64,
    pub frame_overhead: u64,
    pub tc: u64,
    pub action: ExceedAction,
}

impl Policer {
    /// Parses a `police` subtree.
    pub fn parse(value: &Value) -> Self {
        let bandwidth_text = value.get_text(policer_fields::BANDWIDTH);
        let ratelimit_text = value.get_text(policer_fields::RATELIMIT);

        let action = match value.get(policer_fields::THEN) {
            Some(then) => match then.get_str(policer_fields::ACTION) {
                Some("mark") => then
                    .get(policer_fields::MARK)
                    .and_then(Marking::parse)
                    .map(ExceedAction::Mark)
                    .unwrap_or_default(),
                _ => ExceedAction::Drop,
            },
            None => ExceedAction::Drop,
        };

        Self {
            bandwidth: bandwidth_text.as_deref().and_then(parse_bandwidth),
            ratelimit: ratelimit_text.as_deref().and_then(parse_ratelimit),
            bandwidth_set: bandwidth_text.is_some(),
            ratelimit_set: ratelimit_text.is_some(),
            burst: value
                .get_u64(policer_fields::BURST)
                .unwrap_or(DEFAULT_BURST),
            frame_overhead: value
                .get_u64(policer_fields::FRAME_OVERHEAD)
                .unwrap_or(DEFAULT_FRAME_OVERHEAD),
            tc: value.get_u64(policer_fields::TC).unwrap_or(DEFAULT_TC_MSEC),
            action,
        }
    }

    /// Encodes the policer as a single `policer(...)` descriptor.
    ///
    /// ```
    /// use serde_json::json;
    /// use sonic_qosmgrd::policer::Policer;
    ///
    /// let p = Policer::parse(&json!({"bandwidth": "1Mbit"}));
    /// assert_eq!(p.descriptor(), "policer(125000,16000,0,drop,24,20)");
    /// ```
    pub fn descriptor(&self) -> String {
        format!(
            "policer({},{},{},{},{},{})",
            self.bandwidth.unwrap_or(0),
            self.burst,
            self.ratelimit.unwrap_or(0),
            self.action.token(),
            self.frame_overhead,
            self.tc
        )
    }

    pub fn check(&self, path: &str) -> Result<(), CheckFailure> {
        if self.bandwidth_set && self.ratelimit_set {
            return Err(CheckFailure::new(
                "Cannot configure both bandwidth and ratelimit on the same policer",
                path,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bandwidth_policer_defaults() {
        let p = Policer::parse(&json!({"bandwidth": "1Mbit"}));
        assert_eq!(p.bandwidth, Some(125_000));
        assert_eq!(p.descriptor(), "policer(125000,16000,0,drop,24,20)");
        assert!(p.check("x").is_ok());
    }

    #[test]
    fn test_ratelimit_with_mark() {
        let p = Policer::parse(&json!({
            "ratelimit": "10Kpps",
            "burst": 2000,
            "frame-overhead": "inherit-me",
            "tc": 5,
            "then": {"action": "mark", "mark": {"dscp": "ef"}}
        }));
        assert_eq!(p.descriptor(), "policer(0,2000,10000,markdscp=46,24,5)");

        let p = Policer::parse(&json!({
            "bandwidth": "8kbit",
            "then": {"action": "mark", "mark": {"pcp": 5}}
        }));
        assert_eq!(p.descriptor(), "policer(1000,16000,0,markpcp=5,24,20)");
    }

    #[test]
    fn test_both_rates_fail_check() {
        let p = Policer::parse(&json!({"bandwidth": "1Mbit", "ratelimit": "100pps"}));
        let err = p.check("policy/qos/name/p1/police").unwrap_err();
        assert_eq!(
            err.message,
            "Cannot configure both bandwidth and ratelimit on the same policer"
        );
        assert_eq!(err.path, "policy/qos/name/p1/police");
    }

    #[test]
    fn test_malformed_rate_still_counts_as_configured() {
        let p = Policer::parse(&json!({"bandwidth": "bogus", "ratelimit": "100pps"}));
        assert_eq!(p.bandwidth, None);
        assert!(p.check("x").is_err());
    }

    #[test]
    fn test_marking_rproc() {
        assert_eq!(Marking::Dscp(10).rproc(), "markdscp(10)");
        assert_eq!(Marking::Pcp(3).rproc(), "markpcp(3,none)");
        assert_eq!(Marking::parse(&json!({"pcp": 9})), None);
        assert_eq!(Marking::parse(&json!({"dscp": "af11"})), Some(Marking::Dscp(10)));
    }
}
