//! Pipe queues and the qmap encoding.
//!
//! A qmap packs drop precedence, WRR id and traffic class into the queue
//! identifier the dataplane understands:
//!
//! ```text
//!   dp << 5 | wrr << 2 | tc
//! ```
//!
//! Values with non-zero drop precedence exceed 5 bits on purpose.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure};

use crate::tables::{queue_fields, shaper_fields};
use crate::value_ext::ValueExt;
use crate::wred::{LimitUnit, WredMap};

/// Number of traffic classes per shaping level.
pub const NUM_TRAFFIC_CLASSES: usize = 4;

/// Maximum WRR queues per traffic class.
pub const MAX_WRR_PER_TC: usize = 8;

/// Number of pipe queues in a profile.
pub const NUM_PIPE_QUEUES: usize = 32;

/// Queue weight used when none is configured.
pub const DEFAULT_WEIGHT: u64 = 1;

const MAX_WEIGHT: u64 = 100;

/// Packs `(tc, wrr, dp)` into a qmap.
pub fn encode_qmap(tc: u8, wrr: u8, dp: u8) -> u32 {
    (u32::from(dp) << 5) | (u32::from(wrr & 0x7) << 2) | u32::from(tc & 0x3)
}

/// Unpacks a qmap into `(tc, wrr, dp)`.
pub fn decode_qmap(qmap: u32) -> (u8, u8, u8) {
    ((qmap & 0x3) as u8, ((qmap >> 2) & 0x7) as u8, (qmap >> 5) as u8)
}

/// Renders a qmap as a hex literal.
pub fn fmt_qmap(qmap: u32) -> String {
    format!("{:#x}", qmap)
}

/// Renders a qmap for the queue table, where zero stays a bare `0`.
pub fn fmt_qmap_legacy(qmap: u32) -> String {
    if qmap == 0 {
        "0".to_string()
    } else {
        fmt_qmap(qmap)
    }
}

/// One configured pipe queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    /// Pipe queue id, 0..31.
    pub id: u64,
    /// Owning traffic class, 0..3.
    pub tc: u64,
    /// WRR id inside the traffic class, assigned when the queue table is
    /// built.
    pub wrr: Option<u8>,
    pub weight: u64,
    pub priority_local: bool,
    pub wred_maps: Vec<WredMap>,
}

impl Queue {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        Ok(Self {
            id: value.require_u64(shaper_fields::ID, "queue")?,
            tc: value.require_u64(shaper_fields::TRAFFIC_CLASS, "queue")?,
            wrr: None,
            weight: value
                .get_u64(queue_fields::WEIGHT)
                .unwrap_or(DEFAULT_WEIGHT),
            priority_local: value.has_flag(queue_fields::PRIORITY_LOCAL),
            wred_maps: WredMap::parse_all(value)?,
        })
    }

    /// Encoded identity with the given drop precedence.
    pub fn qmap(&self, dp: u8) -> u32 {
        encode_qmap(self.tc as u8, self.wrr.unwrap_or(0), dp)
    }

    /// Returns true if any WRED map is attached.
    pub fn has_wred(&self) -> bool {
        !self.wred_maps.is_empty()
    }

    /// Renders the WRED fragment of the queue's param line.
    pub fn wred_commands(&self) -> String {
        self.wred_maps.iter().map(WredMap::commands).collect()
    }

    pub fn check(&self, path: &str, limit: Option<(LimitUnit, u64)>) -> Result<(), CheckFailure> {
        if !(1..=MAX_WEIGHT).contains(&self.weight) {
            return Err(CheckFailure::new(
                format!(
                    "Queue weight {} must be between 1 and {}",
                    self.weight, MAX_WEIGHT
                ),
                path,
            ));
        }
        for map in &self.wred_maps {
            map.check(path, limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_qmap_round_trip() {
        for wrr in 0..8u8 {
            for tc in 0..4u8 {
                let qmap = encode_qmap(tc, wrr, 0);
                assert_eq!(qmap, u32::from(wrr) << 2 | u32::from(tc));
                assert_eq!(decode_qmap(qmap), (tc, wrr, 0));
            }
        }
    }

    #[test]
    fn test_drop_precedence_high_bits() {
        let qmap = encode_qmap(1, 2, 3);
        assert_eq!(qmap, 0x69);
        assert_eq!(decode_qmap(qmap), (1, 2, 3));
    }

    #[test]
    fn test_qmap_formatting() {
        assert_eq!(fmt_qmap(0), "0x0");
        assert_eq!(fmt_qmap(0x1d), "0x1d");
        assert_eq!(fmt_qmap_legacy(0), "0");
        assert_eq!(fmt_qmap_legacy(4), "0x4");
    }

    #[test]
    fn test_parse_queue() {
        let q = Queue::parse(&json!({
            "id": 3, "traffic-class": "1", "weight": 40, "priority-local": [null]
        }))
        .unwrap();
        assert_eq!((q.id, q.tc, q.weight), (3, 1, 40));
        assert!(q.priority_local);
        assert!(!q.has_wred());
    }

    #[test]
    fn test_parse_queue_requires_integer_tc() {
        let err = Queue::parse(&json!({"id": 3, "traffic-class": "high"})).unwrap_err();
        assert!(err.to_string().contains("traffic-class"));
    }

    #[test]
    fn test_weight_range() {
        let mut q = Queue::parse(&json!({"id": 0, "traffic-class": 0})).unwrap();
        assert!(q.check("q/0", None).is_ok());
        q.weight = 0;
        assert!(q.check("q/0", None).is_err());
        q.weight = 101;
        let err = q.check("q/0", None).unwrap_err();
        assert_eq!(err.message, "Queue weight 101 must be between 1 and 100");
    }
}
