//! The four traffic classes of a shaping level.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrError, CfgMgrResult, CheckFailure, Command};

use crate::bandwidth::Bandwidth;
use crate::platform::{
    LimitCapability, QosContext, DEFAULT_QUEUE_LIMIT_BYTES, DEFAULT_QUEUE_LIMIT_PACKETS,
};
use crate::queue::NUM_TRAFFIC_CLASSES;
use crate::tables::{shaper_fields, tc_fields};
use crate::value_ext::ValueExt;
use crate::wred::{LimitUnit, Wred};

/// Traffic class rate when none is configured.
pub const DEFAULT_TC_RATE: &str = "100%";

/// Queue length limit of a traffic class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueLimit {
    Packets(u64),
    Bytes(u64),
    Time(u64),
}

impl QueueLimit {
    /// Platform default limit.
    pub fn default_for(limits: LimitCapability) -> Self {
        match limits {
            LimitCapability::Packets => QueueLimit::Packets(DEFAULT_QUEUE_LIMIT_PACKETS),
            LimitCapability::Bytes => QueueLimit::Bytes(DEFAULT_QUEUE_LIMIT_BYTES),
        }
    }

    pub fn unit(&self) -> LimitUnit {
        match self {
            QueueLimit::Packets(_) => LimitUnit::Packets,
            QueueLimit::Bytes(_) => LimitUnit::Bytes,
            QueueLimit::Time(_) => LimitUnit::Time,
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            QueueLimit::Packets(n) | QueueLimit::Bytes(n) | QueueLimit::Time(n) => *n,
        }
    }

    /// Renders `limit <unit> <n>`.
    pub fn token(&self) -> String {
        format!("limit {} {}", self.unit().keyword(), self.value())
    }
}

/// One traffic class.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficClass {
    pub id: u8,
    pub bandwidth: Bandwidth,
    /// Every configured limit. More than one is a check failure.
    limits: Vec<QueueLimit>,
    pub wred: Option<Wred>,
    /// Pipe queue ids assigned to this class, in WRR order.
    pub queues: Vec<u64>,
}

impl TrafficClass {
    /// A class with full parent bandwidth and the default limit.
    pub fn with_defaults(id: u8) -> Self {
        Self {
            id,
            bandwidth: Bandwidth::parse(&Value::Null, DEFAULT_TC_RATE),
            limits: Vec::new(),
            wred: None,
            queues: Vec::new(),
        }
    }

    fn parse(id: u8, value: &Value) -> Self {
        let mut limits = Vec::new();
        if let Some(n) = value.get_u64(tc_fields::QUEUE_LIMIT) {
            limits.push(QueueLimit::Packets(n));
        }
        if let Some(n) = value.get_u64(tc_fields::QUEUE_LIMIT_BYTES) {
            limits.push(QueueLimit::Bytes(n));
        }
        if let Some(n) = value.get_u64(tc_fields::QUEUE_LIMIT_TIME) {
            limits.push(QueueLimit::Time(n));
        }
        Self {
            id,
            bandwidth: Bandwidth::parse(value, DEFAULT_TC_RATE),
            limits,
            wred: value.get(tc_fields::RANDOM_DETECT).and_then(Wred::parse),
            queues: Vec::new(),
        }
    }

    /// The configured limit, if any.
    pub fn explicit_limit(&self) -> Option<QueueLimit> {
        self.limits.first().copied()
    }

    /// The effective limit on this platform.
    pub fn limit(&self, ctx: &QosContext) -> QueueLimit {
        self.explicit_limit()
            .unwrap_or_else(|| QueueLimit::default_for(ctx.limits))
    }

    pub fn check(&self, path: &str) -> Result<(), CheckFailure> {
        if self.limits.len() > 1 {
            return Err(CheckFailure::new(
                format!(
                    "Traffic-class {} may only set one of queue-limit-packets, \
                     queue-limit-bytes or queue-limit-time",
                    self.id
                ),
                path,
            ));
        }
        if let Some(wred) = &self.wred {
            let limit = self
                .explicit_limit()
                .unwrap_or(QueueLimit::Packets(DEFAULT_QUEUE_LIMIT_PACKETS));
            wred.check(&format!("{}/random-detect", path), Some(limit.value()))?;
        }
        Ok(())
    }
}

/// Exactly four traffic classes, ids 0..3.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficClassBlock {
    classes: Vec<TrafficClass>,
}

impl Default for TrafficClassBlock {
    fn default() -> Self {
        Self {
            classes: (0..NUM_TRAFFIC_CLASSES as u8)
                .map(TrafficClass::with_defaults)
                .collect(),
        }
    }
}

impl TrafficClassBlock {
    /// Parses a `traffic-class` list. Unconfigured classes keep defaults.
    pub fn parse(list: &[Value]) -> CfgMgrResult<Self> {
        let mut block = Self::default();
        for entry in list {
            let id = entry.require_u64(shaper_fields::ID, "traffic-class")?;
            if id as usize >= NUM_TRAFFIC_CLASSES {
                return Err(CfgMgrError::invalid_config(
                    "traffic-class",
                    format!("id {} out of range 0..3", id),
                ));
            }
            block.classes[id as usize] = TrafficClass::parse(id as u8, entry);
        }
        Ok(block)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrafficClass> {
        self.classes.iter()
    }

    /// Gets a class by id.
    pub fn get(&self, tc: u64) -> Option<&TrafficClass> {
        self.classes.get(tc as usize)
    }

    pub(crate) fn get_mut(&mut self, tc: u64) -> Option<&mut TrafficClass> {
        self.classes.get_mut(tc as usize)
    }

    /// Checks every class. Paths are `<path>/traffic-class/<id>`.
    pub fn check(&self, path: &str) -> Result<(), CheckFailure> {
        for tc in &self.classes {
            tc.check(&format!("{}/traffic-class/{}", path, tc.id))?;
        }
        Ok(())
    }

    /// Subport level commands: one `queue` and one `param` line per class.
    pub fn subport_commands(
        &self,
        ctx: &QosContext,
        ifname: &str,
        subport: u32,
        parent: u64,
    ) -> Vec<Command> {
        let mut cmds = Vec::with_capacity(2 * NUM_TRAFFIC_CLASSES);
        for tc in &self.classes {
            cmds.push(Command::set(
                format!("qos/{}/subport/{}/queue/{}", ifname, subport, tc.id),
                format!(
                    "qos {} subport {} queue {}{}",
                    ifname,
                    subport,
                    tc.id,
                    tc.bandwidth.commands(Some(parent))
                ),
                ifname,
            ));
            let wred = tc.wred.as_ref().map(Wred::commands).unwrap_or_default();
            cmds.push(Command::set(
                format!("qos/{}/param/subport/{}/{}", ifname, subport, tc.id),
                format!(
                    "qos {} param subport {} {} {}{}",
                    ifname,
                    subport,
                    tc.id,
                    tc.limit(ctx).token(),
                    wred
                ),
                ifname,
            ));
        }
        cmds
    }

    /// Profile level commands: one `queue` line per class.
    pub fn profile_commands(&self, ifname: &str, profile: usize, parent: u64) -> Vec<Command> {
        self.classes
            .iter()
            .map(|tc| {
                Command::set(
                    format!("qos/{}/profile/{}/queue/{}", ifname, profile, tc.id),
                    format!(
                        "qos {} profile {} queue {}{}",
                        ifname,
                        profile,
                        tc.id,
                        tc.bandwidth.commands(Some(parent))
                    ),
                    ifname,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn texts(cmds: &[Command]) -> Vec<&str> {
        cmds.iter().map(|c| c.command.as_str()).collect()
    }

    #[test]
    fn test_defaults_fill_all_classes() {
        let block = TrafficClassBlock::parse(&[json!({"id": 2, "bandwidth": "50%"})]).unwrap();
        assert_eq!(block.iter().count(), 4);
        let ctx = QosContext::default();
        let cmds = block.subport_commands(&ctx, "lo", 0, 1000);
        assert_eq!(
            texts(&cmds),
            vec![
                "qos lo subport 0 queue 0 rate 1000 size 16000",
                "qos lo param subport 0 0 limit packets 64",
                "qos lo subport 0 queue 1 rate 1000 size 16000",
                "qos lo param subport 0 1 limit packets 64",
                "qos lo subport 0 queue 2 rate 500 size 16000",
                "qos lo param subport 0 2 limit packets 64",
                "qos lo subport 0 queue 3 rate 1000 size 16000",
                "qos lo param subport 0 3 limit packets 64",
            ]
        );
    }

    #[test]
    fn test_byte_limit_platform_default() {
        let block = TrafficClassBlock::default();
        let ctx = QosContext::new(LimitCapability::Bytes);
        let cmds = block.subport_commands(&ctx, "lo", 1, 1000);
        assert_eq!(cmds[1].command, "qos lo param subport 1 0 limit bytes 96000");
    }

    #[test]
    fn test_explicit_limit_and_wred() {
        let block = TrafficClassBlock::parse(&[json!({
            "id": 0,
            "queue-limit-time": 10,
            "random-detect": {"min-threshold": 2, "max-threshold": 8}
        })])
        .unwrap();
        let cmds = block.subport_commands(&QosContext::default(), "dp0s1", 0, 100);
        assert_eq!(
            cmds[1].command,
            "qos dp0s1 param subport 0 0 limit msec 10 red 0 2 8 10 wred_weight 10"
        );
        assert!(block.check("p").is_ok());
    }

    #[test]
    fn test_two_limits_fail_check() {
        let block = TrafficClassBlock::parse(&[json!({
            "id": 1, "queue-limit": 64, "queue-limit-bytes": 1000
        })])
        .unwrap();
        let err = block.check("policy/qos/name/p1/shaper").unwrap_err();
        assert!(err
            .message
            .contains("queue-limit-packets, queue-limit-bytes or queue-limit-time"));
        assert_eq!(err.path, "policy/qos/name/p1/shaper/traffic-class/1");
    }

    #[test]
    fn test_wred_above_limit_fails_check() {
        let block = TrafficClassBlock::parse(&[json!({
            "id": 3,
            "queue-limit": 32,
            "random-detect": {"min-threshold": 8, "max-threshold": 32}
        })])
        .unwrap();
        assert!(block.check("p").is_err());
    }

    #[test]
    fn test_out_of_range_class_aborts_parse() {
        assert!(TrafficClassBlock::parse(&[json!({"id": 4})]).is_err());
        assert!(TrafficClassBlock::parse(&[json!({"bandwidth": "1%"})]).is_err());
    }

    #[test]
    fn test_profile_commands() {
        let block = TrafficClassBlock::default();
        let cmds = block.profile_commands("lo", 2, 125_000_000);
        assert_eq!(cmds.len(), 4);
        assert_eq!(
            cmds[3].command,
            "qos lo profile 2 queue 3 rate 125000000 size 16000"
        );
        assert_eq!(cmds[3].path, "qos/lo/profile/2/queue/3");
    }
}
