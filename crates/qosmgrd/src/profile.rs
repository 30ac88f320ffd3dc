//! Shaping profiles.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure, Command};

use crate::bandwidth::Bandwidth;
use crate::pipe_queue::PipeQueueSet;
use crate::platform::QosContext;
use crate::profile_map::ProfileMap;
use crate::tables::shaper_fields;
use crate::traffic_class::TrafficClassBlock;
use crate::value_ext::ValueExt;

/// Token bucket period of a profile in milliseconds.
pub const DEFAULT_PROFILE_PERIOD: u64 = 10;

/// Profile rate when none is configured.
pub const DEFAULT_PROFILE_RATE: &str = "100%";

/// Where a profile is defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileScope {
    /// Defined inside a policy's shaper, copied per policy.
    Local,
    /// Defined at the qos level and shared by name.
    Global,
}

/// A shaping template bound to pipes.
///
/// The numeric profile id is not part of the profile. It is assigned by the
/// owning interface's profile index.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub scope: ProfileScope,
    pub bandwidth: Bandwidth,
    pub period: u64,
    pub tcs: TrafficClassBlock,
    pub queues: PipeQueueSet,
    pub map: Option<ProfileMap>,
}

impl Profile {
    pub fn parse(value: &Value, scope: ProfileScope) -> CfgMgrResult<Self> {
        let name = value.require_text(shaper_fields::ID, "profile")?;
        let mut tcs = TrafficClassBlock::parse(value.get_list(shaper_fields::TRAFFIC_CLASS))?;
        let queues = PipeQueueSet::build(value.get_list(shaper_fields::QUEUE), &mut tcs)?;
        let map = match value.get(shaper_fields::MAP) {
            Some(map) => ProfileMap::parse(map)?,
            None => None,
        };

        Ok(Self {
            name,
            scope,
            bandwidth: Bandwidth::parse(value, DEFAULT_PROFILE_RATE),
            period: value
                .get_u64(shaper_fields::PERIOD)
                .unwrap_or(DEFAULT_PROFILE_PERIOD),
            tcs,
            queues,
            map,
        })
    }

    /// A full-rate profile with no queue or map configuration.
    pub fn builtin(name: &str, scope: ProfileScope) -> Self {
        Self {
            name: name.to_string(),
            scope,
            bandwidth: Bandwidth::parse(&Value::Null, DEFAULT_PROFILE_RATE),
            period: DEFAULT_PROFILE_PERIOD,
            tcs: TrafficClassBlock::default(),
            queues: PipeQueueSet::default(),
            map: None,
        }
    }

    /// Commands defining the profile under `id`. `parent` is the rate that
    /// percentages resolve against.
    pub fn commands(&self, ctx: &QosContext, ifname: &str, id: usize, parent: u64) -> Vec<Command> {
        let rate = self.bandwidth.bytes_per_sec(Some(parent));
        let mut cmds = vec![Command::set(
            format!("qos/{}/profile/{}", ifname, id),
            format!(
                "qos {} profile {}{} period {}",
                ifname,
                id,
                self.bandwidth.commands(Some(parent)),
                self.period
            ),
            ifname,
        )];
        cmds.extend(self.tcs.profile_commands(ifname, id, rate));
        cmds.extend(self.queues.commands(ctx, ifname, id, &self.tcs));
        if let Some(map) = &self.map {
            cmds.extend(map.commands(ifname, id, &self.queues));
        }
        cmds
    }

    pub fn check(&self, path: &str) -> Result<(), CheckFailure> {
        self.tcs.check(path)?;
        self.queues.check(path, &self.tcs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_minimal_profile_commands() {
        let profile = Profile::parse(
            &json!({"id": "profile-1", "bandwidth": "1Gbit"}),
            ProfileScope::Local,
        )
        .unwrap();
        let cmds = profile.commands(&QosContext::default(), "lo", 0, 1_250_000_000);
        let texts: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "qos lo profile 0 rate 125000000 size 16000 period 10",
                "qos lo profile 0 queue 0 rate 125000000 size 16000",
                "qos lo profile 0 queue 1 rate 125000000 size 16000",
                "qos lo profile 0 queue 2 rate 125000000 size 16000",
                "qos lo profile 0 queue 3 rate 125000000 size 16000",
            ]
        );
    }

    #[test]
    fn test_full_profile_commands() {
        let profile = Profile::parse(
            &json!({
                "id": "gold",
                "bandwidth": "50%",
                "period": 20,
                "traffic-class": [{"id": 1, "bandwidth": "10%"}],
                "queue": [{"id": 1, "traffic-class": 1, "weight": 5}],
                "map": {"pcp": [{"id": 5, "to": 1}]}
            }),
            ProfileScope::Global,
        )
        .unwrap();
        assert_eq!(profile.scope, ProfileScope::Global);
        let cmds = profile.commands(&QosContext::default(), "dp0s1", 2, 2000);
        let texts: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "qos dp0s1 profile 2 rate 1000 size 16000 period 20",
                "qos dp0s1 profile 2 queue 0 rate 1000 size 16000",
                "qos dp0s1 profile 2 queue 1 rate 100 size 16000",
                "qos dp0s1 profile 2 queue 2 rate 1000 size 16000",
                "qos dp0s1 profile 2 queue 3 rate 1000 size 16000",
                "qos dp0s1 profile 2 queue 0x1 wrr-weight 5",
                "qos dp0s1 profile 2 pcp 5 0x1",
            ]
        );
    }

    #[test]
    fn test_profile_requires_id() {
        assert!(Profile::parse(&json!({"bandwidth": "1Gbit"}), ProfileScope::Local).is_err());
    }

    #[test]
    fn test_check_propagates_queue_failures() {
        let profile = Profile::parse(
            &json!({"id": "p", "queue": [{"id": 1, "traffic-class": 0, "weight": 200}]}),
            ProfileScope::Local,
        )
        .unwrap();
        let err = profile.check("policy/qos/name/a/shaper/profile/p").unwrap_err();
        assert_eq!(err.path, "policy/qos/name/a/shaper/profile/p/queue/1");
    }
}
