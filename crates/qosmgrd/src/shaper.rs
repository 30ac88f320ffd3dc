//! Subport shaper and per-interface profile id allocation.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure, Command};
use tracing::warn;

use crate::bandwidth::Bandwidth;
use crate::class::Class;
use crate::platform::QosContext;
use crate::policer::DEFAULT_FRAME_OVERHEAD;
use crate::profile::{Profile, ProfileScope};
use crate::tables::shaper_fields;
use crate::traffic_class::TrafficClassBlock;
use crate::value_ext::ValueExt;

/// Token bucket period of a subport in milliseconds.
pub const DEFAULT_SHAPER_PERIOD: u64 = 40;

/// Subport rate when none is configured.
pub const DEFAULT_SHAPER_RATE: &str = "10Gbit";

/// Name of the profile used by a synthesized trunk shaper.
pub const BUILTIN_PROFILE: &str = "default";

/// Dense profile ids of one interface.
///
/// Keys are `"<vlan> <name>"` for profiles as seen from a subport and
/// `"global <name>"` for global profiles. A local name that collides with a
/// global profile shares the global id.
#[derive(Debug, Clone, Default)]
pub struct ProfileIndex {
    ids: HashMap<String, usize>,
    global_ids: BTreeSet<usize>,
    next: usize,
}

impl ProfileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn local_key(vlan: u16, name: &str) -> String {
        format!("{} {}", vlan, name)
    }

    fn global_key(name: &str) -> String {
        format!("global {}", name)
    }

    /// Assigns the next id to a global profile unless it already has one.
    pub fn insert_global(&mut self, name: &str) -> usize {
        if let Some(&id) = self.ids.get(&Self::global_key(name)) {
            return id;
        }
        let id = self.next;
        self.next += 1;
        self.ids.insert(Self::global_key(name), id);
        self.global_ids.insert(id);
        id
    }

    /// Assigns an id to a subport-local profile name, aliasing a global
    /// profile of the same name when one is indexed.
    pub fn insert_local(&mut self, vlan: u16, name: &str) -> usize {
        let key = Self::local_key(vlan, name);
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = match self.ids.get(&Self::global_key(name)) {
            Some(&id) => id,
            None => {
                let id = self.next;
                self.next += 1;
                id
            }
        };
        self.ids.insert(key, id);
        id
    }

    /// Looks up `"<vlan> <name>"` or `"global <name>"`.
    pub fn get(&self, key: &str) -> Option<usize> {
        self.ids.get(key).copied()
    }

    /// Looks up a profile name as seen from the subport on `vlan`.
    pub fn resolve(&self, vlan: u16, name: &str) -> Option<usize> {
        self.get(&Self::local_key(vlan, name))
    }

    /// Returns true if `id` belongs to a global profile.
    pub fn is_global(&self, id: usize) -> bool {
        self.global_ids.contains(&id)
    }

    /// Global profile names with their ids, in id order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        let mut globals: Vec<_> = self
            .ids
            .iter()
            .filter_map(|(key, &id)| key.strip_prefix("global ").map(|name| (name, id)))
            .collect();
        globals.sort_by_key(|&(_, id)| id);
        globals.into_iter()
    }

    /// Number of distinct profile ids.
    pub fn count(&self) -> usize {
        self.next
    }
}

/// Root shaping descriptor of one subport.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaper {
    pub bandwidth: Bandwidth,
    pub period: u64,
    pub frame_overhead: u64,
    pub tcs: TrafficClassBlock,
    /// Local profiles in configuration order.
    pub profiles: Vec<Profile>,
    pub default_profile: String,
    pub classes: Vec<Class>,
    pub mark_map: Option<String>,
}

impl Shaper {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        let profiles = value
            .get_list(shaper_fields::PROFILE)
            .iter()
            .map(|p| Profile::parse(p, ProfileScope::Local))
            .collect::<CfgMgrResult<Vec<_>>>()?;
        let mut classes = value
            .get_list(shaper_fields::CLASS)
            .iter()
            .map(Class::parse)
            .collect::<CfgMgrResult<Vec<_>>>()?;
        classes.sort_by_key(|c| c.id);

        Ok(Self {
            bandwidth: Bandwidth::parse(value, DEFAULT_SHAPER_RATE),
            period: value
                .get_u64(shaper_fields::PERIOD)
                .unwrap_or(DEFAULT_SHAPER_PERIOD),
            frame_overhead: value
                .get_u64(shaper_fields::FRAME_OVERHEAD)
                .unwrap_or(DEFAULT_FRAME_OVERHEAD),
            tcs: TrafficClassBlock::parse(value.get_list(shaper_fields::TRAFFIC_CLASS))?,
            profiles,
            default_profile: value.get_text(shaper_fields::DEFAULT).unwrap_or_default(),
            classes,
            mark_map: value.get_text(shaper_fields::MARK_MAP),
        })
    }

    /// Trunk shaper used when only VLANs carry a policy.
    pub fn builtin_trunk() -> Self {
        Self {
            bandwidth: Bandwidth::parse(&Value::Null, DEFAULT_SHAPER_RATE),
            period: DEFAULT_SHAPER_PERIOD,
            frame_overhead: DEFAULT_FRAME_OVERHEAD,
            tcs: TrafficClassBlock::default(),
            profiles: vec![Profile::builtin(BUILTIN_PROFILE, ProfileScope::Local)],
            default_profile: BUILTIN_PROFILE.to_string(),
            classes: Vec::new(),
            mark_map: None,
        }
    }

    /// Number of pipes, one more than the highest class id.
    pub fn max_pipes(&self) -> u64 {
        self.classes.iter().map(|c| c.id + 1).max().unwrap_or(1).max(1)
    }

    /// Finds a local profile by name.
    pub fn local_profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Every profile name the shaper binds to a pipe.
    pub fn referenced_profiles(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.default_profile.as_str())
            .chain(self.classes.iter().map(|c| c.profile.as_str()))
            .filter(|name| !name.is_empty())
    }

    /// Global profiles this shaper uses, either directly or through a local
    /// profile of the same name.
    pub fn referenced_globals<'a>(
        &'a self,
        globals: &'a BTreeMap<String, Profile>,
    ) -> BTreeSet<&'a str> {
        self.referenced_profiles()
            .chain(self.profiles.iter().map(|p| p.name.as_str()))
            .filter(|name| globals.contains_key(*name))
            .collect()
    }

    /// Action groups used by any class rule.
    pub fn action_groups(&self) -> BTreeSet<&str> {
        self.classes.iter().flat_map(|c| c.action_groups()).collect()
    }

    /// Adds this shaper's profiles to an interface's index.
    ///
    /// Global profiles must already be indexed. Local profiles get the next
    /// free ids in configuration order; names only found globally are
    /// aliased so every pipe resolves through `"<vlan> <name>"`.
    pub fn build_profile_index(
        &self,
        index: &mut ProfileIndex,
        vlan: u16,
        globals: &BTreeMap<String, Profile>,
    ) {
        for profile in &self.profiles {
            index.insert_local(vlan, &profile.name);
        }
        for name in self.referenced_profiles() {
            if self.local_profile(name).is_none() && globals.contains_key(name) {
                index.insert_local(vlan, name);
            }
        }
    }

    /// Subport commands, without the port line and without `enable`.
    pub fn commands(
        &self,
        ctx: &QosContext,
        ifname: &str,
        subport: u32,
        vlan: u16,
        index: &ProfileIndex,
        parent: Option<u64>,
    ) -> Vec<Command> {
        let rate = self.bandwidth.bytes_per_sec(parent);
        let mut cmds = vec![Command::set(
            format!("qos/{}/subport/{}", ifname, subport),
            format!(
                "qos {} subport {}{} period {}",
                ifname,
                subport,
                self.bandwidth.commands(parent),
                self.period
            ),
            ifname,
        )];

        cmds.extend(self.tcs.subport_commands(ctx, ifname, subport, rate));

        cmds.push(Command::set(
            format!("qos/{}/vlan/{}", ifname, vlan),
            format!("qos {} vlan {} {}", ifname, vlan, subport),
            ifname,
        ));

        if let Some(map) = &self.mark_map {
            cmds.push(Command::set(
                format!("qos/{}/subport/{}/mark-map", ifname, subport),
                format!("qos {} subport {} mark-map {}", ifname, subport, map),
                ifname,
            ));
        }

        for profile in &self.profiles {
            match index.resolve(vlan, &profile.name) {
                Some(id) if !index.is_global(id) => {
                    cmds.extend(profile.commands(ctx, ifname, id, rate));
                }
                Some(_) => {}
                None => warn!(ifname, profile = %profile.name, "Local profile missing from index"),
            }
        }

        let pipes = std::iter::once((0, self.default_profile.as_str()))
            .chain(self.classes.iter().map(|c| (c.id, c.profile.as_str())));
        for (pipe, name) in pipes {
            let Some(id) = index.resolve(vlan, name) else {
                warn!(ifname, pipe, profile = name, "Skipping pipe with unknown profile");
                continue;
            };
            cmds.push(Command::set(
                format!("qos/{}/pipe/{}/{}", ifname, subport, pipe),
                format!("qos {} pipe {} {} {}", ifname, subport, pipe, id),
                ifname,
            ));
        }

        for class in &self.classes {
            cmds.extend(class.commands(ifname, subport));
        }
        cmds
    }

    pub fn check(&self, path: &str, globals: &BTreeMap<String, Profile>) -> Result<(), CheckFailure> {
        let resolves = |name: &str| self.local_profile(name).is_some() || globals.contains_key(name);

        if self.default_profile.is_empty() {
            return Err(CheckFailure::new("Default profile must be configured", path));
        }
        if !resolves(&self.default_profile) {
            return Err(CheckFailure::new(
                format!("Default profile {} is not defined", self.default_profile),
                format!("{}/default", path),
            ));
        }

        self.tcs.check(path)?;
        for profile in &self.profiles {
            profile.check(&format!("{}/profile/{}", path, profile.name))?;
        }

        for class in &self.classes {
            let cpath = format!("{}/class/{}", path, class.id);
            class.check(&cpath)?;
            if !resolves(&class.profile) {
                return Err(CheckFailure::new(
                    format!("Class {} profile {} is not defined", class.id, class.profile),
                    cpath,
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn globals(names: &[&str]) -> BTreeMap<String, Profile> {
        names
            .iter()
            .map(|n| {
                let p = Profile::parse(&json!({"id": n}), ProfileScope::Global).unwrap();
                (n.to_string(), p)
            })
            .collect()
    }

    #[test]
    fn test_profile_index_aliasing() {
        let globals = globals(&["shared"]);
        let shaper = Shaper::parse(&json!({
            "default": "p1",
            "profile": [{"id": "p1"}, {"id": "shared"}, {"id": "p2"}],
            "class": [{"id": 1, "profile": "shared"}]
        }))
        .unwrap();

        let mut index = ProfileIndex::new();
        index.insert_global("shared");
        shaper.build_profile_index(&mut index, 0, &globals);

        assert_eq!(index.get("global shared"), Some(0));
        assert_eq!(index.get("0 shared"), Some(0));
        assert_eq!(index.get("0 p1"), Some(1));
        assert_eq!(index.get("0 p2"), Some(2));
        assert_eq!(index.count(), 3);
        assert!(index.is_global(0));
        assert!(!index.is_global(1));
    }

    #[test]
    fn test_max_pipes() {
        let shaper = Shaper::parse(&json!({"default": "p"})).unwrap();
        assert_eq!(shaper.max_pipes(), 1);
        let shaper = Shaper::parse(&json!({
            "default": "p",
            "class": [{"id": 5, "profile": "p"}, {"id": 2, "profile": "p"}]
        }))
        .unwrap();
        assert_eq!(shaper.max_pipes(), 6);
        assert_eq!(shaper.classes[0].id, 2);
    }

    #[test]
    fn test_commands_sequence() {
        let shaper = Shaper::parse(&json!({
            "bandwidth": "10Gbit",
            "default": "profile-1",
            "frame-overhead": 24,
            "profile": [{"id": "profile-1", "bandwidth": "1Gbit"}]
        }))
        .unwrap();
        let mut index = ProfileIndex::new();
        shaper.build_profile_index(&mut index, 0, &BTreeMap::new());
        let cmds = shaper.commands(&QosContext::default(), "lo", 0, 0, &index, None);
        let texts: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "qos lo subport 0 rate 1250000000 size 16000 period 40",
                "qos lo subport 0 queue 0 rate 1250000000 size 16000",
                "qos lo param subport 0 0 limit packets 64",
                "qos lo subport 0 queue 1 rate 1250000000 size 16000",
                "qos lo param subport 0 1 limit packets 64",
                "qos lo subport 0 queue 2 rate 1250000000 size 16000",
                "qos lo param subport 0 2 limit packets 64",
                "qos lo subport 0 queue 3 rate 1250000000 size 16000",
                "qos lo param subport 0 3 limit packets 64",
                "qos lo vlan 0 0",
                "qos lo profile 0 rate 125000000 size 16000 period 10",
                "qos lo profile 0 queue 0 rate 125000000 size 16000",
                "qos lo profile 0 queue 1 rate 125000000 size 16000",
                "qos lo profile 0 queue 2 rate 125000000 size 16000",
                "qos lo profile 0 queue 3 rate 125000000 size 16000",
                "qos lo pipe 0 0 0",
            ]
        );
    }

    #[test]
    fn test_classes_mark_map_and_global_profile() {
        let globals = globals(&["gold"]);
        let shaper = Shaper::parse(&json!({
            "default": "p1",
            "mark-map": "mm-1",
            "profile": [{"id": "p1"}],
            "class": [{"id": 1, "profile": "gold", "match": [{"id": "m", "pcp": 2}]}]
        }))
        .unwrap();
        let mut index = ProfileIndex::new();
        index.insert_global("gold");
        shaper.build_profile_index(&mut index, 10, &globals);

        let cmds = shaper.commands(&QosContext::default(), "dp0s1", 1, 10, &index, None);
        let texts: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(texts[9], "qos dp0s1 vlan 10 1");
        assert_eq!(texts[10], "qos dp0s1 subport 1 mark-map mm-1");
        assert_eq!(texts[11], "qos dp0s1 profile 1 rate 1250000000 size 16000 period 10");
        let tail = &texts[texts.len() - 3..];
        assert_eq!(
            tail,
            &[
                "qos dp0s1 pipe 1 0 1",
                "qos dp0s1 pipe 1 1 0",
                "qos dp0s1 match 1 1 action=accept pcp=2 handle=tag(1)",
            ]
        );
    }

    #[test]
    fn test_check_unresolved_profiles() {
        let shaper = Shaper::parse(&json!({"profile": [{"id": "p1"}]})).unwrap();
        assert!(shaper.check("s", &BTreeMap::new()).is_err());

        let shaper = Shaper::parse(&json!({"default": "nope"})).unwrap();
        let err = shaper.check("s", &BTreeMap::new()).unwrap_err();
        assert_eq!(err.message, "Default profile nope is not defined");

        let shaper = Shaper::parse(&json!({
            "default": "gold",
            "class": [{"id": 2, "profile": "silver"}]
        }))
        .unwrap();
        let err = shaper.check("s", &globals(&["gold"])).unwrap_err();
        assert_eq!(err.message, "Class 2 profile silver is not defined");
        assert_eq!(err.path, "s/class/2");
    }

    #[test]
    fn test_builtin_trunk() {
        let shaper = Shaper::builtin_trunk();
        assert!(shaper.check("s", &BTreeMap::new()).is_ok());
        assert_eq!(shaper.bandwidth.bytes_per_sec(None), 1_250_000_000);
    }
}
