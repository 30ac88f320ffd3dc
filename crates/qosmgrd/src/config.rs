//! Parsed QoS configuration snapshot.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure};
use tracing::{debug, warn};

use crate::action_group::ActionGroup;
use crate::bond::BondMembership;
use crate::egress_map::EgressMap;
use crate::global_object::{Binding, DscpGroups, GlobalObject};
use crate::ingress_map::IngressMap;
use crate::interface::{Interface, InterfaceKind, Subport};
use crate::mark_map::MarkMap;
use crate::platform::PlatformParams;
use crate::policy::Policy;
use crate::profile::{Profile, ProfileScope};
use crate::shaper::Shaper;
use crate::tables::*;
use crate::units::dscp_range;
use crate::value_ext::ValueExt;

/// One immutable configuration snapshot.
///
/// Every object is owned here, keyed by name. Cross references between
/// objects are names, resolved through the snapshot.
#[derive(Debug, Clone)]
pub struct QosConfig {
    policies: BTreeMap<String, Policy>,
    global_profiles: BTreeMap<String, Profile>,
    /// Global profile names in configuration order.
    global_profile_order: Vec<String>,
    mark_maps: BTreeMap<String, MarkMap>,
    ingress_maps: BTreeMap<String, IngressMap>,
    egress_maps: BTreeMap<String, EgressMap>,
    action_groups: BTreeMap<String, ActionGroup>,
    platform: PlatformParams,
    interfaces: BTreeMap<String, Interface>,
    interface_order: Vec<String>,
    default_trunk: Shaper,
}

fn parse_named<T>(
    list: &[Value],
    parse: impl Fn(&Value) -> CfgMgrResult<T>,
    name: impl Fn(&T) -> &str,
) -> CfgMgrResult<BTreeMap<String, T>> {
    let mut out = BTreeMap::new();
    for entry in list {
        let item = parse(entry)?;
        out.insert(name(&item).to_string(), item);
    }
    Ok(out)
}

fn parse_dscp_groups(tree: &Value) -> DscpGroups {
    let list = tree
        .get(RESOURCES)
        .and_then(|r| r.get(RESOURCE_GROUP))
        .map(|g| g.get_list(DSCP_GROUP))
        .unwrap_or(&[]);

    let mut groups = DscpGroups::new();
    for entry in list {
        let Some(name) = entry.get_text(map_fields::GROUP_NAME) else {
            warn!("DSCP group without a name ignored");
            continue;
        };
        let mut values: Vec<u8> = entry
            .get_list(map_fields::DSCP)
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => dscp_range(s),
                Value::Number(n) => dscp_range(&n.to_string()),
                _ => None,
            })
            .flatten()
            .collect();
        values.sort_unstable();
        values.dedup();
        groups.insert(name, values);
    }
    groups
}

impl QosConfig {
    /// Parses a full configuration tree. LAGs are kept as LAG interfaces.
    pub fn new(tree: &Value) -> CfgMgrResult<Self> {
        Self::parse(tree, None)
    }

    /// Parses a full configuration tree, fanning every LAG out to its
    /// member ports. A member's own port configuration is ignored while the
    /// LAG provides one.
    pub fn with_bond_members(tree: &Value, membership: &BondMembership) -> CfgMgrResult<Self> {
        Self::parse(tree, Some(membership))
    }

    /// A snapshot with nothing configured.
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
            global_profiles: BTreeMap::new(),
            global_profile_order: Vec::new(),
            mark_maps: BTreeMap::new(),
            ingress_maps: BTreeMap::new(),
            egress_maps: BTreeMap::new(),
            action_groups: BTreeMap::new(),
            platform: PlatformParams::default(),
            interfaces: BTreeMap::new(),
            interface_order: Vec::new(),
            default_trunk: Shaper::builtin_trunk(),
        }
    }

    fn parse(tree: &Value, membership: Option<&BondMembership>) -> CfgMgrResult<Self> {
        let groups = parse_dscp_groups(tree);
        let mut cfg = Self::empty();

        let policy = tree.get(POLICY);
        if let Some(qos) = policy.and_then(|p| p.get(QOS)) {
            cfg.policies = parse_named(qos.get_list(qos_fields::NAME), Policy::parse, |p| &p.name)?;
            for entry in qos.get_list(qos_fields::PROFILE) {
                let profile = Profile::parse(entry, ProfileScope::Global)?;
                if !cfg.global_profiles.contains_key(&profile.name) {
                    cfg.global_profile_order.push(profile.name.clone());
                }
                cfg.global_profiles.insert(profile.name.clone(), profile);
            }
            cfg.mark_maps = parse_named(
                qos.get_list(qos_fields::MARK_MAP),
                |v| MarkMap::parse(v, &groups),
                |m| &m.name,
            )?;
            cfg.ingress_maps = parse_named(
                qos.get_list(qos_fields::INGRESS_MAP),
                |v| IngressMap::parse(v, &groups),
                |m| &m.name,
            )?;
            cfg.egress_maps = parse_named(
                qos.get_list(qos_fields::EGRESS_MAP),
                |v| EgressMap::parse(v, &groups),
                |m| &m.name,
            )?;
            cfg.platform = PlatformParams::parse(qos);
        }
        if let Some(action) = policy.and_then(|p| p.get(ACTION)) {
            cfg.action_groups =
                parse_named(action.get_list(qos_fields::NAME), ActionGroup::parse, |a| &a.name)?;
        }

        let interfaces = tree.get(INTERFACES);
        let bonding = interfaces.map(|i| i.get_list(BONDING)).unwrap_or(&[]);
        let dataplane = interfaces.map(|i| i.get_list(DATAPLANE)).unwrap_or(&[]);

        for lag in bonding {
            match membership {
                Some(membership) => {
                    let group = lag.require_text(interface_fields::TAGNODE, "bonding")?;
                    for member in membership.get_members(&group) {
                        if let Some(iface) = Interface::bond_member(&member.tagnode, Some(lag))? {
                            cfg.add_interface(iface);
                        }
                    }
                }
                None => {
                    if let Some(iface) = Interface::parse(lag, InterfaceKind::Bonding)? {
                        cfg.add_interface(iface);
                    }
                }
            }
        }

        for port in dataplane {
            let Some(iface) = Interface::parse(port, InterfaceKind::Dataplane)? else {
                continue;
            };
            if cfg.interfaces.contains_key(&iface.name) {
                debug!(ifname = %iface.name, "Port configuration overridden by its LAG");
                continue;
            }
            cfg.add_interface(iface);
        }

        cfg.link();
        Ok(cfg)
    }

    fn add_interface(&mut self, iface: Interface) {
        if !self.interfaces.contains_key(&iface.name) {
            self.interface_order.push(iface.name.clone());
        }
        self.interfaces.insert(iface.name.clone(), iface);
    }

    /// Fills back references and bindings, then allocates profile ids.
    fn link(&mut self) {
        let mut mark_bindings = Vec::new();
        let mut action_bindings = Vec::new();
        let mut ingress_bindings = Vec::new();
        let mut egress_bindings = Vec::new();

        let ordered = self
            .interface_order
            .iter()
            .filter_map(|name| self.interfaces.get(name));
        for iface in ordered {
            for subport in &iface.subports {
                if let Some(name) = &subport.policy {
                    match self.policies.get_mut(name) {
                        Some(policy) => policy.add_interface(&iface.name),
                        None => warn!(ifname = %iface.name, policy = %name, "Undefined policy"),
                    }
                }
                let Some(shaper) = subport.shaper(&self.policies, &self.default_trunk) else {
                    continue;
                };
                if let Some(map) = &shaper.mark_map {
                    mark_bindings.push((map.clone(), iface.binding(subport.vlan)));
                }
                for group in shaper.action_groups() {
                    action_bindings.push((group.to_string(), iface.binding(subport.vlan)));
                }
            }
            for b in &iface.ingress_maps {
                ingress_bindings.push((b.map.clone(), iface.binding(b.vlan)));
            }
            for b in &iface.egress_maps {
                egress_bindings.push((b.map.clone(), iface.binding(b.vlan)));
            }
        }

        bind_all(&mut self.mark_maps, mark_bindings);
        bind_all(&mut self.action_groups, action_bindings);
        bind_all(&mut self.ingress_maps, ingress_bindings);
        bind_all(&mut self.egress_maps, egress_bindings);

        for iface in self.interfaces.values_mut() {
            iface.build_profile_index(
                &self.policies,
                &self.global_profiles,
                &self.global_profile_order,
                &self.default_trunk,
            );
        }
    }

    /// Cross-object validation. The first failure aborts the commit.
    pub fn check(&self) -> Result<(), CheckFailure> {
        for policy in self.policies.values() {
            policy.check(&self.global_profiles)?;
        }
        for profile in self.global_profiles.values() {
            profile.check(&format!("{}/{}", GLOBAL_PROFILE_PATH, profile.name))?;
        }
        for group in self.action_groups.values() {
            group.check()?;
        }
        for iface in self.interfaces.values() {
            for name in iface.policies() {
                if !self.policies.contains_key(name) {
                    return Err(CheckFailure::new(
                        format!("Policy {} is not defined", name),
                        format!("interfaces/{}/policy/qos", iface.name),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Keeps only the listed interfaces.
    pub fn retain_interfaces(&mut self, names: &BTreeSet<String>) {
        for name in self.interface_order.iter().filter(|n| !names.contains(*n)) {
            for policy in self.policies.values_mut() {
                policy.delete_interface(name);
            }
        }
        self.interfaces.retain(|name, _| names.contains(name));
        self.interface_order.retain(|name| names.contains(name));
    }

    /// Replaces every shared object with the ones of `other`.
    pub fn share_objects_from(&mut self, other: &QosConfig) {
        self.policies = other.policies.clone();
        self.global_profiles = other.global_profiles.clone();
        self.global_profile_order = other.global_profile_order.clone();
        self.mark_maps = other.mark_maps.clone();
        self.ingress_maps = other.ingress_maps.clone();
        self.egress_maps = other.egress_maps.clone();
        self.action_groups = other.action_groups.clone();
        self.platform = other.platform.clone();
    }

    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn policies(&self) -> &BTreeMap<String, Policy> {
        &self.policies
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    pub fn interfaces(&self) -> &BTreeMap<String, Interface> {
        &self.interfaces
    }

    /// Interfaces in configuration order, LAGs first.
    pub fn interfaces_in_order(&self) -> impl Iterator<Item = &Interface> {
        self.interface_order
            .iter()
            .filter_map(|name| self.interfaces.get(name))
    }

    pub fn global_profiles(&self) -> &BTreeMap<String, Profile> {
        &self.global_profiles
    }

    pub fn mark_maps(&self) -> &BTreeMap<String, MarkMap> {
        &self.mark_maps
    }

    pub fn ingress_maps(&self) -> &BTreeMap<String, IngressMap> {
        &self.ingress_maps
    }

    pub fn egress_maps(&self) -> &BTreeMap<String, EgressMap> {
        &self.egress_maps
    }

    pub fn action_groups(&self) -> &BTreeMap<String, ActionGroup> {
        &self.action_groups
    }

    pub fn platform(&self) -> &PlatformParams {
        &self.platform
    }

    /// The shaper driving a subport.
    pub fn shaper_for(&self, subport: &Subport) -> Option<&Shaper> {
        subport.shaper(&self.policies, &self.default_trunk)
    }
}

fn bind_all<T: GlobalObject>(objects: &mut BTreeMap<String, T>, bindings: Vec<(String, Binding)>) {
    for (name, binding) in bindings {
        match objects.get_mut(&name) {
            Some(object) => object.add_binding(binding),
            None => warn!(kind = T::KIND, name = %name, ifname = %binding.ifname, "Binding to undefined object"),
        }
    }
}
