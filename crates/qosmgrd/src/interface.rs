//! Ports, LAGs and their subports.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrError, CfgMgrResult, Command};
use tracing::warn;

use crate::config::QosConfig;
use crate::global_object::Binding;
use crate::platform::QosContext;
use crate::policy::Policy;
use crate::profile::Profile;
use crate::shaper::{ProfileIndex, Shaper};
use crate::tables::interface_fields;
use crate::value_ext::ValueExt;

/// What kind of port an interface is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterfaceKind {
    Dataplane,
    Bonding,
    /// A physical port carrying the configuration of its LAG.
    BondMember { lag: String },
}

/// A policy attached to the trunk (VLAN 0) or to one VLAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subport {
    /// Dense subport number; 0 is the trunk.
    pub id: u32,
    pub vlan: u16,
    /// Policy name. `None` only for a trunk synthesized because VLANs carry
    /// policies while the trunk does not.
    pub policy: Option<String>,
}

impl Subport {
    /// Resolves the shaper driving this subport.
    pub fn shaper<'a>(
        &self,
        policies: &'a BTreeMap<String, Policy>,
        default_trunk: &'a Shaper,
    ) -> Option<&'a Shaper> {
        match &self.policy {
            Some(name) => policies.get(name).map(|p| &p.shaper),
            None => Some(default_trunk),
        }
    }
}

/// An ingress or egress map bound on a port or VLAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapBinding {
    pub map: String,
    pub vlan: u16,
}

#[derive(Debug, Default)]
struct PortPolicy {
    qos: Option<String>,
    ingress_map: Option<String>,
    egress_map: Option<String>,
}

impl PortPolicy {
    fn parse(value: &Value) -> Self {
        match value.get(interface_fields::POLICY) {
            Some(policy) => Self {
                qos: policy.get_text(interface_fields::QOS),
                ingress_map: policy.get_text(interface_fields::INGRESS_MAP),
                egress_map: policy.get_text(interface_fields::EGRESS_MAP),
            },
            None => Self::default(),
        }
    }

    fn is_empty(&self) -> bool {
        self.qos.is_none() && self.ingress_map.is_none() && self.egress_map.is_none()
    }
}

fn map_bindings(
    trunk: &PortPolicy,
    vlans: &[(u16, PortPolicy)],
    pick: impl Fn(&PortPolicy) -> Option<&String>,
) -> Vec<MapBinding> {
    std::iter::once((0, trunk))
        .chain(vlans.iter().map(|(vlan, p)| (*vlan, p)))
        .filter_map(|(vlan, p)| {
            pick(p).map(|map| MapBinding {
                map: map.clone(),
                vlan,
            })
        })
        .collect()
}

/// QoS state of one port.
///
/// The profile index is derived from the snapshot and does not take part in
/// equality.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub kind: InterfaceKind,
    pub subports: Vec<Subport>,
    pub ingress_maps: Vec<MapBinding>,
    pub egress_maps: Vec<MapBinding>,
    profile_index: ProfileIndex,
}

impl PartialEq for Interface {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.subports == other.subports
            && self.ingress_maps == other.ingress_maps
            && self.egress_maps == other.egress_maps
    }
}

impl Interface {
    /// Parses a dataplane or bonding interface entry.
    ///
    /// Returns `None` when the entry carries no QoS configuration.
    pub fn parse(value: &Value, kind: InterfaceKind) -> CfgMgrResult<Option<Self>> {
        let name = value.require_text(interface_fields::TAGNODE, "interface")?;
        Self::from_subtree(name, kind, value)
    }

    /// Builds a member port of a LAG from the LAG's subtree.
    ///
    /// A bond member cannot exist without its LAG, so a missing subtree is a
    /// caller bug rather than a configuration problem.
    pub fn bond_member(port: &str, lag: Option<&Value>) -> CfgMgrResult<Option<Self>> {
        let lag = lag.ok_or_else(|| {
            CfgMgrError::contract(format!("bond member {} built without its LAG subtree", port))
        })?;
        let lag_name = lag.require_text(interface_fields::TAGNODE, "bonding")?;
        Self::from_subtree(
            port.to_string(),
            InterfaceKind::BondMember { lag: lag_name },
            lag,
        )
    }

    fn from_subtree(name: String, kind: InterfaceKind, value: &Value) -> CfgMgrResult<Option<Self>> {
        let trunk = PortPolicy::parse(value);
        let mut vlans = Vec::new();
        for vif in value.get_list(interface_fields::VIF) {
            let vlan = vif.require_u64(interface_fields::TAGNODE, "vif")?;
            let Ok(vlan) = u16::try_from(vlan) else {
                warn!(ifname = %name, vlan, "VLAN id out of range, ignored");
                continue;
            };
            let policy = PortPolicy::parse(vif);
            if !policy.is_empty() {
                vlans.push((vlan, policy));
            }
        }

        if trunk.is_empty() && vlans.is_empty() {
            return Ok(None);
        }

        let mut subports = Vec::new();
        let vlan_policies = vlans.iter().any(|(_, p)| p.qos.is_some());
        if trunk.qos.is_some() || vlan_policies {
            subports.push(Subport {
                id: 0,
                vlan: 0,
                policy: trunk.qos.clone(),
            });
        }
        for (vlan, policy) in &vlans {
            if let Some(qos) = &policy.qos {
                subports.push(Subport {
                    id: subports.len() as u32,
                    vlan: *vlan,
                    policy: Some(qos.clone()),
                });
            }
        }

        Ok(Some(Self {
            ingress_maps: map_bindings(&trunk, &vlans, |p| p.ingress_map.as_ref()),
            egress_maps: map_bindings(&trunk, &vlans, |p| p.egress_map.as_ref()),
            name,
            kind,
            subports,
            profile_index: ProfileIndex::new(),
        }))
    }

    /// Policy names used by any subport.
    pub fn policies(&self) -> impl Iterator<Item = &str> {
        self.subports.iter().filter_map(|s| s.policy.as_deref())
    }

    /// Looks up `"<vlan> <name>"` or `"global <name>"` in the profile index.
    pub fn profile_index_get(&self, key: &str) -> Option<usize> {
        self.profile_index.get(key)
    }

    pub fn profile_count(&self) -> usize {
        self.profile_index.count()
    }

    /// Allocates profile ids: global profiles used anywhere on the port
    /// first, in configuration order, then every subport's local profiles.
    pub(crate) fn build_profile_index(
        &mut self,
        policies: &BTreeMap<String, Policy>,
        globals: &BTreeMap<String, Profile>,
        global_order: &[String],
        default_trunk: &Shaper,
    ) {
        let mut index = ProfileIndex::new();
        let shapers: Vec<_> = self
            .subports
            .iter()
            .filter_map(|s| s.shaper(policies, default_trunk).map(|sh| (s.vlan, sh)))
            .collect();

        let used: BTreeSet<&str> = shapers
            .iter()
            .flat_map(|(_, sh)| sh.referenced_globals(globals))
            .collect();
        for name in global_order.iter().filter(|n| used.contains(n.as_str())) {
            index.insert_global(name);
        }
        for (vlan, shaper) in &shapers {
            shaper.build_profile_index(&mut index, *vlan, globals);
        }
        self.profile_index = index;
    }

    /// Subports with their shapers, skipping subports whose policy is
    /// undefined.
    fn shapers<'a>(&'a self, cfg: &'a QosConfig) -> Vec<(&'a Subport, &'a Shaper)> {
        self.subports
            .iter()
            .filter_map(|s| match cfg.shaper_for(s) {
                Some(shaper) => Some((s, shaper)),
                None => {
                    warn!(ifname = %self.name, vlan = s.vlan, "Subport policy is not defined");
                    None
                }
            })
            .collect()
    }

    /// Global profiles used by this port, with their ids.
    pub fn global_profiles(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.profile_index.globals()
    }

    /// Full command set that attaches QoS to the port.
    pub fn commands(&self, cfg: &QosConfig, ctx: &QosContext) -> Vec<Command> {
        let mut cmds = Vec::new();
        let shapers = self.shapers(cfg);

        if let Some((_, trunk)) = shapers.first() {
            let pipes = shapers.iter().map(|(_, sh)| sh.max_pipes()).max().unwrap_or(1);
            cmds.push(Command::set(
                format!("qos/{}/port", self.name),
                format!(
                    "qos {} port subports {} pipes {} profiles {} overhead {} {}",
                    self.name,
                    shapers.len(),
                    pipes,
                    self.profile_index.count().max(1),
                    trunk.frame_overhead,
                    ctx.limits.port_token()
                ),
                &self.name,
            ));

            let trunk_rate = trunk.bandwidth.bytes_per_sec(None);
            for (name, id) in self.global_profiles() {
                if let Some(profile) = cfg.global_profiles().get(name) {
                    cmds.extend(profile.commands(ctx, &self.name, id, trunk_rate));
                }
            }

            for (subport, shaper) in &shapers {
                let parent = (subport.id != 0).then_some(trunk_rate);
                cmds.extend(shaper.commands(
                    ctx,
                    &self.name,
                    subport.id,
                    subport.vlan,
                    &self.profile_index,
                    parent,
                ));
            }
        }

        for (kind, maps) in [("ingress-map", &self.ingress_maps), ("egress-map", &self.egress_maps)] {
            for binding in maps {
                cmds.push(Command::set(
                    format!("qos/{}/{}/{}/vlan/{}", self.name, kind, binding.map, binding.vlan),
                    format!(
                        "qos {} {} {} vlan {}",
                        self.name, kind, binding.map, binding.vlan
                    ),
                    &self.name,
                ));
            }
        }

        if !shapers.is_empty() {
            cmds.push(Command::set(
                format!("qos/{}/enable", self.name),
                format!("qos {} enable", self.name),
                &self.name,
            ));
        }
        cmds
    }

    /// Detaches QoS from the port.
    pub fn delete_commands(&self) -> Vec<Command> {
        vec![Command::delete(
            format!("qos/{}", self.name),
            format!("qos {} disable", self.name),
            &self.name,
        )]
    }

    /// Bindings this port contributes to shared objects.
    pub(crate) fn binding(&self, vlan: u16) -> Binding {
        Binding::new(self.name.as_str(), vlan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subports_follow_vif_order() {
        let iface = Interface::parse(
            &json!({
                "tagnode": "dp0s1",
                "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "trunk"},
                "vif": [
                    {"tagnode": 20, "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "v20"}},
                    {"tagnode": 10},
                    {"tagnode": "30", "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "v30"}}
                ]
            }),
            InterfaceKind::Dataplane,
        )
        .unwrap()
        .unwrap();
        let vlans: Vec<_> = iface.subports.iter().map(|s| (s.id, s.vlan)).collect();
        assert_eq!(vlans, vec![(0, 0), (1, 20), (2, 30)]);
        let policies: Vec<_> = iface.policies().collect();
        assert_eq!(policies, vec!["trunk", "v20", "v30"]);
    }

    #[test]
    fn test_vlan_only_policy_synthesizes_trunk() {
        let iface = Interface::parse(
            &json!({
                "tagnode": "dp0s1",
                "vif": [{"tagnode": 10, "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "v10"}}]
            }),
            InterfaceKind::Dataplane,
        )
        .unwrap()
        .unwrap();
        assert_eq!(iface.subports[0].policy, None);
        assert_eq!(iface.subports[1].vlan, 10);
    }

    #[test]
    fn test_map_bindings() {
        let iface = Interface::parse(
            &json!({
                "tagnode": "dp0s2",
                "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:ingress-map": "in-1"},
                "vif": [{"tagnode": 5, "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:egress-map": "out-1"}}]
            }),
            InterfaceKind::Dataplane,
        )
        .unwrap()
        .unwrap();
        assert!(iface.subports.is_empty());
        assert_eq!(iface.ingress_maps, vec![MapBinding { map: "in-1".into(), vlan: 0 }]);
        assert_eq!(iface.egress_maps, vec![MapBinding { map: "out-1".into(), vlan: 5 }]);
    }

    #[test]
    fn test_no_qos_config_is_no_interface() {
        let iface = Interface::parse(&json!({"tagnode": "dp0s3"}), InterfaceKind::Dataplane).unwrap();
        assert!(iface.is_none());
        assert!(Interface::parse(&json!({}), InterfaceKind::Dataplane).is_err());
    }

    #[test]
    fn test_bond_member_requires_lag() {
        let err = Interface::bond_member("dp0s1", None).unwrap_err();
        assert!(matches!(err, CfgMgrError::Contract { .. }));

        let lag = json!({
            "tagnode": "dp0bond0",
            "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "p1"}
        });
        let member = Interface::bond_member("dp0s1", Some(&lag)).unwrap().unwrap();
        assert_eq!(member.name, "dp0s1");
        assert_eq!(
            member.kind,
            InterfaceKind::BondMember {
                lag: "dp0bond0".to_string()
            }
        );
    }

    #[test]
    fn test_delete_commands() {
        let iface = Interface::parse(
            &json!({"tagnode": "lo", "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "p"}}),
            InterfaceKind::Dataplane,
        )
        .unwrap()
        .unwrap();
        let cmds = iface.delete_commands();
        assert_eq!(cmds[0].command, "qos lo disable");
        assert_eq!(cmds[0].op, sonic_cfgmgr_common::Operation::Delete);
    }
}
