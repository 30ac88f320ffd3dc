//! Test fixtures for QoS configuration trees
//!
//! Provides a builder for YANG JSON configuration trees plus reusable
//! policy, map and LAG membership scenarios.

use serde_json::{json, Map, Value};

const POLICY: &str = "vyatta-policy-v1:policy";
const QOS: &str = "vyatta-policy-qos-v1:qos";
const ACTION: &str = "vyatta-policy-action-v1:action";
const RESOURCES: &str = "vyatta-resources-v1:resources";
const RESOURCE_GROUP: &str = "vyatta-resources-group-misc-v1:group";
const DSCP_GROUP: &str = "vyatta-resources-dscp-group-v1:dscp-group";
const INTERFACES: &str = "vyatta-interfaces-v1:interfaces";
const DATAPLANE: &str = "vyatta-interfaces-dataplane-v1:dataplane";
const BONDING: &str = "vyatta-interfaces-bonding-v1:bonding";
const IF_POLICY: &str = "vyatta-interfaces-policy-v1:policy";
const IF_INGRESS_MAP: &str = "vyatta-policy-qos-v1:ingress-map";
const IF_EGRESS_MAP: &str = "vyatta-policy-qos-v1:egress-map";

/// Builder for a full configuration tree
#[derive(Debug, Clone, Default)]
pub struct QosTree {
    policies: Vec<Value>,
    profiles: Vec<Value>,
    mark_maps: Vec<Value>,
    ingress_maps: Vec<Value>,
    egress_maps: Vec<Value>,
    action_groups: Vec<Value>,
    dscp_groups: Vec<Value>,
    platform: Option<Value>,
    dataplanes: Vec<Value>,
    bondings: Vec<Value>,
}

impl QosTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named policy (`{"id": ..., "shaper": {...}}`)
    pub fn policy(mut self, policy: Value) -> Self {
        self.policies.push(policy);
        self
    }

    /// Add a global profile
    pub fn global_profile(mut self, profile: Value) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn mark_map(mut self, map: Value) -> Self {
        self.mark_maps.push(map);
        self
    }

    pub fn ingress_map(mut self, map: Value) -> Self {
        self.ingress_maps.push(map);
        self
    }

    pub fn egress_map(mut self, map: Value) -> Self {
        self.egress_maps.push(map);
        self
    }

    pub fn action_group(mut self, group: Value) -> Self {
        self.action_groups.push(group);
        self
    }

    /// Add a DSCP group resource
    pub fn dscp_group(mut self, name: &str, dscp: &[&str]) -> Self {
        self.dscp_groups.push(json!({"group-name": name, "dscp": dscp}));
        self
    }

    /// Set platform-wide parameters
    pub fn platform(mut self, buffer_threshold: Option<u64>, lp_designation: Option<u64>) -> Self {
        let mut platform = Map::new();
        if let Some(v) = buffer_threshold {
            platform.insert("buffer-threshold".into(), json!(v));
        }
        if let Some(v) = lp_designation {
            platform.insert("local-priority-designation".into(), json!(v));
        }
        self.platform = Some(Value::Object(platform));
        self
    }

    /// Add a dataplane port entry
    pub fn port(mut self, port: Value) -> Self {
        self.dataplanes.push(port);
        self
    }

    /// Add a LAG entry
    pub fn bond(mut self, bond: Value) -> Self {
        self.bondings.push(bond);
        self
    }

    /// Render the tree as YANG JSON
    pub fn build(&self) -> Value {
        let mut qos = Map::new();
        for (key, list) in [
            ("name", &self.policies),
            ("profile", &self.profiles),
            ("mark-map", &self.mark_maps),
            ("ingress-map", &self.ingress_maps),
            ("egress-map", &self.egress_maps),
        ] {
            if !list.is_empty() {
                qos.insert(key.into(), Value::Array(list.clone()));
            }
        }
        if let Some(platform) = &self.platform {
            qos.insert("platform".into(), platform.clone());
        }

        let mut tree = Map::new();
        let mut policy = Map::new();
        if !qos.is_empty() {
            policy.insert(QOS.into(), Value::Object(qos));
        }
        if !self.action_groups.is_empty() {
            policy.insert(ACTION.into(), json!({"name": self.action_groups}));
        }
        if !policy.is_empty() {
            tree.insert(POLICY.into(), Value::Object(policy));
        }
        if !self.dscp_groups.is_empty() {
            tree.insert(
                RESOURCES.into(),
                json!({RESOURCE_GROUP: {DSCP_GROUP: self.dscp_groups}}),
            );
        }

        let mut interfaces = Map::new();
        if !self.dataplanes.is_empty() {
            interfaces.insert(DATAPLANE.into(), Value::Array(self.dataplanes.clone()));
        }
        if !self.bondings.is_empty() {
            interfaces.insert(BONDING.into(), Value::Array(self.bondings.clone()));
        }
        if !interfaces.is_empty() {
            tree.insert(INTERFACES.into(), Value::Object(interfaces));
        }
        Value::Object(tree)
    }
}

/// Common policy fixtures
pub mod policy_fixtures {
    use super::*;

    /// Policy with one local profile used as the default
    pub fn simple_policy(name: &str, rate: &str, profile: &str, profile_rate: &str) -> Value {
        json!({
            "id": name,
            "shaper": {
                "bandwidth": rate,
                "frame-overhead": 24,
                "default": profile,
                "profile": [{"id": profile, "bandwidth": profile_rate}]
            }
        })
    }

    /// Policy whose pipes use global profiles only
    pub fn global_profile_policy(name: &str, default: &str, classes: &[(u64, &str)]) -> Value {
        let classes: Vec<Value> = classes
            .iter()
            .map(|(id, profile)| json!({"id": id, "profile": profile}))
            .collect();
        json!({"id": name, "shaper": {"default": default, "class": classes}})
    }

    /// Global or local profile with a bandwidth
    pub fn profile(name: &str, rate: &str) -> Value {
        json!({"id": name, "bandwidth": rate})
    }

    /// Port with a trunk policy
    pub fn port_with_policy(ifname: &str, policy: &str) -> Value {
        json!({"tagnode": ifname, IF_POLICY: {QOS: policy}})
    }

    /// Port with per-VLAN policies and an optional trunk policy
    pub fn port_with_vlans(ifname: &str, trunk: Option<&str>, vlans: &[(u16, &str)]) -> Value {
        let mut port = json!({"tagnode": ifname});
        if let Some(policy) = trunk {
            port[IF_POLICY] = json!({QOS: policy});
        }
        let vifs: Vec<Value> = vlans
            .iter()
            .map(|(vlan, policy)| json!({"tagnode": vlan, IF_POLICY: {QOS: policy}}))
            .collect();
        port["vif"] = Value::Array(vifs);
        port
    }

    /// LAG with a trunk policy
    pub fn bond_with_policy(lag: &str, policy: &str) -> Value {
        json!({"tagnode": lag, IF_POLICY: {QOS: policy}})
    }
}

/// Common shared map fixtures
pub mod map_fixtures {
    use super::*;

    /// Ingress map classifying one DSCP group
    pub fn ingress_map(name: &str, group: &str, designation: u64) -> Value {
        json!({"id": name, "dscp-group": [{"id": group, "designation": designation}]})
    }

    /// Egress map remarking one designation
    pub fn egress_map(name: &str, designation: u64, dscp: &str) -> Value {
        json!({"id": name, "designation": [{"id": designation, "dscp": dscp}]})
    }

    /// Mark map remarking one DSCP group to a PCP value
    pub fn mark_map(name: &str, group: &str, pcp: u64) -> Value {
        json!({"id": name, "dscp-group": [{"group-name": group, "pcp-mark": pcp}]})
    }

    /// Bind an ingress map to the trunk of a port entry
    pub fn bind_ingress(mut port: Value, map: &str) -> Value {
        port[IF_POLICY][IF_INGRESS_MAP] = json!(map);
        port
    }

    /// Bind an egress map to the trunk of a port entry
    pub fn bind_egress(mut port: Value, map: &str) -> Value {
        port[IF_POLICY][IF_EGRESS_MAP] = json!(map);
        port
    }
}

/// LAG membership notification payloads
pub mod membership_fixtures {
    use super::*;

    /// Payload for `(lag, [ports])` groups
    pub fn membership_json(groups: &[(&str, &[&str])]) -> String {
        let mut payload = Map::new();
        for (lag, ports) in groups {
            let members: Vec<Value> = ports
                .iter()
                .map(|port| json!({"tagnode": port, "bond-group": lag}))
                .collect();
            payload.insert(lag.to_string(), Value::Array(members));
        }
        Value::Object(payload).to_string()
    }
}
