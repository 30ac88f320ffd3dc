//! LAG membership snapshots.
//!
//! The membership arrives as a notification payload shaped like
//!
//! ```json
//! { "dp0bond0": [ { "tagnode": "dp0s1", "bond-group": "dp0bond0" } ] }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sonic_cfgmgr_common::{CfgMgrError, CfgMgrResult};

/// One member port of a LAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondMember {
    pub tagnode: String,
    #[serde(rename = "bond-group")]
    pub bond_group: String,
}

impl BondMember {
    pub fn new(tagnode: impl Into<String>, bond_group: impl Into<String>) -> Self {
        Self {
            tagnode: tagnode.into(),
            bond_group: bond_group.into(),
        }
    }
}

/// Immutable map of LAG name to its ordered member ports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BondMembership {
    groups: BTreeMap<String, Vec<BondMember>>,
}

impl BondMembership {
    pub fn new(groups: BTreeMap<String, Vec<BondMember>>) -> Self {
        Self { groups }
    }

    /// Builds a snapshot from `(group, [ports])` pairs.
    pub fn from_groups<'a>(groups: impl IntoIterator<Item = (&'a str, Vec<&'a str>)>) -> Self {
        Self::new(
            groups
                .into_iter()
                .map(|(group, ports)| {
                    let members = ports.into_iter().map(|p| BondMember::new(p, group)).collect();
                    (group.to_string(), members)
                })
                .collect(),
        )
    }

    /// Parses a notification payload.
    pub fn from_json(payload: &str) -> CfgMgrResult<Self> {
        serde_json::from_str(payload).map_err(|e| CfgMgrError::json("bond membership", e))
    }

    pub fn get_membership(&self) -> &BTreeMap<String, Vec<BondMember>> {
        &self.groups
    }

    pub fn get_bond_groups(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Members of `group`, empty if the group is unknown.
    pub fn get_members(&self, group: &str) -> &[BondMember] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The LAG a port belongs to.
    pub fn group_of(&self, port: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.iter().any(|m| m.tagnode == port))
            .map(|(group, _)| group.as_str())
    }

    fn ports(&self) -> impl Iterator<Item = &str> {
        self.groups.values().flatten().map(|m| m.tagnode.as_str())
    }

    /// Ports whose LAG differs between two snapshots.
    pub fn changed_ports(old: &Self, new: &Self) -> BTreeSet<String> {
        old.ports()
            .chain(new.ports())
            .filter(|port| old.group_of(port) != new.group_of(port))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_json_payload() {
        let m = BondMembership::from_json(
            r#"{"dp0bond0": [{"tagnode": "dp0s1", "bond-group": "dp0bond0"},
                             {"tagnode": "dp0s2", "bond-group": "dp0bond0"}]}"#,
        )
        .unwrap();
        assert_eq!(m.get_bond_groups(), vec!["dp0bond0"]);
        let members: Vec<_> = m.get_members("dp0bond0").iter().map(|b| b.tagnode.as_str()).collect();
        assert_eq!(members, vec!["dp0s1", "dp0s2"]);
        assert!(m.get_members("dp0bond9").is_empty());
        assert_eq!(m.group_of("dp0s2"), Some("dp0bond0"));
        assert_eq!(m.group_of("dp0s3"), None);
    }

    #[test]
    fn test_malformed_payload() {
        let err = BondMembership::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, CfgMgrError::Json { .. }));
    }

    #[test]
    fn test_changed_ports() {
        let old = BondMembership::from_groups([("bond0", vec!["dp0s1", "dp0s2"])]);
        let new = BondMembership::from_groups([
            ("bond0", vec!["dp0s1"]),
            ("bond1", vec!["dp0s2", "dp0s3"]),
        ]);
        let changed: Vec<_> = BondMembership::changed_ports(&old, &new).into_iter().collect();
        assert_eq!(changed, vec!["dp0s2", "dp0s3"]);
        assert!(BondMembership::changed_ports(&old, &old).is_empty());
    }
}
