//! Egress remarking maps.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, Command};
use tracing::warn;

use crate::global_object::{
    dscp_csv, global_set, push_binding, unbind_and_delete, Binding, DscpGroups, GlobalObject,
};
use crate::tables::{map_fields, shaper_fields};
use crate::units::dscp_value;
use crate::value_ext::ValueExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EgressEntry {
    /// Packets of a designation leave with a DSCP.
    Designation { designation: u64, dscp: u8 },
    /// Packets of a DSCP group are remarked.
    DscpGroup { group: String, dscp: Vec<u8>, remark: u8 },
}

/// A named egress-map, bound to ports and VLANs.
#[derive(Debug, Clone)]
pub struct EgressMap {
    pub name: String,
    pub entries: Vec<EgressEntry>,
    bindings: Vec<Binding>,
}

impl PartialEq for EgressMap {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries
    }
}

impl EgressMap {
    pub fn parse(value: &Value, groups: &DscpGroups) -> CfgMgrResult<Self> {
        let name = value.require_text(shaper_fields::ID, "egress-map")?;
        let mut entries = Vec::new();

        for entry in value.get_list(map_fields::DESIGNATION) {
            let designation = entry.require_u64(shaper_fields::ID, "egress-map designation")?;
            let text = entry.require_text(map_fields::DSCP, "egress-map designation")?;
            match dscp_value(&text) {
                Some(dscp) => entries.push(EgressEntry::Designation { designation, dscp }),
                None => warn!(egress_map = %name, dscp = %text, "Invalid DSCP, entry ignored"),
            }
        }

        for entry in value.get_list(map_fields::DSCP_GROUP) {
            let group = entry.require_text(shaper_fields::ID, "egress-map dscp-group")?;
            let text = entry.require_text(map_fields::DSCP, "egress-map dscp-group")?;
            let (Some(dscp), Some(remark)) = (groups.get(&group), dscp_value(&text)) else {
                warn!(egress_map = %name, group = %group, "Unresolvable remark entry ignored");
                continue;
            };
            entries.push(EgressEntry::DscpGroup {
                dscp: dscp.clone(),
                group,
                remark,
            });
        }

        Ok(Self {
            name,
            entries,
            bindings: Vec::new(),
        })
    }
}

impl GlobalObject for EgressMap {
    const KIND: &'static str = "egress-map";

    fn name(&self) -> &str {
        &self.name
    }

    fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    fn add_binding(&mut self, binding: Binding) {
        push_binding(&mut self.bindings, binding);
    }

    fn create_commands(&self) -> Vec<Command> {
        let mut cmds: Vec<Command> = self
            .entries
            .iter()
            .map(|entry| {
                let rest = match entry {
                    EgressEntry::Designation { designation, dscp } => {
                        format!(" designation {} dscp {}", designation, dscp)
                    }
                    EgressEntry::DscpGroup { dscp, remark, .. } => {
                        format!(" dscp {} remark {}", dscp_csv(dscp), remark)
                    }
                };
                global_set(Self::KIND, &self.name, &rest)
            })
            .collect();
        cmds.push(global_set(Self::KIND, &self.name, " complete"));
        cmds
    }

    fn delete_commands(&self) -> Vec<Command> {
        unbind_and_delete(Self::KIND, &self.name, &self.bindings)
    }

    fn deferrable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_create_commands() {
        let groups = DscpGroups::from([("g1".to_string(), vec![8, 10])]);
        let map = EgressMap::parse(
            &json!({
                "id": "out-1",
                "designation": [{"id": 0, "dscp": "ef"}],
                "dscp-group": [{"id": "g1", "dscp": 0}, {"id": "nope", "dscp": 1}]
            }),
            &groups,
        )
        .unwrap();
        let texts: Vec<_> = map.create_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "qos global-object-cmd egress-map out-1 designation 0 dscp 46",
                "qos global-object-cmd egress-map out-1 dscp 8,10 remark 0",
                "qos global-object-cmd egress-map out-1 complete",
            ]
        );
    }

    #[test]
    fn test_delete_with_bindings() {
        let mut map = EgressMap::parse(&json!({"id": "out-1"}), &DscpGroups::new()).unwrap();
        map.add_binding(Binding::new("dp0s2", 0));
        let cmds = map.delete_commands();
        assert_eq!(cmds[0].command, "qos dp0s2 egress-map out-1 vlan 0 delete");
        assert_eq!(cmds[1].command, "qos global-object-cmd egress-map out-1 delete");
    }
}
