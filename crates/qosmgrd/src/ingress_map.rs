//! Ingress classification maps.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, Command};
use tracing::warn;

use crate::global_object::{
    dscp_csv, global_set, push_binding, unbind_and_delete, Binding, DscpGroups, GlobalObject,
};
use crate::tables::{map_fields, shaper_fields};
use crate::value_ext::ValueExt;
use crate::wred::Colour;

/// Match side of an ingress map entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressMatch {
    Pcp(u64),
    DscpGroup { group: String, dscp: Vec<u8> },
}

/// Maps a marking to a designation and colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressEntry {
    pub matches: IngressMatch,
    pub designation: u64,
    pub colour: Colour,
}

/// A named ingress-map, bound to ports and VLANs.
#[derive(Debug, Clone)]
pub struct IngressMap {
    pub name: String,
    pub system_default: bool,
    pub entries: Vec<IngressEntry>,
    bindings: Vec<Binding>,
}

impl PartialEq for IngressMap {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.system_default == other.system_default
            && self.entries == other.entries
    }
}

fn parse_tail(entry: &Value, name: &str) -> CfgMgrResult<(u64, Colour)> {
    let designation = entry.require_u64(map_fields::DESIGNATION, "ingress-map")?;
    let colour = match entry.get_str(map_fields::DROP_PRECEDENCE) {
        Some(text) => Colour::parse(text).unwrap_or_else(|| {
            warn!(ingress_map = name, colour = text, "Unknown drop precedence, using green");
            Colour::Green
        }),
        None => Colour::Green,
    };
    Ok((designation, colour))
}

impl IngressMap {
    pub fn parse(value: &Value, groups: &DscpGroups) -> CfgMgrResult<Self> {
        let name = value.require_text(shaper_fields::ID, "ingress-map")?;
        let mut entries = Vec::new();

        for entry in value.get_list(map_fields::PCP) {
            let pcp = entry.require_u64(shaper_fields::ID, "ingress-map pcp")?;
            let (designation, colour) = parse_tail(entry, &name)?;
            entries.push(IngressEntry {
                matches: IngressMatch::Pcp(pcp),
                designation,
                colour,
            });
        }

        for entry in value.get_list(map_fields::DSCP_GROUP) {
            let group = entry.require_text(shaper_fields::ID, "ingress-map dscp-group")?;
            let (designation, colour) = parse_tail(entry, &name)?;
            let Some(dscp) = groups.get(&group) else {
                warn!(ingress_map = %name, group = %group, "Unknown DSCP group");
                continue;
            };
            entries.push(IngressEntry {
                matches: IngressMatch::DscpGroup {
                    dscp: dscp.clone(),
                    group,
                },
                designation,
                colour,
            });
        }

        Ok(Self {
            system_default: value.has_flag(map_fields::SYSTEM_DEFAULT),
            name,
            entries,
            bindings: Vec::new(),
        })
    }
}

impl GlobalObject for IngressMap {
    const KIND: &'static str = "ingress-map";

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
                let matches = match &entry.matches {
                    IngressMatch::Pcp(pcp) => format!("pcp {}", pcp),
                    IngressMatch::DscpGroup { dscp, .. } => format!("dscp {}", dscp_csv(dscp)),
                };
                global_set(
                    Self::KIND,
                    &self.name,
                    &format!(
                        " {} designation {} drop-prec {}",
                        matches,
                        entry.designation,
                        entry.colour.as_str()
                    ),
                )
            })
            .collect();
        if self.system_default {
            cmds.push(global_set(Self::KIND, &self.name, " system-default"));
        }
        cmds.push(global_set(Self::KIND, &self.name, " complete"));
        cmds
    }

    fn delete_commands(&self) -> Vec<Command> {
        unbind_and_delete(Self::KIND, &self.name, &self.bindings)
    }

    fn deferrable(&self) -> bool {
        !self.system_default
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
        let map = IngressMap::parse(
            &json!({
                "id": "in-1",
                "system-default": [null],
                "pcp": [{"id": 3, "designation": 2, "drop-precedence": "yellow"}],
                "dscp-group": [{"id": "g1", "designation": 1}]
            }),
            &groups,
        )
        .unwrap();
        let texts: Vec<_> = map.create_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "qos global-object-cmd ingress-map in-1 pcp 3 designation 2 drop-prec yellow",
                "qos global-object-cmd ingress-map in-1 dscp 8,10 designation 1 drop-prec green",
                "qos global-object-cmd ingress-map in-1 system-default",
                "qos global-object-cmd ingress-map in-1 complete",
            ]
        );
        assert!(!map.deferrable());
    }

    #[test]
    fn test_delete_unbinds_first() {
        let mut map = IngressMap::parse(&json!({"id": "in-1"}), &DscpGroups::new()).unwrap();
        assert!(map.deferrable());
        map.add_binding(Binding::new("dp0s1", 10));
        let texts: Vec<_> = map.delete_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "qos dp0s1 ingress-map in-1 vlan 10 delete",
                "qos global-object-cmd ingress-map in-1 delete",
            ]
        );
    }

    #[test]
    fn test_entry_requires_designation() {
        let err = IngressMap::parse(&json!({"id": "x", "pcp": [{"id": 1}]}), &DscpGroups::new());
        assert!(err.is_err());
    }
}
