//! Egress PCP marking maps.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, Command};
use tracing::warn;

use crate::global_object::{dscp_csv, global_set, push_binding, Binding, DscpGroups, GlobalObject};
use crate::tables::{map_fields, shaper_fields};
use crate::value_ext::ValueExt;
use crate::wred::Colour;

/// One marking rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkEntry {
    /// Packets of a DSCP group get a PCP.
    DscpGroup { group: String, dscp: Vec<u8>, pcp: u64 },
    /// Packets of a designation and colour get a PCP.
    Designation { designation: u64, colour: Colour, pcp: u64 },
}

/// A named mark-map, bound to subports through their shaper.
#[derive(Debug, Clone)]
pub struct MarkMap {
    pub name: String,
    pub entries: Vec<MarkEntry>,
    bindings: Vec<Binding>,
}

impl PartialEq for MarkMap {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.entries == other.entries
    }
}

impl MarkMap {
    pub fn parse(value: &Value, groups: &DscpGroups) -> CfgMgrResult<Self> {
        let name = value.require_text(shaper_fields::ID, "mark-map")?;
        let mut entries = Vec::new();

        for entry in value.get_list(map_fields::DSCP_GROUP) {
            let group = entry.require_text(map_fields::GROUP_NAME, "mark-map dscp-group")?;
            let pcp = entry.require_u64(map_fields::PCP_MARK, "mark-map dscp-group")?;
            match groups.get(&group) {
                Some(dscp) => entries.push(MarkEntry::DscpGroup {
                    dscp: dscp.clone(),
                    group,
                    pcp,
                }),
                None => warn!(mark_map = %name, group = %group, "Unknown DSCP group"),
            }
        }

        for entry in value.get_list(map_fields::DESIGNATION) {
            let designation = entry.require_u64(shaper_fields::ID, "mark-map designation")?;
            if let Some(pcp) = entry.get_u64(map_fields::PCP_MARK) {
                entries.push(MarkEntry::Designation {
                    designation,
                    colour: Colour::Green,
                    pcp,
                });
            }
            for dp in entry.get_list(map_fields::DROP_PRECEDENCE) {
                let colour_name = dp.require_text(shaper_fields::ID, "mark-map drop-precedence")?;
                let Some(colour) = Colour::parse(&colour_name) else {
                    warn!(mark_map = %name, colour = %colour_name, "Unknown drop precedence");
                    continue;
                };
                let pcp = dp.require_u64(map_fields::PCP_MARK, "mark-map drop-precedence")?;
                entries.push(MarkEntry::Designation {
                    designation,
                    colour,
                    pcp,
                });
            }
        }

        Ok(Self {
            name,
            entries,
            bindings: Vec::new(),
        })
    }
}

impl GlobalObject for MarkMap {
    const KIND: &'static str = "mark-map";

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
        self.entries
            .iter()
            .map(|entry| {
                let rest = match entry {
                    MarkEntry::DscpGroup { dscp, pcp, .. } => {
                        format!(" dscp {} pcp {}", dscp_csv(dscp), pcp)
                    }
                    MarkEntry::Designation {
                        designation,
                        colour,
                        pcp,
                    } => format!(
                        " designation {} drop-prec {} pcp {}",
                        designation,
                        colour.as_str(),
                        pcp
                    ),
                };
                global_set(Self::KIND, &self.name, &rest)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn groups() -> DscpGroups {
        DscpGroups::from([("g1".to_string(), vec![10, 12]), ("g2".to_string(), vec![46])])
    }

    #[test]
    fn test_dscp_group_mark_map() {
        let map = MarkMap::parse(
            &json!({"id": "mm-1", "dscp-group": [
                {"group-name": "g1", "pcp-mark": 3},
                {"group-name": "g2", "pcp-mark": 5},
                {"group-name": "missing", "pcp-mark": 1}
            ]}),
            &groups(),
        )
        .unwrap();
        let texts: Vec<_> = map.create_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "qos global-object-cmd mark-map mm-1 dscp 10,12 pcp 3",
                "qos global-object-cmd mark-map mm-1 dscp 46 pcp 5",
            ]
        );
        assert_eq!(
            map.delete_commands()[0].command,
            "qos global-object-cmd mark-map mm-1 delete"
        );
    }

    #[test]
    fn test_designation_mark_map() {
        let map = MarkMap::parse(
            &json!({"id": "mm-2", "designation": [
                {"id": 1, "drop-precedence": [
                    {"id": "green", "pcp-mark": 2},
                    {"id": "red", "pcp-mark": 0}
                ]}
            ]}),
            &groups(),
        )
        .unwrap();
        let texts: Vec<_> = map.create_commands().into_iter().map(|c| c.command).collect();
        assert_eq!(
            texts,
            vec![
                "qos global-object-cmd mark-map mm-2 designation 1 drop-prec green pcp 2",
                "qos global-object-cmd mark-map mm-2 designation 1 drop-prec red pcp 0",
            ]
        );
    }

    #[test]
    fn test_equality_ignores_bindings() {
        let a = MarkMap::parse(&json!({"id": "mm"}), &groups()).unwrap();
        let mut b = a.clone();
        b.add_binding(Binding::new("dp0s1", 0));
        assert_eq!(a, b);
        assert_eq!(b.bindings().len(), 1);
    }

    #[test]
    fn test_dscp_group_change_changes_map() {
        let value = json!({"id": "mm", "dscp-group": [{"group-name": "g1", "pcp-mark": 3}]});
        let a = MarkMap::parse(&value, &groups()).unwrap();
        let other = DscpGroups::from([("g1".to_string(), vec![10])]);
        let b = MarkMap::parse(&value, &other).unwrap();
        assert_ne!(a, b);
    }
}
