//! Behaviour shared by independently provisioned global objects.

use std::collections::BTreeMap;
use std::fmt;

use sonic_cfgmgr_common::{Command, TARGET_ALL};

use crate::tables::GLOBAL_OBJECT_CMD;

/// DSCP group name to its expanded code points.
pub type DscpGroups = BTreeMap<String, Vec<u8>>;

/// A port or VLAN using a global object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Binding {
    pub ifname: String,
    /// VLAN id, 0 for the trunk.
    pub vlan: u16,
}

impl Binding {
    pub fn new(ifname: impl Into<String>, vlan: u16) -> Self {
        Self {
            ifname: ifname.into(),
            vlan,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vlan {}", self.ifname, self.vlan)
    }
}

/// A globally named object that ports and VLANs bind to.
///
/// Implementations compare equal on their configuration only, never on
/// their bindings.
pub trait GlobalObject: PartialEq {
    /// Object kind keyword in the command grammar.
    const KIND: &'static str;

    fn name(&self) -> &str;

    /// Ports and VLANs using the object in the snapshot it belongs to.
    fn bindings(&self) -> &[Binding];

    fn add_binding(&mut self, binding: Binding);

    /// Commands that create or overwrite the object.
    fn create_commands(&self) -> Vec<Command>;

    /// Commands that tear the object down, unbinding it first if needed.
    fn delete_commands(&self) -> Vec<Command> {
        vec![global_delete(Self::KIND, self.name())]
    }

    /// Returns true if the object is only worth creating once bound.
    fn deferrable(&self) -> bool {
        false
    }
}

/// Path of a global object.
pub fn global_path(kind: &str, name: &str) -> String {
    format!("qos/global-object/{}/{}", kind, name)
}

/// `qos global-object-cmd <kind> <name><rest>`
pub fn global_set(kind: &str, name: &str, rest: &str) -> Command {
    Command::set(
        global_path(kind, name),
        format!("qos {} {} {}{}", GLOBAL_OBJECT_CMD, kind, name, rest),
        TARGET_ALL,
    )
}

/// `qos global-object-cmd <kind> <name> delete`
pub fn global_delete(kind: &str, name: &str) -> Command {
    Command::delete(
        global_path(kind, name),
        format!("qos {} {} {} delete", GLOBAL_OBJECT_CMD, kind, name),
        TARGET_ALL,
    )
}

/// Unbinds a map from every port and VLAN, then deletes it.
pub fn unbind_and_delete(kind: &str, name: &str, bindings: &[Binding]) -> Vec<Command> {
    let mut cmds: Vec<Command> = bindings
        .iter()
        .map(|b| {
            Command::delete(
                format!("qos/{}/{}/{}/vlan/{}", b.ifname, kind, name, b.vlan),
                format!("qos {} {} {} vlan {} delete", b.ifname, kind, name, b.vlan),
                b.ifname.as_str(),
            )
        })
        .collect();
    cmds.push(global_delete(kind, name));
    cmds
}

/// Adds a binding once.
pub(crate) fn push_binding(bindings: &mut Vec<Binding>, binding: Binding) {
    if !bindings.contains(&binding) {
        bindings.push(binding);
    }
}

/// Joins DSCP values as `a,b,c`.
pub fn dscp_csv(values: &[u8]) -> String {
    values
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonic_cfgmgr_common::Operation;

    #[test]
    fn test_global_command_shapes() {
        let set = global_set("mark-map", "mm-1", " dscp 10 pcp 2");
        assert_eq!(set.command, "qos global-object-cmd mark-map mm-1 dscp 10 pcp 2");
        assert_eq!(set.target, "ALL");
        assert_eq!(set.path, "qos/global-object/mark-map/mm-1");

        let del = global_delete("action-group", "ag");
        assert_eq!(del.command, "qos global-object-cmd action-group ag delete");
        assert_eq!(del.op, Operation::Delete);
    }

    #[test]
    fn test_unbind_before_delete() {
        let bindings = [Binding::new("dp0s1", 0), Binding::new("dp0s2", 20)];
        let cmds = unbind_and_delete("ingress-map", "in-1", &bindings);
        let texts: Vec<_> = cmds.iter().map(|c| c.command.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "qos dp0s1 ingress-map in-1 vlan 0 delete",
                "qos dp0s2 ingress-map in-1 vlan 20 delete",
                "qos global-object-cmd ingress-map in-1 delete",
            ]
        );
        assert_eq!(cmds[1].target, "dp0s2");
        assert!(cmds.iter().all(|c| c.op == Operation::Delete));
    }

    #[test]
    fn test_bindings_are_unique() {
        let mut bindings = Vec::new();
        push_binding(&mut bindings, Binding::new("dp0s1", 0));
        push_binding(&mut bindings, Binding::new("dp0s1", 0));
        push_binding(&mut bindings, Binding::new("dp0s1", 10));
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[1].to_string(), "dp0s1 vlan 10");
    }

    #[test]
    fn test_dscp_csv() {
        assert_eq!(dscp_csv(&[10, 12, 14]), "10,12,14");
        assert_eq!(dscp_csv(&[]), "");
    }
}
