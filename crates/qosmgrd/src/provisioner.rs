//! Reconciliation engine.
//!
//! A [`Provisioner`] diffs two [`QosConfig`] snapshots and produces the
//! ordered command stream that migrates the dataplane from one to the other.
//!
//! The stream is laid out so that shared objects exist before anything that
//! references them, and are never torn down while still referenced:
//!
//! 1. shared object deletes (each unbinding itself first)
//! 2. shared object creates and in-place updates
//! 3. `disable` of removed interfaces
//! 4. `disable` followed by the full command set of updated interfaces
//! 5. the full command set of new interfaces
//! 6. a single `qos commit`, only when anything else was emitted

use std::collections::BTreeMap;

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, Command, CommandSink, Dataplanes, TARGET_ALL};
use tracing::{debug, info};

use crate::bond::BondMembership;
use crate::config::QosConfig;
use crate::global_object::GlobalObject;
use crate::platform::{PlatformParams, QosContext};

/// Appends `name` unless already present, keeping first-seen order.
fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

/// Interface names sorted into the three interface accumulators, each in
/// configuration order.
#[derive(Debug, Default)]
struct InterfacePlan {
    deletes: Vec<String>,
    updates: Vec<String>,
    creates: Vec<String>,
}

impl InterfacePlan {
    fn delete(&mut self, name: &str) {
        push_unique(&mut self.deletes, name);
    }

    fn create(&mut self, name: &str) {
        push_unique(&mut self.creates, name);
    }

    /// Schedules an update unless the interface is already being rebuilt.
    fn update(&mut self, name: &str) {
        if !self.creates.iter().any(|n| n == name) && !self.deletes.iter().any(|n| n == name) {
            push_unique(&mut self.updates, name);
        }
    }
}

/// Shared object commands, and maps waiting for a binding.
#[derive(Debug, Default)]
struct ObjectPlan {
    deletes: Vec<Command>,
    creates: Vec<Command>,
    deferred: Vec<String>,
}

/// Returns true if the object is held back until something binds it.
fn is_deferred<T: GlobalObject>(object: &T) -> bool {
    object.deferrable() && object.bindings().is_empty()
}

/// Diffs one category of shared objects.
///
/// Returns the names of objects whose configuration changed.
fn diff_objects<T: GlobalObject>(
    old: &BTreeMap<String, T>,
    new: &BTreeMap<String, T>,
    plan: &mut ObjectPlan,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (name, object) in old {
        if !new.contains_key(name) && !is_deferred(object) {
            debug!(kind = T::KIND, name = %name, "Deleting");
            plan.deletes.extend(object.delete_commands());
        }
    }

    for (name, object) in new {
        let previous = old.get(name);
        let existed = previous.is_some_and(|p| !is_deferred(p));
        let same = previous.is_some_and(|p| p == object);
        if same {
            if is_deferred(object) {
                if let Some(previous) = previous.filter(|_| existed) {
                    debug!(kind = T::KIND, name = %name, "Removing object that lost its bindings");
                    plan.deletes.extend(previous.delete_commands());
                }
                plan.deferred.push(name.clone());
            } else if !existed {
                debug!(kind = T::KIND, name = %name, "Creating on first binding");
                plan.creates.extend(object.create_commands());
            }
            continue;
        }
        if previous.is_some() {
            changed.push(name.clone());
        }

        if is_deferred(object) {
            if let Some(previous) = previous.filter(|_| existed) {
                debug!(kind = T::KIND, name = %name, "Removing object that lost its bindings");
                plan.deletes.extend(previous.delete_commands());
            }
            debug!(kind = T::KIND, name = %name, "Deferring unbound object");
            plan.deferred.push(name.clone());
        } else if existed && object.bindings().is_empty() {
            if let Some(previous) = previous {
                debug!(kind = T::KIND, name = %name, "Replacing unbound object");
                plan.deletes.extend(previous.delete_commands());
            }
            plan.creates.extend(object.create_commands());
        } else {
            debug!(kind = T::KIND, name = %name, "Creating or updating in place");
            plan.creates.extend(object.create_commands());
        }
    }

    changed
}

/// Interfaces bound to any of the named objects in `objects`.
fn bound_interfaces<'a, T: GlobalObject>(
    objects: &'a BTreeMap<String, T>,
    names: &'a [String],
) -> impl Iterator<Item = &'a str> {
    names
        .iter()
        .filter_map(|name| objects.get(name))
        .flat_map(|object| object.bindings().iter().map(|b| b.ifname.as_str()))
}

/// Computes and sends the command stream between two snapshots.
#[derive(Debug)]
pub struct Provisioner {
    commands: Vec<Command>,
    deferred: Vec<String>,
}

impl Provisioner {
    /// Diffs `old` against `new`.
    pub fn new(old: &QosConfig, new: &QosConfig, ctx: &QosContext) -> Self {
        let mut ifaces = InterfacePlan::default();
        let mut objects = ObjectPlan::default();

        // Platform switches affect every port.
        let (platform_deletes, platform_creates) =
            PlatformParams::diff(old.platform(), new.platform());
        let platform_changed = !platform_deletes.is_empty() || !platform_creates.is_empty();
        objects.deletes.extend(platform_deletes);
        objects.creates.extend(platform_creates);

        for iface in new.interfaces_in_order() {
            let name = iface.name.as_str();
            match old.interface(name) {
                None => {
                    debug!(ifname = %name, "Interface added");
                    ifaces.create(name);
                }
                Some(previous) if previous != iface => {
                    debug!(ifname = %name, "Interface changed");
                    ifaces.delete(name);
                    ifaces.create(name);
                }
                Some(_) => {}
            }
        }
        for iface in old.interfaces_in_order() {
            if new.interface(&iface.name).is_none() {
                debug!(ifname = %iface.name, "Interface removed");
                ifaces.delete(&iface.name);
            }
        }

        if platform_changed {
            info!("Platform parameters changed, updating every interface");
            for iface in new.interfaces_in_order() {
                if old.interface(&iface.name).is_some() {
                    ifaces.update(&iface.name);
                }
            }
        }

        for (name, policy) in new.policies() {
            if old.policy(name).is_some_and(|previous| previous != policy) {
                debug!(policy = %name, "Policy changed");
                for ifname in policy.interfaces() {
                    ifaces.update(ifname);
                }
            }
        }

        for (name, profile) in new.global_profiles() {
            if old
                .global_profiles()
                .get(name)
                .is_some_and(|previous| previous != profile)
            {
                debug!(profile = %name, "Global profile changed");
                for iface in new.interfaces_in_order() {
                    if iface.profile_index_get(&format!("global {}", name)).is_some() {
                        ifaces.update(&iface.name);
                    }
                }
            }
        }

        let changed = diff_objects(old.mark_maps(), new.mark_maps(), &mut objects);
        for ifname in bound_interfaces(new.mark_maps(), &changed) {
            ifaces.update(ifname);
        }
        let changed = diff_objects(old.action_groups(), new.action_groups(), &mut objects);
        for ifname in bound_interfaces(new.action_groups(), &changed) {
            ifaces.update(ifname);
        }
        let changed = diff_objects(old.ingress_maps(), new.ingress_maps(), &mut objects);
        for ifname in bound_interfaces(new.ingress_maps(), &changed) {
            ifaces.update(ifname);
        }
        let changed = diff_objects(old.egress_maps(), new.egress_maps(), &mut objects);
        for ifname in bound_interfaces(new.egress_maps(), &changed) {
            ifaces.update(ifname);
        }

        let mut commands = objects.deletes;
        commands.extend(objects.creates);
        for name in &ifaces.deletes {
            if let Some(iface) = old.interface(name) {
                commands.extend(iface.delete_commands());
            }
        }
        for name in &ifaces.updates {
            if let Some(iface) = new.interface(name) {
                commands.extend(iface.delete_commands());
                commands.extend(iface.commands(new, ctx));
            }
        }
        for name in &ifaces.creates {
            if let Some(iface) = new.interface(name) {
                commands.extend(iface.commands(new, ctx));
            }
        }
        if !commands.is_empty() {
            commands.push(Command::set("qos/commit", "qos commit", TARGET_ALL));
        }

        info!(
            commands = commands.len(),
            deleted = ifaces.deletes.len(),
            updated = ifaces.updates.len(),
            created = ifaces.creates.len(),
            deferred = objects.deferred.len(),
            "QoS diff computed"
        );

        Self {
            commands,
            deferred: objects.deferred,
        }
    }

    /// Diff for a LAG membership change.
    ///
    /// Both snapshots are built from the same tree, one per membership, and
    /// are restricted to the ports whose LAG changed. Shared objects are taken
    /// from the new snapshot on both sides so only those ports are touched.
    pub fn for_membership_change(
        tree: &Value,
        old: &BondMembership,
        new: &BondMembership,
        ctx: &QosContext,
    ) -> CfgMgrResult<Self> {
        let ports = BondMembership::changed_ports(old, new);
        info!(ports = ?ports, "LAG membership changed");

        let mut before = QosConfig::with_bond_members(tree, old)?;
        let mut after = QosConfig::with_bond_members(tree, new)?;
        before.retain_interfaces(&ports);
        after.retain_interfaces(&ports);
        before.share_objects_from(&after);

        Ok(Self::new(&before, &after, ctx))
    }

    /// The computed command stream, trailing commit included.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns true if the snapshots are equivalent.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Unbound maps that were not created.
    pub fn deferred(&self) -> &[String] {
        &self.deferred
    }

    /// Stores every command in order, stopping at the first sink error.
    pub fn send(&self, sink: &mut dyn CommandSink) -> CfgMgrResult<()> {
        for cmd in &self.commands {
            sink.store(&cmd.path, &cmd.command, &cmd.target, cmd.op)?;
        }
        Ok(())
    }

    /// Runs one pass per connected dataplane.
    pub fn apply(&self, dataplanes: &mut dyn Dataplanes) -> CfgMgrResult<()> {
        if self.is_empty() {
            debug!("Nothing to send");
            return Ok(());
        }
        dataplanes.for_each_dataplane(&mut |sink| self.send(sink))
    }
}
