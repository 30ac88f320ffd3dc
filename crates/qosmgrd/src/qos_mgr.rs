//! QosMgr implementation - the QoS configuration manager core.

use std::path::PathBuf;

use serde_json::{json, Value};
use sonic_cfgmgr_common::{CfgMgrResult, Dataplanes};
use tracing::{error, info, instrument, warn};

use crate::bond::BondMembership;
use crate::config::QosConfig;
use crate::platform::QosContext;
use crate::provisioner::Provisioner;
use crate::state;

/// QoS configuration manager.
///
/// Remembers the last configuration tree the dataplanes accepted and turns
/// every new tree or LAG membership change into one reconciliation pass.
pub struct QosMgr {
    /// Daemon name for logging.
    daemon_name: String,

    ctx: QosContext,

    /// Tree of the last pass that reached every dataplane.
    last_applied: Value,

    membership: BondMembership,

    /// Where `last_applied` is persisted, if anywhere.
    state_file: Option<PathBuf>,
}

impl QosMgr {
    /// Creates a manager that starts from an empty configuration.
    pub fn new(ctx: QosContext) -> Self {
        Self {
            daemon_name: "qosmgrd".to_string(),
            ctx,
            last_applied: json!({}),
            membership: BondMembership::default(),
            state_file: None,
        }
    }

    /// Restores the last applied tree from `path` and persists to it.
    pub fn with_state_file(mut self, path: impl Into<PathBuf>) -> CfgMgrResult<Self> {
        let path = path.into();
        self.last_applied = state::load_last_applied(&path)?;
        self.state_file = Some(path);
        Ok(self)
    }

    /// Starts from a known LAG membership.
    pub fn with_membership(mut self, membership: BondMembership) -> Self {
        self.membership = membership;
        self
    }

    pub fn daemon_name(&self) -> &str {
        &self.daemon_name
    }

    pub fn last_applied(&self) -> &Value {
        &self.last_applied
    }

    pub fn membership(&self) -> &BondMembership {
        &self.membership
    }

    fn snapshot(&self, tree: &Value) -> CfgMgrResult<QosConfig> {
        QosConfig::with_bond_members(tree, &self.membership)
    }

    /// Computes the pass from the last applied tree to `tree` without
    /// sending it. Fails if the new tree does not pass `check()`.
    pub fn plan(&self, tree: &Value) -> CfgMgrResult<Provisioner> {
        let new = self.snapshot(tree)?;
        new.check()?;
        let old = self.snapshot(&self.last_applied)?;
        Ok(Provisioner::new(&old, &new, &self.ctx))
    }

    /// Applies a new configuration tree to every dataplane.
    ///
    /// The tree is only remembered once every command was delivered, so a
    /// failed pass is recomputed in full on the next commit.
    #[instrument(skip_all, fields(daemon = %self.daemon_name))]
    pub fn apply_config(
        &mut self,
        tree: Value,
        dataplanes: &mut dyn Dataplanes,
    ) -> CfgMgrResult<Provisioner> {
        let provisioner = match self.plan(&tree) {
            Ok(p) => p,
            Err(e) => {
                warn!("Configuration rejected: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = provisioner.apply(dataplanes) {
            error!("{}", e);
            return Err(e);
        }
        if !provisioner.deferred().is_empty() {
            info!(deferred = ?provisioner.deferred(), "Unbound maps not created");
        }

        info!(commands = provisioner.commands().len(), "QoS configuration applied");
        self.last_applied = tree;
        self.persist()?;
        Ok(provisioner)
    }

    /// Reconciles the ports whose LAG changed.
    #[instrument(skip_all, fields(daemon = %self.daemon_name))]
    pub fn on_membership_change(
        &mut self,
        membership: BondMembership,
        dataplanes: &mut dyn Dataplanes,
    ) -> CfgMgrResult<Provisioner> {
        let provisioner = Provisioner::for_membership_change(
            &self.last_applied,
            &self.membership,
            &membership,
            &self.ctx,
        )?;
        if let Err(e) = provisioner.apply(dataplanes) {
            error!("{}", e);
            return Err(e);
        }
        self.membership = membership;
        Ok(provisioner)
    }

    fn persist(&self) -> CfgMgrResult<()> {
        match &self.state_file {
            Some(path) => state::save_last_applied(path, &self.last_applied),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sonic_cfgmgr_common::{CfgMgrError, RecordingSink};
    use tempfile::tempdir;

    fn tree(policy: &str) -> Value {
        json!({
            "vyatta-policy-v1:policy": {"vyatta-policy-qos-v1:qos": {
                "name": [{"id": "p1", "shaper": {
                    "default": "prof", "profile": [{"id": "prof"}]
                }}]
            }},
            "vyatta-interfaces-v1:interfaces": {
                "vyatta-interfaces-dataplane-v1:dataplane": [
                    {"tagnode": "dp0s1",
                     "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": policy}}
                ]
            }
        })
    }

    #[test]
    fn test_apply_then_reapply_is_noop() {
        let mut mgr = QosMgr::new(QosContext::default());
        let mut sink = RecordingSink::new();
        mgr.apply_config(tree("p1"), &mut sink).unwrap();
        assert_eq!(sink.passes(), 1);
        assert_eq!(sink.texts().last(), Some(&"qos commit"));

        let again = mgr.apply_config(tree("p1"), &mut sink).unwrap();
        assert!(again.is_empty());
        assert_eq!(sink.passes(), 1);
    }

    #[test]
    fn test_rejected_config_is_not_remembered() {
        let mut mgr = QosMgr::new(QosContext::default());
        let mut sink = RecordingSink::new();
        let err = mgr.apply_config(tree("ghost"), &mut sink).unwrap_err();
        assert!(matches!(err, CfgMgrError::Check(_)));
        assert!(sink.is_empty());
        assert_eq!(mgr.last_applied(), &json!({}));
    }

    #[test]
    fn test_failed_pass_is_not_remembered() {
        let mut mgr = QosMgr::new(QosContext::default());
        let mut sink = RecordingSink::failing_after(1);
        let err = mgr.apply_config(tree("p1"), &mut sink).unwrap_err();
        assert!(matches!(err, CfgMgrError::Transport { .. }));
        assert_eq!(mgr.last_applied(), &json!({}));
    }

    #[test]
    fn test_state_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("qos.json");

        let mut mgr = QosMgr::new(QosContext::default())
            .with_state_file(&path)
            .unwrap();
        mgr.apply_config(tree("p1"), &mut RecordingSink::new()).unwrap();

        let restarted = QosMgr::new(QosContext::default())
            .with_state_file(&path)
            .unwrap();
        assert_eq!(restarted.last_applied(), &tree("p1"));
        assert!(restarted.plan(&tree("p1")).unwrap().is_empty());
    }

    #[test]
    fn test_membership_change() {
        let lag_tree = json!({
            "vyatta-policy-v1:policy": {"vyatta-policy-qos-v1:qos": {
                "name": [{"id": "p1", "shaper": {
                    "default": "prof", "profile": [{"id": "prof"}]
                }}]
            }},
            "vyatta-interfaces-v1:interfaces": {
                "vyatta-interfaces-bonding-v1:bonding": [
                    {"tagnode": "dp0bond0",
                     "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "p1"}}
                ]
            }
        });
        let mut mgr = QosMgr::new(QosContext::default());
        mgr.apply_config(lag_tree, &mut RecordingSink::new()).unwrap();

        let mut sink = RecordingSink::new();
        let membership = BondMembership::from_groups([("dp0bond0", vec!["dp0s3"])]);
        mgr.on_membership_change(membership.clone(), &mut sink).unwrap();
        assert!(sink.texts().contains(&"qos dp0s3 enable"));
        assert_eq!(mgr.membership(), &membership);
    }
}
