//! Named action groups referenced from match rules.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure, Command};

use crate::global_object::{global_set, push_binding, Binding, GlobalObject};
use crate::policer::{Marking, Policer};
use crate::tables::{rule_fields, shaper_fields};
use crate::value_ext::ValueExt;

#[derive(Debug, Clone)]
pub struct ActionGroup {
    pub name: String,
    pub mark: Option<Marking>,
    pub police: Option<Policer>,
    bindings: Vec<Binding>,
}

impl PartialEq for ActionGroup {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.mark == other.mark && self.police == other.police
    }
}

impl ActionGroup {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        Ok(Self {
            name: value.require_text(shaper_fields::ID, "action-group")?,
            mark: value.get(rule_fields::MARK).and_then(Marking::parse),
            police: value.get(rule_fields::POLICE).map(Policer::parse),
            bindings: Vec::new(),
        })
    }

    /// Result processing chain of the group.
    pub fn rproc(&self) -> String {
        self.mark
            .iter()
            .map(Marking::rproc)
            .chain(self.police.iter().map(Policer::descriptor))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn check(&self) -> Result<(), CheckFailure> {
        match &self.police {
            Some(police) => police.check(&format!("policy/action/name/{}/police", self.name)),
            None => Ok(()),
        }
    }
}

impl GlobalObject for ActionGroup {
    const KIND: &'static str = "action-group";

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
        vec![global_set(Self::KIND, &self.name, &format!(" {}", self.rproc()))]
    }
}
