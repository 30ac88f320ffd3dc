//! Named QoS policies.

use std::collections::BTreeMap;

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure};

use crate::profile::Profile;
use crate::shaper::Shaper;
use crate::tables::{shaper_fields, POLICY_PATH};
use crate::value_ext::ValueExt;

/// A policy wraps one shaper and remembers which interfaces use it.
///
/// The interface list is a set of names, not owning handles, and does not
/// take part in equality.
#[derive(Debug, Clone)]
pub struct Policy {
    pub name: String,
    pub shaper: Shaper,
    interfaces: Vec<String>,
}

impl PartialEq for Policy {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.shaper == other.shaper
    }
}

impl Policy {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        let name = value.require_text(shaper_fields::ID, "policy")?;
        let shaper = Shaper::parse(value.get(shaper_fields::SHAPER).unwrap_or(&Value::Null))?;
        Ok(Self {
            name,
            shaper,
            interfaces: Vec::new(),
        })
    }

    pub fn add_interface(&mut self, ifname: &str) {
        if !self.interfaces.iter().any(|i| i == ifname) {
            self.interfaces.push(ifname.to_string());
        }
    }

    pub fn delete_interface(&mut self, ifname: &str) {
        self.interfaces.retain(|i| i != ifname);
    }

    /// Interfaces currently using this policy.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn path(&self) -> String {
        format!("{}/{}", POLICY_PATH, self.name)
    }

    pub fn check(&self, globals: &BTreeMap<String, Profile>) -> Result<(), CheckFailure> {
        self.shaper.check(&format!("{}/shaper", self.path()), globals)
    }
}
