//! Classifier classes and their match rules.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure, Command};
use tracing::warn;

use crate::policer::{Marking, Policer};
use crate::tables::{rule_fields, shaper_fields};
use crate::units::{dscp_value, protocol_number, PCP_MAX};
use crate::value_ext::ValueExt;

/// What happens to a matching packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleAction {
    #[default]
    Accept,
    Drop,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Accept => "accept",
            RuleAction::Drop => "drop",
        }
    }
}

/// Address and port of one side of a flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoint {
    pub address: Option<String>,
    pub port: Option<String>,
}

impl Endpoint {
    fn parse(value: Option<&Value>) -> Self {
        match value {
            Some(v) => Self {
                address: v.get_text(rule_fields::ADDRESS),
                port: v.get_text(rule_fields::PORT),
            },
            None => Self::default(),
        }
    }
}

/// One match rule of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub action: RuleAction,
    pub protocol: Option<u8>,
    pub source: Endpoint,
    pub destination: Endpoint,
    pub dscp: Option<u8>,
    pub pcp: Option<u8>,
    pub mark: Option<Marking>,
    pub police: Option<Policer>,
    pub action_group: Option<String>,
    pub log: bool,
}

impl Rule {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        let id = value.require_text(shaper_fields::ID, "match")?;
        let action = match value.get_str(rule_fields::ACTION) {
            Some("drop") => RuleAction::Drop,
            _ => RuleAction::Accept,
        };
        let pcp = value.get_u64(rule_fields::PCP).and_then(|p| {
            if p <= u64::from(PCP_MAX) {
                Some(p as u8)
            } else {
                warn!(rule = %id, pcp = p, "Ignoring out of range PCP match");
                None
            }
        });

        Ok(Self {
            action,
            protocol: value
                .get_text(rule_fields::PROTOCOL)
                .and_then(|p| protocol_number(&p)),
            source: Endpoint::parse(value.get(rule_fields::SOURCE)),
            destination: Endpoint::parse(value.get(rule_fields::DESTINATION)),
            dscp: value
                .get_text(rule_fields::DSCP)
                .and_then(|d| dscp_value(&d)),
            pcp,
            mark: value.get(rule_fields::MARK).and_then(Marking::parse),
            police: value.get(rule_fields::POLICE).map(Policer::parse),
            action_group: value.get_text(rule_fields::ACTION_GROUP),
            log: value.has_flag(rule_fields::LOG),
            id,
        })
    }

    /// Result processing chain, e.g. `markdscp(10);policer(...)`.
    fn rproc(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(mark) = &self.mark {
            parts.push(mark.rproc());
        }
        if let Some(police) = &self.police {
            parts.push(police.descriptor());
        }
        if let Some(group) = &self.action_group {
            parts.push(format!("action-group({})", group));
        }
        (!parts.is_empty()).then(|| parts.join(";"))
    }

    /// Renders the rule for a match line of `class`.
    pub fn render(&self, class: u64) -> String {
        let mut out = format!("action={}", self.action.as_str());
        if let Some(proto) = self.protocol {
            out.push_str(&format!(" proto-final={}", proto));
        }
        if let Some(addr) = &self.source.address {
            out.push_str(&format!(" src-addr={}", addr));
        }
        if let Some(port) = &self.source.port {
            out.push_str(&format!(" src-port={}", port));
        }
        if let Some(addr) = &self.destination.address {
            out.push_str(&format!(" dst-addr={}", addr));
        }
        if let Some(port) = &self.destination.port {
            out.push_str(&format!(" dst-port={}", port));
        }
        if let Some(dscp) = self.dscp {
            out.push_str(&format!(" dscp={}", dscp));
        }
        if let Some(pcp) = self.pcp {
            out.push_str(&format!(" pcp={}", pcp));
        }
        out.push_str(&format!(" handle=tag({})", class));
        if let Some(rproc) = self.rproc() {
            out.push_str(&format!(" rproc={}", rproc));
        }
        if self.log {
            out.push_str(" log=1");
        }
        out
    }
}

/// A class binding match rules to a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    pub id: u64,
    pub profile: String,
    pub rules: Vec<Rule>,
}

impl Class {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        Ok(Self {
            id: value.require_u64(shaper_fields::ID, "class")?,
            profile: value.get_text(shaper_fields::PROFILE).unwrap_or_default(),
            rules: value
                .get_list(rule_fields::MATCH)
                .iter()
                .map(Rule::parse)
                .collect::<CfgMgrResult<_>>()?,
        })
    }

    /// Action groups referenced by any rule.
    pub fn action_groups(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|r| r.action_group.as_deref())
    }

    pub fn check(&self, path: &str) -> Result<(), CheckFailure> {
        if self.id == 0 {
            return Err(CheckFailure::new(
                "Class id must be greater than 0, class 0 is the default class",
                path,
            ));
        }
        for rule in &self.rules {
            if let Some(police) = &rule.police {
                police.check(&format!("{}/match/{}/police", path, rule.id))?;
            }
        }
        Ok(())
    }

    pub fn commands(&self, ifname: &str, subport: u32) -> Vec<Command> {
        self.rules
            .iter()
            .map(|rule| {
                Command::set(
                    format!("qos/{}/match/{}/{}/{}", ifname, subport, self.id, rule.id),
                    format!(
                        "qos {} match {} {} {}",
                        ifname,
                        subport,
                        self.id,
                        rule.render(self.id)
                    ),
                    ifname,
                )
            })
            .collect()
    }
}
