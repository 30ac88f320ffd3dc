//! Classification maps from packet markings to pipe queues.

use std::collections::HashMap;

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, Command};
use tracing::warn;

use crate::pipe_queue::PipeQueueSet;
use crate::queue::fmt_qmap;
use crate::tables::{map_fields, shaper_fields};
use crate::units::{dscp_range, PCP_MAX};
use crate::value_ext::ValueExt;

/// What a profile map classifies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKind {
    DscpGroup,
    Dscp,
    Pcp,
    Designation,
}

impl MapKind {
    const ALL: [MapKind; 4] = [
        MapKind::DscpGroup,
        MapKind::Dscp,
        MapKind::Pcp,
        MapKind::Designation,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MapKind::DscpGroup => map_fields::DSCP_GROUP,
            MapKind::Dscp => map_fields::DSCP,
            MapKind::Pcp => map_fields::PCP,
            MapKind::Designation => map_fields::DESIGNATION,
        }
    }

    fn target_key(&self) -> &'static str {
        match self {
            MapKind::Designation => map_fields::QUEUE,
            _ => map_fields::TO,
        }
    }

    /// Drop precedence is only meaningful when several keys share a queue.
    fn counts_drop_precedence(&self) -> bool {
        matches!(self, MapKind::DscpGroup | MapKind::Designation)
    }
}

/// One `key -> pipe queue` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: String,
    pub queue: u64,
}

/// A single-kind classification map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileMap {
    pub kind: MapKind,
    pub entries: Vec<MapEntry>,
}

impl ProfileMap {
    /// Parses the `map` container of a profile.
    pub fn parse(value: &Value) -> CfgMgrResult<Option<Self>> {
        let mut present = MapKind::ALL.iter().filter(|k| value.get(k.key()).is_some());
        let Some(&kind) = present.next() else {
            return Ok(None);
        };
        if let Some(extra) = present.next() {
            warn!(kind = kind.key(), ignored = extra.key(), "Profile map has several kinds");
        }

        let mut entries = Vec::new();
        for entry in value.get_list(kind.key()) {
            let key = entry.require_text(shaper_fields::ID, kind.key())?;
            let queue = entry.require_u64(kind.target_key(), kind.key())?;
            entries.push(MapEntry { key, queue });
        }
        Ok(Some(Self { kind, entries }))
    }

    /// Entries paired with their drop precedence.
    ///
    /// For dscp-group and designation maps the n-th entry that targets a
    /// queue already used gets precedence n. Other kinds always use 0.
    pub fn with_drop_precedence(&self) -> Vec<(&MapEntry, u8)> {
        let mut seen: HashMap<u64, u8> = HashMap::new();
        self.entries
            .iter()
            .map(|entry| {
                if !self.kind.counts_drop_precedence() {
                    return (entry, 0);
                }
                let dp = seen.entry(entry.queue).or_insert(0);
                let current = *dp;
                *dp = dp.saturating_add(1);
                (entry, current)
            })
            .collect()
    }

    pub fn commands(&self, ifname: &str, profile: usize, queues: &PipeQueueSet) -> Vec<Command> {
        let mut cmds = Vec::new();
        let kind = self.kind.key();
        for (entry, dp) in self.with_drop_precedence() {
            let qmap = fmt_qmap(queues.qmap(entry.queue, dp));
            let mut push = |key: String, text: String| {
                cmds.push(Command::set(
                    format!("qos/{}/profile/{}/map/{}/{}", ifname, profile, kind, key),
                    text,
                    ifname,
                ));
            };
            match self.kind {
                MapKind::Dscp => {
                    let Some(values) = dscp_range(&entry.key) else {
                        continue;
                    };
                    for v in values {
                        push(
                            v.to_string(),
                            format!("qos {} profile {} dscp {} {}", ifname, profile, v, qmap),
                        );
                    }
                }
                MapKind::Pcp => match entry.key.parse::<u8>() {
                    Ok(v) if v <= PCP_MAX => push(
                        entry.key.clone(),
                        format!("qos {} profile {} pcp {} {}", ifname, profile, v, qmap),
                    ),
                    _ => warn!(pcp = %entry.key, "Ignoring invalid PCP map entry"),
                },
                MapKind::DscpGroup => push(
                    entry.key.clone(),
                    format!(
                        "qos {} profile {} dscp-group {} {}",
                        ifname, profile, entry.key, qmap
                    ),
                ),
                MapKind::Designation => push(
                    entry.key.clone(),
                    format!(
                        "qos {} profile {} designation {} queue {}",
                        ifname, profile, entry.key, qmap
                    ),
                ),
            }
        }
        cmds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn texts(map: &ProfileMap) -> Vec<String> {
        map.commands("lo", 1, &PipeQueueSet::default())
            .into_iter()
            .map(|c| c.command)
            .collect()
    }

    #[test]
    fn test_no_map() {
        assert_eq!(ProfileMap::parse(&json!({})).unwrap(), None);
    }

    #[test]
    fn test_dscp_group_drop_precedence() {
        let map = ProfileMap::parse(&json!({"dscp-group": [
            {"id": "g1", "to": 5},
            {"id": "g2", "to": 5},
            {"id": "g3", "to": 1},
            {"id": "g4", "to": 5}
        ]}))
        .unwrap()
        .unwrap();
        let dps: Vec<u8> = map.with_drop_precedence().iter().map(|(_, dp)| *dp).collect();
        assert_eq!(dps, vec![0, 1, 0, 2]);
        assert_eq!(
            texts(&map),
            vec![
                "qos lo profile 1 dscp-group g1 0x5",
                "qos lo profile 1 dscp-group g2 0x25",
                "qos lo profile 1 dscp-group g3 0x1",
                "qos lo profile 1 dscp-group g4 0x45",
            ]
        );
    }

    #[test]
    fn test_pcp_map_has_no_drop_precedence() {
        let map = ProfileMap::parse(&json!({"pcp": [
            {"id": 3, "to": 2}, {"id": 4, "to": 2}, {"id": 9, "to": 2}
        ]}))
        .unwrap()
        .unwrap();
        assert_eq!(
            texts(&map),
            vec!["qos lo profile 1 pcp 3 0x2", "qos lo profile 1 pcp 4 0x2"]
        );
    }

    #[test]
    fn test_dscp_map_expands_ranges() {
        let map = ProfileMap::parse(&json!({"dscp": [
            {"id": "ef", "to": 0}, {"id": "1-2", "to": 3}
        ]}))
        .unwrap()
        .unwrap();
        assert_eq!(
            texts(&map),
            vec![
                "qos lo profile 1 dscp 46 0x0",
                "qos lo profile 1 dscp 1 0x3",
                "qos lo profile 1 dscp 2 0x3",
            ]
        );
    }

    #[test]
    fn test_designation_map() {
        let map = ProfileMap::parse(&json!({"designation": [
            {"id": 0, "queue": 4}, {"id": 1, "queue": 4}
        ]}))
        .unwrap()
        .unwrap();
        assert_eq!(
            texts(&map),
            vec![
                "qos lo profile 1 designation 0 queue 0x4",
                "qos lo profile 1 designation 1 queue 0x24",
            ]
        );
    }

    #[test]
    fn test_entry_without_target_aborts_parse() {
        assert!(ProfileMap::parse(&json!({"pcp": [{"id": 1}]})).is_err());
    }
}
