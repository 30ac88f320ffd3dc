//! Random early detection descriptors.

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrResult, CheckFailure};

use crate::tables::{queue_fields, tc_fields};
use crate::value_ext::ValueExt;

/// Default WRED filter weight.
pub const DEFAULT_FILTER_WEIGHT: u64 = 10;

/// Default mark probability denominator.
pub const DEFAULT_MARK_PROBABILITY: u64 = 10;

/// Packet colour, which is also the drop precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Colour {
    #[default]
    Green,
    Yellow,
    Red,
}

impl Colour {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "green" => Some(Colour::Green),
            "yellow" => Some(Colour::Yellow),
            "red" => Some(Colour::Red),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Colour::Green => "green",
            Colour::Yellow => "yellow",
            Colour::Red => "red",
        }
    }

    /// Numeric drop precedence.
    pub fn index(&self) -> u8 {
        match self {
            Colour::Green => 0,
            Colour::Yellow => 1,
            Colour::Red => 2,
        }
    }
}

/// Unit of a queue limit or WRED threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitUnit {
    Packets,
    Bytes,
    Time,
}

impl LimitUnit {
    /// Command keyword for the unit.
    pub fn keyword(&self) -> &'static str {
        match self {
            LimitUnit::Packets => "packets",
            LimitUnit::Bytes => "bytes",
            LimitUnit::Time => "msec",
        }
    }
}

fn check_thresholds(
    min: u64,
    max: u64,
    limit: Option<u64>,
    path: &str,
) -> Result<(), CheckFailure> {
    if min >= max {
        return Err(CheckFailure::new(
            format!(
                "WRED min-threshold {} must be less than max-threshold {}",
                min, max
            ),
            path,
        ));
    }
    if let Some(limit) = limit {
        if max >= limit {
            return Err(CheckFailure::new(
                format!(
                    "WRED max-threshold {} must be less than the queue limit {}",
                    max, limit
                ),
                path,
            ));
        }
    }
    Ok(())
}

/// Colour-keyed WRED on a traffic class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wred {
    pub colour: Colour,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub mark_probability: u64,
    pub filter_weight: u64,
}

impl Wred {
    /// Parses a `random-detect` container. Missing thresholds mean no WRED.
    pub fn parse(value: &Value) -> Option<Self> {
        Some(Self {
            colour: Colour::Green,
            min_threshold: value.get_u64(tc_fields::MIN_THRESHOLD)?,
            max_threshold: value.get_u64(tc_fields::MAX_THRESHOLD)?,
            mark_probability: value
                .get_u64(tc_fields::MARK_PROBABILITY)
                .unwrap_or(DEFAULT_MARK_PROBABILITY),
            filter_weight: value
                .get_u64(tc_fields::FILTER_WEIGHT)
                .unwrap_or(DEFAULT_FILTER_WEIGHT),
        })
    }

    /// Renders ` red <colour> <min> <max> <prob> wred_weight <fw>`.
    pub fn commands(&self) -> String {
        format!(
            " red {} {} {} {} wred_weight {}",
            self.colour.index(),
            self.min_threshold,
            self.max_threshold,
            self.mark_probability,
            self.filter_weight
        )
    }

    pub fn check(&self, path: &str, limit: Option<u64>) -> Result<(), CheckFailure> {
        check_thresholds(self.min_threshold, self.max_threshold, limit, path)
    }
}

/// WRED thresholds for one DSCP group of a pipe queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WredDscpGroup {
    pub group: String,
    pub min_threshold: u64,
    pub max_threshold: u64,
    pub mark_probability: u64,
}

impl WredDscpGroup {
    pub fn parse(value: &Value) -> CfgMgrResult<Self> {
        Ok(Self {
            group: value.require_text(queue_fields::GROUP_NAME, "wred-map dscp-group")?,
            min_threshold: value.get_u64(tc_fields::MIN_THRESHOLD).unwrap_or(0),
            max_threshold: value.get_u64(tc_fields::MAX_THRESHOLD).unwrap_or(0),
            mark_probability: value
                .get_u64(tc_fields::MARK_PROBABILITY)
                .unwrap_or(DEFAULT_MARK_PROBABILITY),
        })
    }

    /// Renders ` dscp-group <group> <min> <max> <prob>`.
    pub fn commands(&self) -> String {
        format!(
            " dscp-group {} {} {} {}",
            self.group, self.min_threshold, self.max_threshold, self.mark_probability
        )
    }
}

/// Per-DSCP-group WRED on a pipe queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WredMap {
    pub units: LimitUnit,
    pub filter_weight: u64,
    pub groups: Vec<WredDscpGroup>,
}

impl WredMap {
    /// Parses every WRED map configured on a queue.
    pub fn parse_all(queue: &Value) -> CfgMgrResult<Vec<Self>> {
        let kinds = [
            (queue_fields::WRED_MAP, LimitUnit::Packets),
            (queue_fields::WRED_MAP_BYTES, LimitUnit::Bytes),
            (queue_fields::WRED_MAP_TIME, LimitUnit::Time),
        ];
        let mut maps = Vec::new();
        for (key, units) in kinds {
            if let Some(map) = queue.get(key) {
                maps.push(Self::parse(map, units)?);
            }
        }
        Ok(maps)
    }

    fn parse(value: &Value, units: LimitUnit) -> CfgMgrResult<Self> {
        let groups = value
            .get_list(queue_fields::DSCP_GROUP)
            .iter()
            .map(WredDscpGroup::parse)
            .collect::<CfgMgrResult<Vec<_>>>()?;
        Ok(Self {
            units,
            filter_weight: value
                .get_u64(tc_fields::FILTER_WEIGHT)
                .unwrap_or(DEFAULT_FILTER_WEIGHT),
            groups,
        })
    }

    /// Renders ` wred_weight <fw>` followed by every group.
    pub fn commands(&self) -> String {
        let mut out = format!(" wred_weight {}", self.filter_weight);
        for group in &self.groups {
            out.push_str(&group.commands());
        }
        out
    }

    /// Checks every group against the queue limit, which is only compared
    /// when it is counted in the same unit as the map.
    pub fn check(&self, path: &str, limit: Option<(LimitUnit, u64)>) -> Result<(), CheckFailure> {
        let limit = limit.and_then(|(unit, n)| (unit == self.units).then_some(n));
        for group in &self.groups {
            check_thresholds(
                group.min_threshold,
                group.max_threshold,
                limit,
                &format!("{}/dscp-group/{}", path, group.group),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wred_render() {
        let wred = Wred::parse(&json!({
            "min-threshold": 16, "max-threshold": 32, "mark-probability": 5
        }))
        .unwrap();
        assert_eq!(wred.commands(), " red 0 16 32 5 wred_weight 10");
        assert!(wred.check("tc/0", Some(64)).is_ok());
    }

    #[test]
    fn test_wred_needs_thresholds() {
        assert_eq!(Wred::parse(&json!({"min-threshold": 16})), None);
    }

    #[test]
    fn test_wred_threshold_checks() {
        let wred = Wred::parse(&json!({"min-threshold": 32, "max-threshold": 16})).unwrap();
        let err = wred.check("tc/1", None).unwrap_err();
        assert!(err.message.contains("min-threshold"));

        let wred = Wred::parse(&json!({"min-threshold": 16, "max-threshold": 64})).unwrap();
        let err = wred.check("tc/1", Some(64)).unwrap_err();
        assert!(err.message.contains("queue limit 64"));
        assert_eq!(err.path, "tc/1");
    }

    #[test]
    fn test_wred_map_render_and_units() {
        let queue = json!({
            "wred-map-bytes": {
                "filter-weight": 12,
                "dscp-group": [
                    {"group-name": "g1", "min-threshold": 1000, "max-threshold": 5000},
                    {"group-name": "g2", "min-threshold": 2000, "max-threshold": 9000,
                     "mark-probability": 20}
                ]
            }
        });
        let maps = WredMap::parse_all(&queue).unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].units, LimitUnit::Bytes);
        assert_eq!(
            maps[0].commands(),
            " wred_weight 12 dscp-group g1 1000 5000 10 dscp-group g2 2000 9000 20"
        );

        // packet limits are not compared against byte thresholds
        assert!(maps[0].check("q/1", Some((LimitUnit::Packets, 64))).is_ok());
        let err = maps[0]
            .check("q/1", Some((LimitUnit::Bytes, 8000)))
            .unwrap_err();
        assert_eq!(err.path, "q/1/dscp-group/g2");
    }

    #[test]
    fn test_wred_map_group_requires_name() {
        let queue = json!({"wred-map": {"dscp-group": [{"min-threshold": 1}]}});
        assert!(WredMap::parse_all(&queue).is_err());
    }

    #[test]
    fn test_colour_names() {
        assert_eq!(Colour::parse("yellow"), Some(Colour::Yellow));
        assert_eq!(Colour::Red.index(), 2);
        assert_eq!(Colour::default().as_str(), "green");
    }
}
