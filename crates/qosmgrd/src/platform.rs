//! Platform capabilities and platform-wide QoS parameters.

use serde_json::Value;
use sonic_cfgmgr_common::{Command, TARGET_ALL};
use tracing::warn;

use crate::tables::{qos_fields, GLOBAL_OBJECT_CMD};
use crate::value_ext::ValueExt;

/// Default queue limit in packets.
pub const DEFAULT_QUEUE_LIMIT_PACKETS: u64 = 64;

/// Default queue limit in bytes on byte-limit platforms.
pub const DEFAULT_QUEUE_LIMIT_BYTES: u64 = 96_000;

/// Unit the dataplane uses for default queue limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitCapability {
    /// Queue limits are counted in packets.
    #[default]
    Packets,
    /// Queue limits are counted in bytes.
    Bytes,
}

impl LimitCapability {
    /// Parses a capability name (`packets`, `bytes`, `packet-limits`,
    /// `byte-limits`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "packets" | "packet" | "packet-limits" => Some(Self::Packets),
            "bytes" | "byte" | "byte-limits" => Some(Self::Bytes),
            _ => None,
        }
    }

    /// Reads the capability from the `QOS_LIMIT_CAPABILITY` environment
    /// variable, falling back to packets.
    pub fn from_env() -> Self {
        match std::env::var("QOS_LIMIT_CAPABILITY") {
            Ok(val) => Self::parse(&val).unwrap_or_else(|| {
                warn!(value = %val, "Unknown QOS_LIMIT_CAPABILITY, using packets");
                Self::Packets
            }),
            Err(_) => Self::Packets,
        }
    }

    /// Port-level default queue limit token, e.g. `ql_packets 64`.
    pub fn port_token(&self) -> String {
        match self {
            Self::Packets => format!("ql_packets {}", DEFAULT_QUEUE_LIMIT_PACKETS),
            Self::Bytes => format!("ql_bytes {}", DEFAULT_QUEUE_LIMIT_BYTES),
        }
    }
}

/// Context shared by every command generator during one reconciliation
/// pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QosContext {
    /// Queue limit unit supported by the dataplane.
    pub limits: LimitCapability,
}

impl QosContext {
    /// Creates a context for the given capability.
    pub fn new(limits: LimitCapability) -> Self {
        Self { limits }
    }

    /// Creates a context from the process environment.
    pub fn from_env() -> Self {
        Self::new(LimitCapability::from_env())
    }
}

/// Platform-wide switches that affect every port.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformParams {
    /// Shared buffer threshold in percent.
    pub buffer_threshold: Option<u64>,
    /// Designation treated as local priority.
    pub lp_designation: Option<u64>,
}

impl PlatformParams {
    /// Parses the `platform` container below the qos node.
    pub fn parse(qos: &Value) -> Self {
        let Some(platform) = qos.get(qos_fields::PLATFORM) else {
            return Self::default();
        };
        Self {
            buffer_threshold: platform.get_u64(qos_fields::BUFFER_THRESHOLD),
            lp_designation: platform.get_u64(qos_fields::LP_DESIGNATION),
        }
    }

    /// Computes the commands migrating `old` to `new`.
    ///
    /// Returns `(deletes, creates)`.
    pub fn diff(old: &Self, new: &Self) -> (Vec<Command>, Vec<Command>) {
        let mut deletes = Vec::new();
        let mut creates = Vec::new();
        diff_param(
            "buf-threshold",
            old.buffer_threshold,
            new.buffer_threshold,
            &mut deletes,
            &mut creates,
        );
        diff_param(
            "lp-des",
            old.lp_designation,
            new.lp_designation,
            &mut deletes,
            &mut creates,
        );
        (deletes, creates)
    }
}

fn diff_param(
    keyword: &str,
    old: Option<u64>,
    new: Option<u64>,
    deletes: &mut Vec<Command>,
    creates: &mut Vec<Command>,
) {
    let path = format!("qos/global-object/{}", keyword);
    match (old, new) {
        (Some(_), None) => deletes.push(Command::delete(
            path,
            format!("qos {} {} delete", GLOBAL_OBJECT_CMD, keyword),
            TARGET_ALL,
        )),
        (old, Some(value)) if old != Some(value) => creates.push(Command::set(
            path,
            format!("qos {} {} {}", GLOBAL_OBJECT_CMD, keyword, value),
            TARGET_ALL,
        )),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_capability_parse() {
        assert_eq!(LimitCapability::parse("bytes"), Some(LimitCapability::Bytes));
        assert_eq!(
            LimitCapability::parse("packet-limits"),
            Some(LimitCapability::Packets)
        );
        assert_eq!(LimitCapability::parse("frames"), None);
        assert_eq!(LimitCapability::default(), LimitCapability::Packets);
    }

    #[test]
    fn test_port_token() {
        assert_eq!(LimitCapability::Packets.port_token(), "ql_packets 64");
        assert_eq!(LimitCapability::Bytes.port_token(), "ql_bytes 96000");
    }

    #[test]
    fn test_parse_platform_params() {
        let qos = json!({"platform": {"buffer-threshold": 80, "local-priority-designation": "7"}});
        let params = PlatformParams::parse(&qos);
        assert_eq!(params.buffer_threshold, Some(80));
        assert_eq!(params.lp_designation, Some(7));
        assert_eq!(PlatformParams::parse(&json!({})), PlatformParams::default());
    }

    #[test]
    fn test_diff_create_change_delete() {
        let none = PlatformParams::default();
        let a = PlatformParams {
            buffer_threshold: Some(80),
            lp_designation: None,
        };
        let b = PlatformParams {
            buffer_threshold: Some(60),
            lp_designation: None,
        };

        let (deletes, creates) = PlatformParams::diff(&none, &a);
        assert!(deletes.is_empty());
        assert_eq!(creates[0].command, "qos global-object-cmd buf-threshold 80");

        let (deletes, creates) = PlatformParams::diff(&a, &b);
        assert!(deletes.is_empty());
        assert_eq!(creates[0].command, "qos global-object-cmd buf-threshold 60");

        let (deletes, creates) = PlatformParams::diff(&b, &none);
        assert!(creates.is_empty());
        assert_eq!(
            deletes[0].command,
            "qos global-object-cmd buf-threshold delete"
        );

        let (deletes, creates) = PlatformParams::diff(&a, &a);
        assert!(deletes.is_empty() && creates.is_empty());
    }
}
