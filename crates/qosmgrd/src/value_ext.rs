//! Lenient accessors for configuration subtrees.
//!
//! YANG JSON encodes numbers either as JSON numbers or as strings, and
//! presence leaves as `[null]`. These helpers hide that so parsers can treat
//! an absent or unusable value as "no object".

use serde_json::Value;
use sonic_cfgmgr_common::{CfgMgrError, CfgMgrResult};

/// Helper trait for reading fields out of a configuration subtree.
pub trait ValueExt {
    /// Gets a string field. Numbers are not converted.
    fn get_str(&self, key: &str) -> Option<&str>;

    /// Gets an unsigned integer field given as a number or numeric string.
    fn get_u64(&self, key: &str) -> Option<u64>;

    /// Gets a field rendered as text, whatever its JSON type.
    fn get_text(&self, key: &str) -> Option<String>;

    /// Gets a list field, or an empty slice if absent.
    fn get_list(&self, key: &str) -> &[Value];

    /// Returns true if a presence leaf or `true` boolean is set.
    fn has_flag(&self, key: &str) -> bool;

    /// Gets a required key as text, failing parsing when it is absent.
    fn require_text(&self, key: &str, context: &str) -> CfgMgrResult<String>;

    /// Gets a required unsigned integer, failing parsing when it is absent or
    /// not a number.
    fn require_u64(&self, key: &str, context: &str) -> CfgMgrResult<u64>;
}

impl ValueExt for Value {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        match self.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn get_text(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn get_list(&self, key: &str) -> &[Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn has_flag(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | Some(Value::Array(_)) | Some(Value::Object(_)) => true,
            _ => false,
        }
    }

    fn require_text(&self, key: &str, context: &str) -> CfgMgrResult<String> {
        self.get_text(key)
            .ok_or_else(|| CfgMgrError::invalid_config(context, format!("missing '{}'", key)))
    }

    fn require_u64(&self, key: &str, context: &str) -> CfgMgrResult<u64> {
        self.get_u64(key).ok_or_else(|| {
            CfgMgrError::invalid_config(context, format!("'{}' must be an unsigned integer", key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_as_strings() {
        let v = json!({"a": 64, "b": "24", "c": "x"});
        assert_eq!(v.get_u64("a"), Some(64));
        assert_eq!(v.get_u64("b"), Some(24));
        assert_eq!(v.get_u64("c"), None);
        assert_eq!(v.get_u64("missing"), None);
        assert_eq!(v.get_text("a").as_deref(), Some("64"));
    }

    #[test]
    fn test_presence_flags() {
        let v = json!({"p": [null], "t": true, "f": false});
        assert!(v.has_flag("p"));
        assert!(v.has_flag("t"));
        assert!(!v.has_flag("f"));
        assert!(!v.has_flag("missing"));
    }

    #[test]
    fn test_lists_default_to_empty() {
        let v = json!({"l": [1, 2], "s": "not-a-list"});
        assert_eq!(v.get_list("l").len(), 2);
        assert!(v.get_list("s").is_empty());
        assert!(v.get_list("missing").is_empty());
    }

    #[test]
    fn test_required_keys() {
        let v = json!({"id": "p1"});
        assert_eq!(v.require_text("id", "policy").unwrap(), "p1");
        let err = v.require_u64("id", "traffic-class").unwrap_err();
        assert!(err.to_string().contains("traffic-class"));
    }
}
