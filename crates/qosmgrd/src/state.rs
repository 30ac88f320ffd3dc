//! Last applied configuration, persisted between daemon runs.
//!
//! The next diff is computed against this tree, so it must only be written
//! after every command of a pass was delivered.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};
use sonic_cfgmgr_common::{CfgMgrError, CfgMgrResult};
use tracing::{debug, info};

/// Loads the last applied tree, or an empty tree if nothing was saved yet.
pub fn load_last_applied(path: &Path) -> CfgMgrResult<Value> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No saved QoS state, starting empty");
            return Ok(json!({}));
        }
        Err(e) => return Err(CfgMgrError::io(path.display().to_string(), e)),
    };
    serde_json::from_str(&text).map_err(|e| CfgMgrError::json(path.display().to_string(), e))
}

/// Atomically replaces the saved tree.
pub fn save_last_applied(path: &Path, tree: &Value) -> CfgMgrResult<()> {
    let io_err = |e| CfgMgrError::io(path.display().to_string(), e);
    let text = serde_json::to_string_pretty(tree)
        .map_err(|e| CfgMgrError::json(path.display().to_string(), e))?;

    let tmp = path.with_extension("tmp");
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(text.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    debug!(path = %path.display(), "Saved QoS state");
    Ok(())
}
