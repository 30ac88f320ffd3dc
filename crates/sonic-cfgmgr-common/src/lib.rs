//! Common infrastructure for SONiC configuration manager daemons.
//!
//! This crate provides shared functionality for the cfgmgr daemons that
//! compile configuration into dataplane commands:
//!
//! - [`error`]: Error types for cfgmgr operations, including the
//!   [`CheckFailure`] reported by structural validation
//! - [`sink`]: The `(path, command, target, operation)` tuple and the
//!   [`CommandSink`] / [`Dataplanes`] boundary to the dataplane store
//!
//! # Example
//!
//! ```
//! use sonic_cfgmgr_common::{CommandSink, Operation, RecordingSink};
//!
//! let mut sink = RecordingSink::new();
//! sink.store("qos/commit", "qos commit", "ALL", Operation::Set).unwrap();
//! assert_eq!(sink.texts(), vec!["qos commit"]);
//! ```

pub mod error;
pub mod sink;

// Re-export commonly used items at crate root
pub use error::{CfgMgrError, CfgMgrResult, CheckFailure};
pub use sink::{Command, CommandSink, Dataplanes, Operation, RecordingSink, TARGET_ALL};
