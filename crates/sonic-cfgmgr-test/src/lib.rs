//! Integration test infrastructure for SONiC configuration managers
//!
//! Provides:
//! - Configuration tree builders for QoS scenarios
//! - LAG membership notification payloads
//! - Command stream verification helpers

pub mod fixtures;
mod verification;

pub use fixtures::*;
pub use verification::*;
