//! QoS configuration manager daemon for SONiC.
//!
//! This crate implements the `qosmgrd` daemon, which compiles a declarative
//! QoS configuration tree into the ordered command stream consumed by the
//! forwarding dataplane.
//!
//! # Responsibilities
//!
//! - Parse policies, profiles, traffic classes, WRED maps, mark, ingress and
//!   egress maps, action groups and interface bindings into a [`QosConfig`]
//! - Fan LAG configuration out to member ports ([`BondMembership`])
//! - Validate cross-object constraints before anything is sent
//! - Diff two snapshots into `(path, command, target, operation)` tuples,
//!   ordered so shared objects never dangle ([`Provisioner`])
//!
//! # Object kinds
//!
//! | Kind | Scope | Bound by |
//! |------|-------|----------|
//! | policy | named, shared | port or VLAN |
//! | profile | global or shaper-local | pipe |
//! | mark-map | global object | shaper |
//! | ingress-map / egress-map | global object | port or VLAN |
//! | action-group | global object | match rule |
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use sonic_qosmgrd::{Provisioner, QosConfig, QosContext};
//!
//! let tree = json!({
//!     "vyatta-policy-v1:policy": {"vyatta-policy-qos-v1:qos": {
//!         "name": [{"id": "p1", "shaper": {
//!             "default": "prof", "profile": [{"id": "prof"}]
//!         }}]
//!     }},
//!     "vyatta-interfaces-v1:interfaces": {
//!         "vyatta-interfaces-dataplane-v1:dataplane": [
//!             {"tagnode": "dp0s1",
//!              "vyatta-interfaces-policy-v1:policy": {"vyatta-policy-qos-v1:qos": "p1"}}
//!         ]
//!     }
//! });
//! let new = QosConfig::new(&tree).unwrap();
//! new.check().unwrap();
//! let pass = Provisioner::new(&QosConfig::empty(), &new, &QosContext::default());
//! assert_eq!(pass.commands().last().unwrap().command, "qos commit");
//! ```

pub mod action_group;
pub mod bandwidth;
pub mod bond;
pub mod class;
pub mod config;
pub mod egress_map;
pub mod global_object;
pub mod ingress_map;
pub mod interface;
pub mod mark_map;
pub mod pipe_queue;
pub mod platform;
pub mod policer;
pub mod policy;
pub mod profile;
pub mod profile_map;
pub mod provisioner;
mod qos_mgr;
pub mod queue;
pub mod shaper;
pub mod state;
pub mod tables;
pub mod traffic_class;
pub mod units;
pub mod value_ext;
pub mod wred;

pub use action_group::ActionGroup;
pub use bond::{BondMember, BondMembership};
pub use config::QosConfig;
pub use egress_map::EgressMap;
pub use global_object::{Binding, GlobalObject};
pub use ingress_map::IngressMap;
pub use interface::{Interface, InterfaceKind, Subport};
pub use mark_map::MarkMap;
pub use platform::{LimitCapability, PlatformParams, QosContext};
pub use policy::Policy;
pub use profile::{Profile, ProfileScope};
pub use provisioner::Provisioner;
pub use qos_mgr::QosMgr;
pub use queue::{decode_qmap, encode_qmap};
pub use shaper::{ProfileIndex, Shaper};
