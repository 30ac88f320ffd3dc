//! Configuration tree key constants

// Top level containers
pub const POLICY: &str = "vyatta-policy-v1:policy";
pub const QOS: &str = "vyatta-policy-qos-v1:qos";
pub const ACTION: &str = "vyatta-policy-action-v1:action";
pub const RESOURCES: &str = "vyatta-resources-v1:resources";
pub const RESOURCE_GROUP: &str = "vyatta-resources-group-misc-v1:group";
pub const DSCP_GROUP: &str = "vyatta-resources-dscp-group-v1:dscp-group";
pub const INTERFACES: &str = "vyatta-interfaces-v1:interfaces";
pub const DATAPLANE: &str = "vyatta-interfaces-dataplane-v1:dataplane";
pub const BONDING: &str = "vyatta-interfaces-bonding-v1:bonding";

// Interface level bindings
pub mod interface_fields {
    pub const TAGNODE: &str = "tagnode";
    pub const VIF: &str = "vif";
    pub const POLICY: &str = "vyatta-interfaces-policy-v1:policy";
    pub const QOS: &str = "vyatta-policy-qos-v1:qos";
    pub const INGRESS_MAP: &str = "vyatta-policy-qos-v1:ingress-map";
    pub const EGRESS_MAP: &str = "vyatta-policy-qos-v1:egress-map";
}

// Lists below the qos container
pub mod qos_fields {
    pub const NAME: &str = "name";
    pub const PROFILE: &str = "profile";
    pub const MARK_MAP: &str = "mark-map";
    pub const INGRESS_MAP: &str = "ingress-map";
    pub const EGRESS_MAP: &str = "egress-map";
    pub const PLATFORM: &str = "platform";
    pub const BUFFER_THRESHOLD: &str = "buffer-threshold";
    pub const LP_DESIGNATION: &str = "local-priority-designation";
}

// Fields shared by shapers, profiles and traffic classes
pub mod shaper_fields {
    pub const ID: &str = "id";
    pub const SHAPER: &str = "shaper";
    pub const BANDWIDTH: &str = "bandwidth";
    pub const BURST: &str = "burst";
    pub const BURST_MSEC: &str = "burst-msec";
    pub const PERIOD: &str = "period";
    pub const FRAME_OVERHEAD: &str = "frame-overhead";
    pub const DEFAULT: &str = "default";
    pub const MARK_MAP: &str = "mark-map";
    pub const TRAFFIC_CLASS: &str = "traffic-class";
    pub const PROFILE: &str = "profile";
    pub const CLASS: &str = "class";
    pub const QUEUE: &str = "queue";
    pub const MAP: &str = "map";
}

// Traffic class queue limits and WRED
pub mod tc_fields {
    pub const QUEUE_LIMIT: &str = "queue-limit";
    pub const QUEUE_LIMIT_BYTES: &str = "queue-limit-bytes";
    pub const QUEUE_LIMIT_TIME: &str = "queue-limit-time";
    pub const RANDOM_DETECT: &str = "random-detect";
    pub const MIN_THRESHOLD: &str = "min-threshold";
    pub const MAX_THRESHOLD: &str = "max-threshold";
    pub const MARK_PROBABILITY: &str = "mark-probability";
    pub const FILTER_WEIGHT: &str = "filter-weight";
}

// Pipe queue descriptors
pub mod queue_fields {
    pub const WEIGHT: &str = "weight";
    pub const PRIORITY_LOCAL: &str = "priority-local";
    pub const WRED_MAP: &str = "wred-map";
    pub const WRED_MAP_BYTES: &str = "wred-map-bytes";
    pub const WRED_MAP_TIME: &str = "wred-map-time";
    pub const GROUP_NAME: &str = "group-name";
    pub const DSCP_GROUP: &str = "dscp-group";
}

// Profile map kinds
pub mod map_fields {
    pub const DSCP_GROUP: &str = "dscp-group";
    pub const DSCP: &str = "dscp";
    pub const PCP: &str = "pcp";
    pub const DESIGNATION: &str = "designation";
    pub const TO: &str = "to";
    pub const QUEUE: &str = "queue";
    pub const DROP_PRECEDENCE: &str = "drop-precedence";
    pub const PCP_MARK: &str = "pcp-mark";
    pub const SYSTEM_DEFAULT: &str = "system-default";
    pub const GROUP_NAME: &str = "group-name";
}

// Class match rules
pub mod rule_fields {
    pub const MATCH: &str = "match";
    pub const ACTION: &str = "action";
    pub const PROTOCOL: &str = "protocol";
    pub const SOURCE: &str = "source";
    pub const DESTINATION: &str = "destination";
    pub const ADDRESS: &str = "address";
    pub const PORT: &str = "port";
    pub const DSCP: &str = "dscp";
    pub const PCP: &str = "pcp";
    pub const MARK: &str = "mark";
    pub const POLICE: &str = "police";
    pub const ACTION_GROUP: &str = "action-group";
    pub const LOG: &str = "log";
}

// Policer
pub mod policer_fields {
    pub const BANDWIDTH: &str = "bandwidth";
    pub const RATELIMIT: &str = "ratelimit";
    pub const BURST: &str = "burst";
    pub const FRAME_OVERHEAD: &str = "frame-overhead";
    pub const TC: &str = "tc";
    pub const THEN: &str = "then";
    pub const ACTION: &str = "action";
    pub const MARK: &str = "mark";
    pub const DSCP: &str = "dscp";
    pub const PCP: &str = "pcp";
}

/// Keyword addressing shared objects in the command grammar.
pub const GLOBAL_OBJECT_CMD: &str = "global-object-cmd";

/// Path prefix for policy configuration, used in check failures.
pub const POLICY_PATH: &str = "policy/qos/name";

/// Path prefix for global profiles, used in check failures.
pub const GLOBAL_PROFILE_PATH: &str = "policy/qos/profile";
