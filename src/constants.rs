//! # System Constants
//!
//! Event names published on the telemetry bus, baseline configuration values
//! and the names of the built-in configuration profiles.

/// Telemetry event names published on the event bus
pub mod events {
    // Circuit lifecycle events
    pub const CIRCUIT_CREATED: &str = "circuit.created";
    pub const CIRCUIT_STATE_CHANGED: &str = "circuit.state_changed";
    pub const CIRCUIT_RESET: &str = "circuit.reset";

    // Call outcome events
    pub const CALL_ADMITTED: &str = "call.admitted";
    pub const CALL_SUCCEEDED: &str = "call.succeeded";
    pub const CALL_FAILED: &str = "call.failed";
    pub const CALL_TIMED_OUT: &str = "call.timed_out";
    pub const CALL_REJECTED: &str = "call.rejected";

    // Bulkhead events
    pub const BULKHEAD_ACCEPTED: &str = "bulkhead.accepted";
    pub const BULKHEAD_REJECTED: &str = "bulkhead.rejected";

    // Configuration events
    pub const CONFIG_UPDATED: &str = "config.updated";
}

/// Built-in baseline applied to resources with no prior configuration
pub mod defaults {
    pub const FAILURE_THRESHOLD: u32 = 5;
    pub const SUCCESS_THRESHOLD: u32 = 3;
    pub const RESET_TIMEOUT_MS: u64 = 30_000;
    pub const CALL_TIMEOUT_MS: u64 = 30_000;
    pub const MAX_CONCURRENT: u32 = 10;
    pub const MAX_QUEUED: u32 = 50;
    pub const QUEUE_TIMEOUT_MS: u64 = 5_000;

    pub const HISTORY_LIMIT: usize = 50;
    pub const EVENT_CHANNEL_CAPACITY: usize = 1000;
    pub const ALERT_FAILURE_RATE: f64 = 0.5;
}

/// Names of the profiles registered at startup
pub mod profiles {
    pub const CONSERVATIVE: &str = "conservative";
    pub const AGGRESSIVE: &str = "aggressive";
    pub const BALANCED: &str = "balanced";
    pub const HIGH_THROUGHPUT: &str = "high_throughput";
    pub const EXPERIMENTAL: &str = "experimental";

    pub const BUILT_IN: [&str; 5] = [
        CONSERVATIVE,
        AGGRESSIVE,
        BALANCED,
        HIGH_THROUGHPUT,
        EXPERIMENTAL,
    ];
}

/// Source recorded on a `config.updated` event
pub mod config_sources {
    pub const INITIAL: &str = "initial";
    pub const UPDATE: &str = "update";
    pub const PROFILE: &str = "profile";
    pub const ROLLBACK: &str = "rollback";
    pub const RESET_TO_DEFAULT: &str = "reset_to_default";
    pub const DYNAMIC: &str = "dynamic";
}
