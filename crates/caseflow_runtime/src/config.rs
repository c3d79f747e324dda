use std::env;

use caseflow_core::lifecycle::CascadePolicy;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Runtime knobs. Defaults apply wherever the environment is silent or unparseable.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RuntimeConfig {
    pub cascade: CascadePolicy,
    /// Buffer of the event broadcast channel; lagging receivers lose old events.
    pub event_capacity: usize,
    /// Restore the tree when a trigger fails part-way through a cascade.
    pub rollback: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cascade: CascadePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            rollback: true,
        }
    }
}

impl RuntimeConfig {
    /// Read `CASEFLOW_MAX_CASCADE_DEPTH`, `CASEFLOW_EVENT_CAPACITY` and `CASEFLOW_ROLLBACK`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_depth = env::var("CASEFLOW_MAX_CASCADE_DEPTH")
            .ok()
            .and_then(parse_count)
            .unwrap_or(defaults.cascade.max_depth);
        let event_capacity = env::var("CASEFLOW_EVENT_CAPACITY")
            .ok()
            .and_then(parse_count)
            .unwrap_or(defaults.event_capacity);
        let rollback = env::var("CASEFLOW_ROLLBACK")
            .ok()
            .and_then(parse_bool)
            .unwrap_or(defaults.rollback);

        Self {
            cascade: CascadePolicy { max_depth },
            event_capacity,
            rollback,
        }
    }
}

pub fn parse_bool(value: String) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Positive integer; zero is rejected (a zero-capacity channel is invalid).
pub fn parse_count(value: String) -> Option<usize> {
    value.trim().parse().ok().filter(|n| *n > 0)
}
