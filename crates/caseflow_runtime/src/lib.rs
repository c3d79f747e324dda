//! caseflow_runtime
//!
//! Runtime adapter built on top of caseflow_core.
//! Owns one case execution tree, turns commands into atomic triggers,
//! logs through `tracing` and publishes settled transitions as events,
//! while keeping lifecycle semantics in `caseflow_core`.

pub mod config;
pub mod error;

mod case;
mod events;

pub use case::CaseRuntime;
pub use config::RuntimeConfig;
pub use events::CaseEvent;

// Re-export core types that runtime users will commonly need
pub use caseflow_core::error::{CoreError, Result};
pub use caseflow_core::lifecycle::{CaseExecutionState, InstanceId, Transition};
