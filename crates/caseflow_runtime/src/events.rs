//! Case event types.
//!
//! One event per settled transition, in the order the tree settled them.
//! Consumers (audit trails, sentry subsystems, UIs) subscribe through
//! [`CaseRuntime::subscribe_events`](crate::CaseRuntime::subscribe_events).

use caseflow_core::lifecycle::TransitionRecord;

/// Emitted after a trigger was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseEvent {
    pub case: String,
    pub record: TransitionRecord,
}
