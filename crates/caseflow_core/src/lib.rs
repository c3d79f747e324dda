//! caseflow_core: plan-item lifecycle and sentry gating for case execution trees.
//!
//! Design goals:
//! - Pure, testable logic (no IO, no async, no logging).
//! - Explicit types; guarded transitions; no implicit evaluation.
//! - Collaborators (rule language, sentry firing) plug in through traits.

pub mod error;

/// Plan item definitions, instances, guards, controller and execution tree.
pub mod lifecycle;
