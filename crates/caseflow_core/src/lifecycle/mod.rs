//! caseflow_core::lifecycle
//!
//! Plan-item lifecycle semantics for one case execution tree.
//! This module contains **no** IO, async or logging.
//!
//! Key ideas:
//! - Two-field state: stable state + optional transient marker (SUSPENDING / TERMINATING)
//! - Table-driven guards per plan item kind; guards run before any mutation
//! - Sentry satisfaction is a flag set from outside; the controller only reads it
//! - Cascades run synchronously inside one trigger, bounded by `CascadePolicy`

pub mod controller;
mod definition;
mod graph;
mod guard;
mod hooks;
mod instance;
mod rule;
mod sentry;
mod state;
mod transition;
mod tree;

pub use controller::CompletionRule;
pub use definition::{CaseControlRule, OnPart, PlanItemDefinition, PlanItemKind, SentryDeclaration};
pub use graph::{
    available_transitions, transition_graph, transition_rule, TransitionEdge, TransitionGraph,
    TransitionRule,
};
pub use guard::{
    ensure_is_case_instance, ensure_is_not_case_instance, ensure_supported,
    ensure_transition_allowed, ensure_transition_allowed_from,
};
pub use hooks::{LifecycleHooks, MilestoneBehavior, PlanItemBehavior, StageBehavior, TaskBehavior};
pub use instance::{InstanceId, PlanItemInstance};
pub use rule::{
    apply_repetition_rule, apply_required_rule, evaluate_manual_activation_rule,
    rule_evaluation_error, CaseVariables, FnRuleEvaluator, RuleContext, RuleEvaluator,
    VariableValue,
};
pub use sentry::{
    applicable_entry_criteria, is_entry_satisfied, is_exit_satisfied, SentryListener,
    SentrySignal,
};
pub use state::{CaseExecutionState, ExecutionState, TransientMarker, ALL_STATES};
pub use transition::{Transition, ALL_TRANSITIONS};
pub use tree::{
    Arena, CascadePolicy, Checkpoint, ExecutionTree, InstanceSnapshot, TransitionRecord,
};
