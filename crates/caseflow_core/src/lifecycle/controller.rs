//! Lifecycle controller: guarded operations on one instance of an execution tree.
//!
//! Every operation checks all guards first, then mutates. Operations may
//! cascade into other instances (child instantiation, parent auto-completion,
//! sentry signals); each nested operation counts against the tree's
//! [`CascadePolicy`](super::CascadePolicy).

use std::sync::Arc;

use crate::error::{CoreError, Result};

use super::CaseExecutionState::{self, *};
use super::tree::holds_live_children;
use super::{
    apply_repetition_rule, apply_required_rule, ensure_is_case_instance,
    ensure_is_not_case_instance, ensure_supported, ensure_transition_allowed_from,
    evaluate_manual_activation_rule, is_entry_satisfied, is_exit_satisfied, ExecutionTree,
    InstanceId, LifecycleHooks, PlanItemBehavior, PlanItemInstance, PlanItemKind,
    TransientMarker, Transition, TransitionRule,
};

/// Which children must be finished before a stage may complete.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CompletionRule {
    /// No child active, new or in flight, and every required child finished.
    RequiredOnly,
    /// Every child disabled, completed or terminated.
    All,
}

// ---------------- Creation and sentries ----------------

/// NEW -> AVAILABLE, applying the required and repetition rules once each.
pub fn create(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let rule = check(tree, id, Transition::Create)?;
        behavior(tree, id)?.creating(tree, id)?;
        apply_required_rule(tree, id)?;
        apply_repetition_rule(tree, id)?;
        tree.settle(id, Transition::Create, rule.to)?;
        created(tree, id)
    })
}

/// Satisfaction check that follows creation: exit wins over entry.
///
/// Deferred while the parent is not active; resuming the parent re-runs it.
pub fn created(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        if !settled_in(inst, Available) || !parent_active(tree, inst)? {
            return Ok(());
        }
        if is_exit_satisfied(inst) {
            fire_exit_criteria(tree, id)
        } else if is_entry_satisfied(inst)? {
            fire_entry_criteria(tree, id)
        } else {
            Ok(())
        }
    })
}

/// Entry criteria satisfied: move an AVAILABLE item on. Ignored otherwise,
/// and while the parent is not active (the flag stays set for the resume).
pub fn fire_entry_criteria(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        if !settled_in(inst, Available) || !parent_active(tree, inst)? {
            return Ok(());
        }
        match inst.kind()? {
            PlanItemKind::Milestone => occur(tree, id),
            PlanItemKind::CasePlan => start(tree, id),
            PlanItemKind::Task | PlanItemKind::Stage => {
                if evaluate_manual_activation_rule(tree, id)? {
                    enable(tree, id)
                } else {
                    start(tree, id)
                }
            }
        }
    })
}

/// Exit criteria satisfied: exit a live plan item. Ignored for the case
/// instance and for items already finished or terminating.
pub fn fire_exit_criteria(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        let state = inst.execution_state();
        if inst.is_case_instance()
            || inst.state() == New
            || state.current().is_terminal()
            || state.is_terminating()
        {
            return Ok(());
        }
        exit(tree, id)
    })
}

// ---------------- Activation ----------------

/// AVAILABLE -> ENABLED, awaiting a manual start.
pub fn enable(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    simple(tree, id, Transition::Enable)
}

/// ENABLED -> DISABLED; a disabled item counts as finished for its parent.
pub fn disable(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        simple(tree, id, Transition::Disable)?;
        notify_parent(tree, id)
    })
}

/// DISABLED -> ENABLED.
pub fn reenable(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    simple(tree, id, Transition::Reenable)
}

/// AVAILABLE -> ACTIVE; a stage instantiates its children.
pub fn start(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    activate(tree, id, Transition::Start)
}

/// ENABLED -> ACTIVE.
pub fn manual_start(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    activate(tree, id, Transition::ManualStart)
}

fn activate(tree: &mut ExecutionTree, id: InstanceId, transition: Transition) -> Result<()> {
    nested(tree, |tree| {
        let rule = check(tree, id, transition)?;
        tree.settle(id, transition, rule.to)?;
        behavior(tree, id)?.started(tree, id)
    })
}

// ---------------- Completion ----------------

pub fn complete(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    finish(tree, id, Transition::Complete)
}

pub fn manual_complete(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    finish(tree, id, Transition::ManualComplete)
}

/// Milestone reached: AVAILABLE -> COMPLETED.
pub fn occur(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let rule = check(tree, id, Transition::Occur)?;
        tree.settle(id, Transition::Occur, rule.to)?;
        after_completion(tree, id)
    })
}

fn finish(tree: &mut ExecutionTree, id: InstanceId, transition: Transition) -> Result<()> {
    nested(tree, |tree| {
        let rule = check(tree, id, transition)?;
        if tree.get(id)?.kind()?.is_container()
            && !can_complete(tree, id, CompletionRule::RequiredOnly)?
        {
            return Err(CoreError::children_not_finished(transition.label(), id));
        }

        let hooks = behavior(tree, id)?;
        if transition == Transition::ManualComplete {
            hooks.manual_completing(tree, id)?;
        } else {
            hooks.completing(tree, id)?;
        }

        // A cascade started by the hook may already have moved the item.
        if !settled_in(tree.get(id)?, Active) {
            return Ok(());
        }

        tree.settle(id, transition, rule.to)?;
        after_completion(tree, id)
    })
}

fn after_completion(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    apply_repetition_rule(tree, id)?;
    let parent_live = match tree.get(id)?.parent() {
        Some(parent) => holds_live_children(tree.get(parent)?),
        None => false,
    };
    if parent_live {
        repeat(tree, id)?;
    }
    notify_parent(tree, id)
}

/// Whether the children of `id` allow it to complete under `rule`.
pub fn can_complete(tree: &ExecutionTree, id: InstanceId, rule: CompletionRule) -> Result<bool> {
    for &child in tree.get(id)?.children() {
        let child = tree.get(child)?;
        let state = child.state();
        if child.execution_state().is_transient() || matches!(state, New | Active) {
            return Ok(false);
        }
        let must_finish = match rule {
            CompletionRule::All => true,
            CompletionRule::RequiredOnly => child.is_required(),
        };
        if must_finish && !state.is_finished() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Complete an active stage or case plan whose children allow it.
pub fn check_auto_completion(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    let inst = tree.get(id)?;
    if !inst.kind()?.is_container() || !settled_in(inst, Active) {
        return Ok(());
    }

    let rule = if inst.definition()?.auto_complete {
        CompletionRule::RequiredOnly
    } else {
        CompletionRule::All
    };
    if can_complete(tree, id, rule)? {
        complete(tree, id)?;
    }
    Ok(())
}

fn notify_parent(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    match tree.get(id)?.parent() {
        Some(parent) => check_auto_completion(tree, parent),
        None => Ok(()),
    }
}

// ---------------- Termination ----------------

pub fn terminate(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        check(tree, id, Transition::Terminate)?;
        mark(tree, id, TransientMarker::Terminating)?;
        tree.perform_terminate(id)?;
        notify_parent(tree, id)
    })
}

/// Terminate propagated from the parent; the parent is not notified.
pub fn parent_terminate(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        check(tree, id, Transition::ParentTerminate)?;
        mark(tree, id, TransientMarker::Terminating)?;
        tree.perform_parent_terminate(id)
    })
}

/// Terminate triggered by an exit sentry.
pub fn exit(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        check(tree, id, Transition::Exit)?;
        mark(tree, id, TransientMarker::Terminating)?;
        tree.perform_exit(id)?;
        notify_parent(tree, id)
    })
}

// ---------------- Suspension ----------------

/// Suspend the item and its live descendants.
pub fn suspend(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        check(tree, id, Transition::Suspend)?;
        ensure_not_terminating(tree.get(id)?, Transition::Suspend)?;
        mark(tree, id, TransientMarker::Suspending)?;
        tree.perform_suspension(id)
    })
}

pub fn parent_suspend(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        check(tree, id, Transition::ParentSuspend)?;
        ensure_not_terminating(tree.get(id)?, Transition::ParentSuspend)?;
        mark(tree, id, TransientMarker::Suspending)?;
        tree.perform_parent_suspension(id)
    })
}

/// Resume a suspended item. A plan item only resumes under an active parent.
pub fn resume(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    restore_from_suspension(tree, id, Transition::Resume)
}

pub fn parent_resume(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    restore_from_suspension(tree, id, Transition::ParentResume)
}

fn restore_from_suspension(
    tree: &mut ExecutionTree,
    id: InstanceId,
    transition: Transition,
) -> Result<()> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        let rule = supported(inst, transition)?;
        let target = inst.resume_state().unwrap_or(rule.to);
        ensure_transition_allowed_from(inst, rule.from, target, transition)?;
        if transition == Transition::Resume && !parent_active(tree, inst)? {
            return Err(CoreError::wrong_state(
                transition.label(),
                id,
                "[active] parent",
                parent_label(tree, inst)?,
            ));
        }

        behavior(tree, id)?.resuming(tree, id)?;
        tree.settle(id, transition, target)?;
        tree.perform_parent_resume(id)?;
        resumed(tree, id)
    })
}

/// After a resume: an AVAILABLE item re-runs the creation satisfaction
/// check, since its criteria may have fired while suspended.
pub fn resumed(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    if settled_in(tree.get(id)?, Available) {
        created(tree, id)?;
    }
    Ok(())
}

// ---------------- Failure and recovery ----------------

pub fn fault(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        simple(tree, id, Transition::Fault)?;
        notify_parent(tree, id)
    })
}

pub fn reactivate(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        simple(tree, id, Transition::Reactivate)?;
        behavior(tree, id)?.reactivated(tree, id)
    })
}

/// Close the case instance. Any state but ACTIVE and CLOSED may close.
pub fn close(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        ensure_is_case_instance(inst, Transition::Close)?;

        match inst.execution_state().effective() {
            Closed => Err(CoreError::already_closed(Transition::Close.label(), id)),
            Active => Err(CoreError::wrong_state(
                Transition::Close.label(),
                id,
                "not active",
                Active.label(),
            )),
            _ => {
                let rule = ensure_supported(inst, Transition::Close)?;
                tree.settle(id, Transition::Close, rule.to)
            }
        }
    })
}

// ---------------- Repetition ----------------

/// Create one repetition of a repeatable item next to it.
///
/// Returns the new instance, or `None` when the item is not repeatable.
/// A finished or terminating parent refuses with `WrongState`; under a
/// suspended parent the repetition waits in AVAILABLE.
pub fn repeat(tree: &mut ExecutionTree, id: InstanceId) -> Result<Option<InstanceId>> {
    nested(tree, |tree| {
        let inst = tree.get(id)?;
        let Some(parent) = inst.parent() else {
            return Ok(None);
        };
        if !inst.is_repeatable() {
            return Ok(None);
        }
        if !holds_live_children(tree.get(parent)?) {
            return Err(CoreError::wrong_state(
                "repeat",
                id,
                "[active|suspended] parent",
                parent_label(tree, inst)?,
            ));
        }

        let definition = Arc::clone(inst.definition()?);
        let created = tree.create_child_executions(parent, &[definition])?;
        for &repetition in &created {
            tree.get_mut(repetition)?.repetition = true;
        }
        tree.trigger_child_executions_lifecycle(parent, &created)?;

        Ok(created.first().copied())
    })
}

// ---------------- Helpers ----------------

fn nested<T>(
    tree: &mut ExecutionTree,
    op: impl FnOnce(&mut ExecutionTree) -> Result<T>,
) -> Result<T> {
    tree.enter()?;
    let result = op(tree);
    tree.leave();
    result
}

/// Guard + settle for transitions without further effects.
fn simple(tree: &mut ExecutionTree, id: InstanceId, transition: Transition) -> Result<()> {
    let rule = check(tree, id, transition)?;
    tree.settle(id, transition, rule.to)
}

fn supported(inst: &PlanItemInstance, transition: Transition) -> Result<TransitionRule> {
    if transition.is_propagated() {
        ensure_is_not_case_instance(inst, transition)?;
    }
    ensure_supported(inst, transition)
}

fn check(tree: &ExecutionTree, id: InstanceId, transition: Transition) -> Result<TransitionRule> {
    let inst = tree.get(id)?;
    let rule = supported(inst, transition)?;
    ensure_transition_allowed_from(inst, rule.from, rule.to, transition)?;
    Ok(rule)
}

fn mark(tree: &mut ExecutionTree, id: InstanceId, marker: TransientMarker) -> Result<()> {
    tree.get_mut(id)?.state.begin_transient(marker);
    Ok(())
}

fn behavior(tree: &ExecutionTree, id: InstanceId) -> Result<&'static dyn LifecycleHooks> {
    Ok(PlanItemBehavior::of(tree.get(id)?)?.hooks())
}

fn settled_in(inst: &PlanItemInstance, state: CaseExecutionState) -> bool {
    inst.state() == state && !inst.execution_state().is_transient()
}

/// True for the case instance, which has no parent.
fn parent_active(tree: &ExecutionTree, inst: &PlanItemInstance) -> Result<bool> {
    match inst.parent() {
        Some(parent) => Ok(settled_in(tree.get(parent)?, Active)),
        None => Ok(true),
    }
}

fn parent_label(tree: &ExecutionTree, inst: &PlanItemInstance) -> Result<&'static str> {
    let Some(parent) = inst.parent() else {
        return Ok("none");
    };
    let state = tree.get(parent)?.execution_state();
    Ok(match state.transient_marker() {
        Some(marker) => marker.label(),
        None => state.current().label(),
    })
}

fn ensure_not_terminating(inst: &PlanItemInstance, transition: Transition) -> Result<()> {
    if inst.execution_state().is_terminating() {
        return Err(CoreError::wrong_state(
            transition.label(),
            inst.id(),
            "[not terminating]",
            TransientMarker::Terminating.label(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::{
        rule_evaluation_error, CascadePolicy, CaseControlRule, FnRuleEvaluator,
        PlanItemDefinition, RuleContext, SentryDeclaration, VariableValue,
    };

    /// Understands `true`, `false` and `<name> > <integer>`.
    fn threshold(rule: &CaseControlRule, ctx: &RuleContext<'_>) -> Result<bool> {
        match rule.expression.trim() {
            "true" => return Ok(true),
            "false" => return Ok(false),
            _ => {}
        }
        let (name, bound) = rule
            .expression
            .split_once('>')
            .ok_or_else(|| rule_evaluation_error(rule, "expected '<name> > <integer>'"))?;
        let bound: i64 = bound
            .trim()
            .parse()
            .map_err(|_| rule_evaluation_error(rule, "bound is not an integer"))?;
        match ctx.variable(name.trim()) {
            Some(VariableValue::Integer(v)) => Ok(*v > bound),
            _ => Err(rule_evaluation_error(rule, "unknown variable")),
        }
    }

    fn tree(case: PlanItemDefinition) -> ExecutionTree {
        ExecutionTree::new(case.into_shared(), Box::new(FnRuleEvaluator(threshold))).unwrap()
    }

    /// Open the case: create (and thereby start) the root.
    fn opened(case: PlanItemDefinition) -> ExecutionTree {
        let mut t = tree(case);
        let root = t.root();
        create(&mut t, root).unwrap();
        t
    }

    fn child(t: &ExecutionTree, definition_id: &str) -> InstanceId {
        t.arena().by_definition(definition_id).next().unwrap().id()
    }

    fn state(t: &ExecutionTree, id: InstanceId) -> CaseExecutionState {
        t.get(id).unwrap().state()
    }

    fn gated(def: PlanItemDefinition) -> PlanItemDefinition {
        def.entry_criterion(SentryDeclaration::new("gate").on("Other", Transition::Complete))
    }

    #[test]
    fn opening_a_case_starts_the_root_and_its_children() {
        let t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("Triage"))
                .child(gated(PlanItemDefinition::task("Review"))),
        );

        assert_eq!(state(&t, t.root()), Active);
        assert_eq!(state(&t, child(&t, "Triage")), Active);
        assert_eq!(state(&t, child(&t, "Review")), Available);
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn required_rule_follows_case_variables() {
        let case = || {
            PlanItemDefinition::case_plan("Claim")
                .child(gated(PlanItemDefinition::task("ReviewTask").required_rule("amount > 1000")))
        };

        let mut high = tree(case());
        high.set_variable("amount", 1500_i64);
        let root = high.root();
        create(&mut high, root).unwrap();
        assert!(high.get(child(&high, "ReviewTask")).unwrap().is_required());

        let mut low = tree(case());
        low.set_variable("amount", 500_i64);
        let root = low.root();
        create(&mut low, root).unwrap();
        assert!(!low.get(child(&low, "ReviewTask")).unwrap().is_required());
    }

    #[test]
    fn absent_required_rule_keeps_the_default() {
        let mut t = tree(
            PlanItemDefinition::case_plan("Claim")
                .child(gated(PlanItemDefinition::task("ReviewTask"))),
        );
        let root = t.root();
        create(&mut t, root).unwrap();

        // No variable needed: the evaluator is never consulted.
        assert!(!t.get(child(&t, "ReviewTask")).unwrap().is_required());
    }

    #[test]
    fn rule_failure_surfaces_as_rule_evaluation() {
        let mut t = tree(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("ReviewTask").required_rule("amount > 1000")),
        );
        let root = t.root();
        let err = create(&mut t, root).unwrap_err();
        assert_eq!(err.kind, ErrorKind::RuleEvaluation);
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn manual_activation_enables_instead_of_starting() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("Approve").manual_activation_rule("true")),
        );
        let approve = child(&t, "Approve");
        assert_eq!(state(&t, approve), Enabled);

        disable(&mut t, approve).unwrap();
        assert_eq!(state(&t, approve), Disabled);
        // The only child is finished: the case completes itself.
        assert_eq!(state(&t, t.root()), Completed);
    }

    #[test]
    fn enabled_task_goes_through_manual_start_and_complete() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("Approve").manual_activation_rule("true")),
        );
        let approve = child(&t, "Approve");

        manual_start(&mut t, approve).unwrap();
        assert_eq!(state(&t, approve), Active);
        manual_complete(&mut t, approve).unwrap();
        assert_eq!(state(&t, approve), Completed);
        assert_eq!(state(&t, t.root()), Completed);
    }

    #[test]
    fn repeat_is_a_noop_when_not_repeatable() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(gated(PlanItemDefinition::task("Review"))),
        );
        let review = child(&t, "Review");
        let before = t.arena().len();

        assert_eq!(repeat(&mut t, review).unwrap(), None);
        assert_eq!(t.arena().len(), before);
    }

    #[test]
    fn repeat_creates_one_available_sibling() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(
                PlanItemDefinition::task("Review")
                    .repetition_rule("true")
                    .entry_criterion(SentryDeclaration::new("s1").on("Other", Transition::Complete))
                    .repetition_criterion(SentryDeclaration::new("again").on("Other", Transition::Complete)),
            ),
        );
        let review = child(&t, "Review");
        assert!(t.get(review).unwrap().is_repeatable());
        let before = t.arena().len();

        let repetition = repeat(&mut t, review).unwrap().unwrap();

        assert_eq!(t.arena().len(), before + 1);
        let inst = t.get(repetition).unwrap();
        assert!(inst.is_repetition());
        assert_eq!(inst.parent(), Some(t.root()));
        assert_eq!(inst.state(), Available);
        assert_eq!(t.children(t.root()).unwrap(), vec![review, repetition]);
    }

    #[test]
    fn completing_a_repeatable_task_spawns_its_repetition() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(
                PlanItemDefinition::task("Review")
                    .repetition_rule("true")
                    .repetition_criterion(SentryDeclaration::new("again").on("Other", Transition::Complete)),
            ),
        );
        let review = child(&t, "Review");
        assert_eq!(state(&t, review), Active);

        complete(&mut t, review).unwrap();

        let all: Vec<_> = t.arena().by_definition("Review").map(|i| i.id()).collect();
        assert_eq!(all.len(), 2);
        assert_eq!(state(&t, all[1]), Available);
        // The waiting repetition keeps the case open.
        assert_eq!(state(&t, t.root()), Active);
    }

    #[test]
    fn resumed_rechecks_only_available_items() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(gated(PlanItemDefinition::task("Review")))
                .child(PlanItemDefinition::task("Triage")),
        );
        let review = child(&t, "Review");
        let triage = child(&t, "Triage");

        t.get_mut(review).unwrap().entry_criterion_satisfied = true;
        resumed(&mut t, review).unwrap();
        assert_eq!(state(&t, review), Active);

        let before = t.journal().len();
        resumed(&mut t, triage).unwrap();
        assert_eq!(t.journal().len(), before);
    }

    #[test]
    fn suspend_and_resume_restore_children() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("Triage"))
                .child(gated(PlanItemDefinition::task("Review"))),
        );
        let root = t.root();
        let triage = child(&t, "Triage");
        let review = child(&t, "Review");

        suspend(&mut t, root).unwrap();
        assert_eq!(state(&t, root), Suspended);
        assert_eq!(state(&t, triage), Suspended);
        assert_eq!(t.get(triage).unwrap().resume_state(), Some(Active));
        assert_eq!(t.get(review).unwrap().resume_state(), Some(Available));

        resume(&mut t, root).unwrap();
        assert_eq!(state(&t, root), Active);
        assert_eq!(state(&t, triage), Active);
        assert_eq!(state(&t, review), Available);
        assert_eq!(t.get(triage).unwrap().resume_state(), None);
    }

    #[test]
    fn exit_while_suspended_terminates() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::task("Triage"))
                .child(PlanItemDefinition::task("Review")),
        );
        let triage = child(&t, "Triage");
        suspend(&mut t, triage).unwrap();

        fire_exit_criteria(&mut t, triage).unwrap();
        assert_eq!(state(&t, triage), Terminated);
        assert!(!t.get(triage).unwrap().execution_state().is_transient());
    }

    #[test]
    fn propagated_transitions_reject_the_root() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(gated(PlanItemDefinition::task("Review"))),
        );
        let root = t.root();
        for op in [parent_terminate, exit, parent_suspend, parent_resume] {
            let err = op(&mut t, root).unwrap_err();
            assert_eq!(err.kind, ErrorKind::ImpossibleTransition);
        }
        assert_eq!(state(&t, root), Active);
    }

    #[test]
    fn terminating_the_case_terminates_every_descendant() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim")
                .child(
                    PlanItemDefinition::stage("Assessment")
                        .child(PlanItemDefinition::task("Inspect"))
                        .child(gated(PlanItemDefinition::milestone("Assessed"))),
                )
                .child(gated(PlanItemDefinition::task("Review"))),
        );
        let root = t.root();

        terminate(&mut t, root).unwrap();

        for inst in t.arena().iter() {
            assert_eq!(inst.state(), Terminated, "{}", inst.definition_id());
            assert!(!inst.execution_state().is_transient());
        }
        let last = t.journal().last().unwrap();
        assert_eq!((last.instance, last.transition), (root, Transition::Terminate));
    }

    #[test]
    fn stage_refuses_completion_while_a_child_is_active() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(
                PlanItemDefinition::stage("Assessment").child(PlanItemDefinition::task("Inspect")),
            ),
        );
        let stage = child(&t, "Assessment");

        let err = complete(&mut t, stage).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ChildrenNotFinished);
        assert_eq!(state(&t, stage), Active);

        let inspect = child(&t, "Inspect");
        complete(&mut t, inspect).unwrap();
        // Stage and case complete on their own.
        assert_eq!(state(&t, stage), Completed);
        assert_eq!(state(&t, t.root()), Completed);
    }

    #[test]
    fn auto_complete_ignores_optional_children() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(
                PlanItemDefinition::stage("Assessment")
                    .auto_complete(true)
                    .child(PlanItemDefinition::task("Inspect").required_rule("true"))
                    .child(gated(PlanItemDefinition::task("Photos"))),
            ),
        );
        let stage = child(&t, "Assessment");
        let photos = child(&t, "Photos");
        let inspect = child(&t, "Inspect");

        complete(&mut t, inspect).unwrap();

        assert_eq!(state(&t, stage), Completed);
        // Left-over optional work is terminated with the stage.
        assert_eq!(state(&t, photos), Terminated);
    }

    #[test]
    fn close_rules() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(gated(PlanItemDefinition::task("Review"))),
        );
        let root = t.root();
        let review = child(&t, "Review");

        assert_eq!(close(&mut t, review).unwrap_err().kind, ErrorKind::NotCaseInstance);
        assert_eq!(close(&mut t, root).unwrap_err().kind, ErrorKind::WrongState);

        terminate(&mut t, root).unwrap();
        close(&mut t, root).unwrap();
        assert_eq!(state(&t, root), Closed);
        assert_eq!(close(&mut t, root).unwrap_err().kind, ErrorKind::AlreadyClosed);
        assert_eq!(close(&mut t, review).unwrap_err().kind, ErrorKind::NotCaseInstance);
    }

    #[test]
    fn fault_and_reactivate() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(PlanItemDefinition::task("Triage")),
        );
        let triage = child(&t, "Triage");

        fault(&mut t, triage).unwrap();
        assert_eq!(state(&t, triage), Failed);
        assert_eq!(state(&t, t.root()), Active);

        reactivate(&mut t, triage).unwrap();
        assert_eq!(state(&t, triage), Active);
    }

    #[test]
    fn endless_repetition_hits_the_cascade_bound() {
        let mut t = tree(
            PlanItemDefinition::case_plan("Claim")
                .child(PlanItemDefinition::milestone("Tick").repetition_rule("true")),
        )
        .with_policy(CascadePolicy { max_depth: 32 });
        let root = t.root();

        let err = create(&mut t, root).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CascadeDepthExceeded);
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn unbound_instance_is_missing_activity() {
        let mut t = opened(
            PlanItemDefinition::case_plan("Claim").child(gated(PlanItemDefinition::task("Review"))),
        );
        let review = child(&t, "Review");
        t.get_mut(review).unwrap().definition = None;

        let err = start(&mut t, review).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingActivity);
        assert_eq!(state(&t, review), Available);
    }
}
