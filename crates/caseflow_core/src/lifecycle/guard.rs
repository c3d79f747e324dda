use crate::error::{CoreError, Result};

use super::{transition_rule, CaseExecutionState, PlanItemInstance, Transition, TransitionRule};

/// Check `expected -> target` against the instance's effective state.
///
/// Never mutates; the caller applies the transition once every guard passed.
pub fn ensure_transition_allowed(
    instance: &PlanItemInstance,
    expected: CaseExecutionState,
    target: CaseExecutionState,
    transition: Transition,
) -> Result<()> {
    ensure_transition_allowed_from(instance, &[expected], target, transition)
}

/// Set form of [`ensure_transition_allowed`]: any of `expected` may start it.
///
/// While a transient marker is set the effective state is the one recorded
/// before the in-flight operation began. Once the effective state passes,
/// a marker already heading for `target` also counts as being in the
/// target state.
pub fn ensure_transition_allowed_from(
    instance: &PlanItemInstance,
    expected: &[CaseExecutionState],
    target: CaseExecutionState,
    transition: Transition,
) -> Result<()> {
    let state = instance.execution_state();
    let effective = state.effective();

    let already_in_target = || {
        CoreError::already_in_target_state(
            transition.label(),
            instance.id(),
            transition.id(),
            effective.id(),
            target.label(),
            target.id(),
        )
    };

    if effective == target {
        return Err(already_in_target());
    }

    if !expected.contains(&effective) {
        return Err(CoreError::unexpected_state(
            transition.label(),
            instance.id(),
            transition.id(),
            state_set(expected),
            effective.label(),
            effective.id(),
            target.id(),
        ));
    }

    if state
        .transient_marker()
        .is_some_and(|marker| marker.destination() == target)
    {
        return Err(already_in_target());
    }

    Ok(())
}

/// Restrict an operation to the case instance (root).
pub fn ensure_is_case_instance(instance: &PlanItemInstance, transition: Transition) -> Result<()> {
    if !instance.is_case_instance() {
        return Err(CoreError::not_case_instance(transition.label(), instance.id()));
    }
    Ok(())
}

/// Restrict an operation to plan items below the case instance.
pub fn ensure_is_not_case_instance(
    instance: &PlanItemInstance,
    transition: Transition,
) -> Result<()> {
    if instance.is_case_instance() {
        return Err(CoreError::impossible_transition(
            transition.label(),
            instance.id(),
        ));
    }
    Ok(())
}

/// Table lookup for the instance's kind; unsupported transitions are impossible.
pub fn ensure_supported(instance: &PlanItemInstance, transition: Transition) -> Result<TransitionRule> {
    let kind = instance.kind()?;
    transition_rule(kind, transition)
        .ok_or_else(|| CoreError::impossible_transition(transition.label(), instance.id()))
}

fn state_set(states: &[CaseExecutionState]) -> String {
    states
        .iter()
        .map(|s| s.label())
        .collect::<Vec<_>>()
        .join("|")
}
