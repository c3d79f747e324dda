use crate::error::Result;

use super::{Arena, InstanceId, PlanItemInstance, SentryDeclaration, TransitionRecord};

/// Criteria gating entry into `instance`.
///
/// Repetitions use the repetition criteria when the definition declares any.
pub fn applicable_entry_criteria(instance: &PlanItemInstance) -> Result<&[SentryDeclaration]> {
    let definition = instance.definition()?;
    if instance.is_repetition() && !definition.repetition_criteria.is_empty() {
        return Ok(&definition.repetition_criteria);
    }
    Ok(&definition.entry_criteria)
}

/// Entry is satisfied when the flag is set or nothing gates entry.
pub fn is_entry_satisfied(instance: &PlanItemInstance) -> Result<bool> {
    if instance.is_entry_criterion_satisfied() {
        return Ok(true);
    }
    Ok(applicable_entry_criteria(instance)?.is_empty())
}

/// Exit is opt-in: only the recorded flag counts.
pub fn is_exit_satisfied(instance: &PlanItemInstance) -> bool {
    instance.is_exit_criterion_satisfied()
}

/// Outcome reported by the sentry subsystem for one instance.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SentrySignal {
    Entry(InstanceId),
    Exit(InstanceId),
}

/// Sentry subsystem seam.
///
/// Invoked synchronously after every settled transition. Returned signals
/// are applied inside the same trigger, which is what forms a cascade.
pub trait SentryListener {
    fn on_transition(&mut self, record: &TransitionRecord, arena: &Arena) -> Vec<SentrySignal>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::lifecycle::{PlanItemDefinition, Transition};

    fn instance(def: PlanItemDefinition) -> PlanItemInstance {
        PlanItemInstance::new(InstanceId(2), Some(Arc::new(def)), Some(InstanceId(1)))
    }

    #[test]
    fn empty_criteria_means_entry_satisfied() {
        let inst = instance(PlanItemDefinition::task("t"));
        assert!(is_entry_satisfied(&inst).unwrap());
    }

    #[test]
    fn declared_criteria_wait_for_flag() {
        let mut inst = instance(
            PlanItemDefinition::task("t")
                .entry_criterion(SentryDeclaration::new("s").on("a", Transition::Complete)),
        );
        assert!(!is_entry_satisfied(&inst).unwrap());

        inst.entry_criterion_satisfied = true;
        assert!(is_entry_satisfied(&inst).unwrap());
    }

    #[test]
    fn repetition_uses_repetition_criteria_when_present() {
        let def = PlanItemDefinition::task("t")
            .repetition_criterion(SentryDeclaration::new("again").on("b", Transition::Occur));

        // Base entry criteria are empty, repetition criteria are not.
        let mut inst = instance(def);
        assert!(is_entry_satisfied(&inst).unwrap());

        inst.repetition = true;
        assert!(!is_entry_satisfied(&inst).unwrap());
        assert_eq!(applicable_entry_criteria(&inst).unwrap()[0].id, "again");
    }

    #[test]
    fn repetition_falls_back_to_entry_criteria() {
        let mut inst = instance(
            PlanItemDefinition::task("t")
                .entry_criterion(SentryDeclaration::new("s").on("a", Transition::Complete)),
        );
        inst.repetition = true;
        assert_eq!(applicable_entry_criteria(&inst).unwrap()[0].id, "s");
        assert!(!is_entry_satisfied(&inst).unwrap());
    }

    #[test]
    fn exit_has_no_empty_criteria_fallback() {
        let mut inst = instance(PlanItemDefinition::task("t"));
        assert!(!is_exit_satisfied(&inst));
        inst.exit_criterion_satisfied = true;
        assert!(is_exit_satisfied(&inst));
    }

    #[test]
    fn unbound_instance_is_missing_activity() {
        let inst = PlanItemInstance::new(InstanceId(3), None, Some(InstanceId(1)));
        let err = is_entry_satisfied(&inst).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingActivity);
    }
}
