use super::CaseExecutionState::{self, *};
use super::{PlanItemKind, Transition, ALL_STATES, ALL_TRANSITIONS};

/// Guard inputs for one transition of one plan item kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransitionRule {
    pub transition: Transition,
    /// States the transition may start from (the guard's expected set).
    pub from: &'static [CaseExecutionState],
    /// Goal state. For resume/parentResume this is the nominal goal; the
    /// controller restores the state recorded at suspension.
    pub to: CaseExecutionState,
}

const LIVE: &[CaseExecutionState] = &[Available, Enabled, Disabled, Active, Suspended];
const SUSPENDABLE: &[CaseExecutionState] = &[Available, Enabled, Disabled, Active];
const REACTIVATABLE_CASE: &[CaseExecutionState] = &[Completed, Terminated, Failed];
const CLOSABLE_CASE: &[CaseExecutionState] = &[
    New, Available, Enabled, Disabled, Suspended, Terminated, Completed, Failed,
];

fn edge(
    from: &'static [CaseExecutionState],
    to: CaseExecutionState,
) -> (&'static [CaseExecutionState], CaseExecutionState) {
    (from, to)
}

/// Look up the rule for `transition` on `kind`; `None` means impossible.
pub fn transition_rule(kind: PlanItemKind, transition: Transition) -> Option<TransitionRule> {
    use PlanItemKind::*;
    use Transition as T;

    let (from, to) = match (kind, transition) {
        (_, T::Create) => edge(&[New], Available),

        (Task | Stage, T::Enable) => edge(&[Available], Enabled),
        (Task | Stage, T::Disable) => edge(&[Enabled], Disabled),
        (Task | Stage, T::Reenable) => edge(&[Disabled], Enabled),
        (Task | Stage | CasePlan, T::Start) => edge(&[Available], Active),
        (Task | Stage, T::ManualStart) => edge(&[Enabled], Active),
        (Task | Stage | CasePlan, T::Complete | T::ManualComplete) => edge(&[Active], Completed),
        (Milestone, T::Occur) => edge(&[Available], Completed),

        (Milestone, T::Terminate) => edge(&[Available], Terminated),
        (Task | Stage | CasePlan, T::Terminate) => edge(&[Active], Terminated),
        (Task | Stage | Milestone, T::ParentTerminate | T::Exit) => edge(LIVE, Terminated),

        (Milestone, T::Suspend) => edge(&[Available], Suspended),
        (Task | Stage | CasePlan, T::Suspend) => edge(&[Active], Suspended),
        (Task | Stage | Milestone, T::ParentSuspend) => edge(SUSPENDABLE, Suspended),

        (Milestone, T::Resume | T::ParentResume) => edge(&[Suspended], Available),
        (Task | Stage | CasePlan, T::Resume) => edge(&[Suspended], Active),
        (Task | Stage, T::ParentResume) => edge(&[Suspended], Active),

        (Task | Stage, T::Reactivate) => edge(&[Failed], Active),
        (CasePlan, T::Reactivate) => edge(REACTIVATABLE_CASE, Active),
        (Task | Stage, T::Fault) => edge(&[Active], Failed),

        (CasePlan, T::Close) => edge(CLOSABLE_CASE, Closed),

        _ => return None,
    };

    Some(TransitionRule {
        transition,
        from,
        to,
    })
}

/// Transitions a `kind` instance may take from a stable `state`.
///
/// Callers holding a transient instance should pass its effective state;
/// the guard still rejects work already in flight.
pub fn available_transitions(kind: PlanItemKind, state: CaseExecutionState) -> Vec<Transition> {
    ALL_TRANSITIONS
        .iter()
        .copied()
        .filter(|t| transition_rule(kind, *t).is_some_and(|rule| rule.from.contains(&state)))
        .collect()
}

/// Lifecycle transition graph for one plan item kind.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransitionGraph {
    pub kind: PlanItemKind,
    pub states: Vec<CaseExecutionState>,
    pub transitions: Vec<TransitionEdge>,
}

/// Directed lifecycle transition edge.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TransitionEdge {
    pub start: CaseExecutionState,
    pub transition: Transition,
    pub goal: CaseExecutionState,
}

/// Build the lifecycle graph for `kind` from the transition table.
pub fn transition_graph(kind: PlanItemKind) -> TransitionGraph {
    let mut transitions = Vec::new();

    for transition in ALL_TRANSITIONS {
        if let Some(rule) = transition_rule(kind, transition) {
            for start in rule.from {
                transitions.push(TransitionEdge {
                    start: *start,
                    transition,
                    goal: rule.to,
                });
            }
        }
    }

    let states = ALL_STATES
        .iter()
        .copied()
        .filter(|s| {
            transitions
                .iter()
                .any(|edge| edge.start == *s || edge.goal == *s)
        })
        .collect();

    TransitionGraph {
        kind,
        states,
        transitions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milestone_graph_contains_expected_edges() {
        let graph = transition_graph(PlanItemKind::Milestone);

        let expected = [
            (New, Transition::Create, Available),
            (Available, Transition::Occur, Completed),
            (Available, Transition::Terminate, Terminated),
            (Available, Transition::Suspend, Suspended),
            (Suspended, Transition::Resume, Available),
            (Active, Transition::Exit, Terminated),
        ];

        for (start, transition, goal) in expected {
            assert!(
                graph.transitions.iter().any(|edge| {
                    edge.start == start && edge.transition == transition && edge.goal == goal
                }),
                "missing edge {start:?} -> {transition:?} -> {goal:?}"
            );
        }

        assert!(!graph
            .transitions
            .iter()
            .any(|edge| edge.transition == Transition::Start));
        assert_eq!(graph.transitions.len(), 20);
        assert!(!graph.states.contains(&Closed));
    }

    #[test]
    fn only_the_case_plan_closes() {
        for kind in [PlanItemKind::Stage, PlanItemKind::Task, PlanItemKind::Milestone] {
            assert!(transition_rule(kind, Transition::Close).is_none());
        }
        let rule = transition_rule(PlanItemKind::CasePlan, Transition::Close).unwrap();
        assert!(!rule.from.contains(&Active));
        assert!(!rule.from.contains(&Closed));
    }

    #[test]
    fn case_plan_is_never_driven_by_a_parent() {
        for t in [
            Transition::ParentTerminate,
            Transition::Exit,
            Transition::ParentSuspend,
            Transition::ParentResume,
        ] {
            assert!(transition_rule(PlanItemKind::CasePlan, t).is_none());
        }
    }

    #[test]
    fn available_transitions_for_active_task() {
        let transitions = available_transitions(PlanItemKind::Task, Active);
        for t in [
            Transition::Complete,
            Transition::ManualComplete,
            Transition::Terminate,
            Transition::ParentTerminate,
            Transition::Exit,
            Transition::Suspend,
            Transition::ParentSuspend,
            Transition::Fault,
        ] {
            assert!(transitions.contains(&t), "missing {t}");
        }
        assert!(!transitions.contains(&Transition::Start));
        assert_eq!(transitions.len(), 8);
    }
}
