use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CoreError, Domain, ErrorKind, Result};

use super::CaseExecutionState::{self, *};
use super::{
    controller, CaseControlRule, CaseVariables, ExecutionState, InstanceId, PlanItemDefinition,
    PlanItemInstance, PlanItemKind, RuleContext, RuleEvaluator, SentryListener, SentrySignal,
    Transition, TransientMarker, VariableValue,
};

/// Bound on nested controller operations within one trigger.
///
/// Cascades are unbounded by construction (a sentry can re-trigger the item
/// that fired it); exceeding the bound fails with `CascadeDepthExceeded`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CascadePolicy {
    pub max_depth: usize,
}

impl CascadePolicy {
    pub const DEFAULT_MAX_DEPTH: usize = 256;
}

impl Default for CascadePolicy {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// One settled transition, in the order it happened.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransitionRecord {
    pub instance: InstanceId,
    pub definition_id: String,
    pub transition: Transition,
    pub from: CaseExecutionState,
    pub to: CaseExecutionState,
    /// Cascade depth at which the transition settled (1 = the trigger itself).
    pub depth: usize,
}

/// Instance storage. Read-only outside the crate.
#[derive(Debug, Clone)]
pub struct Arena {
    instances: BTreeMap<InstanceId, PlanItemInstance>,
    root: InstanceId,
    next_id: u64,
}

impl Arena {
    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn get(&self, id: InstanceId) -> Result<&PlanItemInstance> {
        self.instances
            .get(&id)
            .ok_or_else(|| CoreError::unknown_instance(id.value()))
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// All instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &PlanItemInstance> {
        self.instances.values()
    }

    /// Instances bound to the definition `definition_id`, in creation order.
    pub fn by_definition<'a>(
        &'a self,
        definition_id: &'a str,
    ) -> impl Iterator<Item = &'a PlanItemInstance> + 'a {
        self.instances
            .values()
            .filter(move |inst| inst.definition_id() == definition_id)
    }

    fn get_mut(&mut self, id: InstanceId) -> Result<&mut PlanItemInstance> {
        self.instances
            .get_mut(&id)
            .ok_or_else(|| CoreError::unknown_instance(id.value()))
    }

    fn allocate(&mut self) -> InstanceId {
        let id = InstanceId(self.next_id);
        self.next_id += 1;
        id
    }
}

/// Restorable copy of the mutable tree content; see [`ExecutionTree::checkpoint`].
#[derive(Debug, Clone)]
pub struct Checkpoint {
    arena: Arena,
    variables: CaseVariables,
    journal_len: usize,
}

/// Persisted representation of one instance.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InstanceSnapshot {
    pub id: u64,
    pub parent: Option<u64>,
    pub definition_id: String,
    pub state: CaseExecutionState,
    pub transient_marker: Option<TransientMarker>,
    pub previous_state: Option<CaseExecutionState>,
    pub resume_state: Option<CaseExecutionState>,
    pub required: bool,
    pub repeatable: bool,
    pub repetition: bool,
    pub entry_criterion_satisfied: bool,
    pub exit_criterion_satisfied: bool,
}

/// In-memory execution tree of one case instance.
///
/// Owns every instance, the case variables, and the collaborators the
/// controller consults (rule evaluator, sentry listener).
pub struct ExecutionTree {
    arena: Arena,
    variables: CaseVariables,
    evaluator: Box<dyn RuleEvaluator + Send>,
    listener: Option<Box<dyn SentryListener + Send>>,
    policy: CascadePolicy,
    depth: usize,
    journal: Vec<TransitionRecord>,
}

impl ExecutionTree {
    /// New tree whose root (state NEW) is bound to a case plan definition.
    pub fn new(
        case_plan: Arc<PlanItemDefinition>,
        evaluator: Box<dyn RuleEvaluator + Send>,
    ) -> Result<Self> {
        if case_plan.kind != PlanItemKind::CasePlan {
            return Err(CoreError::error()
                .domain(Domain::Tree)
                .kind(ErrorKind::InvalidArgument)
                .msgf(format_args!(
                    "root definition '{}' must be a case plan, found {}",
                    case_plan.id,
                    case_plan.kind.label()
                ))
                .build());
        }

        let root = InstanceId(1);
        let mut instances = BTreeMap::new();
        instances.insert(root, PlanItemInstance::new(root, Some(case_plan), None));

        Ok(Self::from_arena(
            Arena {
                instances,
                root,
                next_id: 2,
            },
            evaluator,
        ))
    }

    fn from_arena(arena: Arena, evaluator: Box<dyn RuleEvaluator + Send>) -> Self {
        Self {
            arena,
            variables: CaseVariables::new(),
            evaluator,
            listener: None,
            policy: CascadePolicy::default(),
            depth: 0,
            journal: Vec::new(),
        }
    }

    pub fn with_policy(mut self, policy: CascadePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sentry_listener(mut self, listener: Box<dyn SentryListener + Send>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn set_sentry_listener(&mut self, listener: Box<dyn SentryListener + Send>) {
        self.listener = Some(listener);
    }

    // ---------------- Read access ----------------

    pub fn root(&self) -> InstanceId {
        self.arena.root
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn get(&self, id: InstanceId) -> Result<&PlanItemInstance> {
        self.arena.get(id)
    }

    pub fn children(&self, id: InstanceId) -> Result<Vec<InstanceId>> {
        Ok(self.arena.get(id)?.children.clone())
    }

    pub fn policy(&self) -> CascadePolicy {
        self.policy
    }

    /// Current nesting depth of controller operations (0 between triggers).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn journal(&self) -> &[TransitionRecord] {
        &self.journal
    }

    pub fn drain_journal(&mut self) -> Vec<TransitionRecord> {
        std::mem::take(&mut self.journal)
    }

    // ---------------- Variables and rules ----------------

    pub fn variables(&self) -> &CaseVariables {
        &self.variables
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Evaluate `rule` in the context of instance `id`.
    pub fn evaluate_rule(&self, id: InstanceId, rule: &CaseControlRule) -> Result<bool> {
        let context = RuleContext {
            instance: self.arena.get(id)?,
            variables: &self.variables,
        };
        self.evaluator.evaluate(rule, &context)
    }

    // ---------------- Atomicity ----------------

    /// Capture instances, variables and journal position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            arena: self.arena.clone(),
            variables: self.variables.clone(),
            journal_len: self.journal.len(),
        }
    }

    /// Return to a checkpoint, discarding journal records made since.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.arena = checkpoint.arena;
        self.variables = checkpoint.variables;
        self.journal.truncate(checkpoint.journal_len);
        self.depth = 0;
    }

    // ---------------- Child instantiation ----------------

    /// Create one NEW child per definition, appended to `parent` in order.
    pub fn create_child_executions(
        &mut self,
        parent: InstanceId,
        definitions: &[Arc<PlanItemDefinition>],
    ) -> Result<Vec<InstanceId>> {
        self.arena.get(parent)?;

        let mut created = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let id = self.arena.allocate();
            self.arena.instances.insert(
                id,
                PlanItemInstance::new(id, Some(Arc::clone(definition)), Some(parent)),
            );
            created.push(id);
        }
        self.arena.get_mut(parent)?.children.extend(&created);

        Ok(created)
    }

    /// Drive each NEW child through `create`, in order.
    ///
    /// Stops early once the parent is finished or terminating (a child's
    /// cascade may end it). Under a suspended parent children stop at
    /// AVAILABLE; their criteria are checked when the parent resumes.
    pub fn trigger_child_executions_lifecycle(
        &mut self,
        parent: InstanceId,
        children: &[InstanceId],
    ) -> Result<()> {
        for &child in children {
            if !holds_live_children(self.arena.get(parent)?) {
                break;
            }
            let Ok(instance) = self.arena.get(child) else {
                continue;
            };
            if instance.state() != New || instance.parent() != Some(parent) {
                continue;
            }
            controller::create(self, child)?;
        }
        Ok(())
    }

    // ---------------- Recursive walks ----------------

    /// Terminate `id` (TERMINATING already set) after all live descendants.
    pub fn perform_terminate(&mut self, id: InstanceId) -> Result<()> {
        self.terminate_walk(id, Transition::Terminate)
    }

    pub fn perform_parent_terminate(&mut self, id: InstanceId) -> Result<()> {
        self.terminate_walk(id, Transition::ParentTerminate)
    }

    pub fn perform_exit(&mut self, id: InstanceId) -> Result<()> {
        self.terminate_walk(id, Transition::Exit)
    }

    /// Suspend `id` (SUSPENDING already set) after its live descendants.
    pub fn perform_suspension(&mut self, id: InstanceId) -> Result<()> {
        self.suspension_walk(id, Transition::Suspend)
    }

    pub fn perform_parent_suspension(&mut self, id: InstanceId) -> Result<()> {
        self.suspension_walk(id, Transition::ParentSuspend)
    }

    /// Parent-resume suspended children, then re-check the criteria of
    /// children that became AVAILABLE while the parent was suspended.
    pub fn perform_parent_resume(&mut self, id: InstanceId) -> Result<()> {
        for child in self.children(id)? {
            if is_settled_in(self.arena.get(child)?, Suspended) {
                controller::parent_resume(self, child)?;
            }
        }

        for child in self.children(id)? {
            if self.arena.get(child).is_ok_and(|inst| is_settled_in(inst, Available)) {
                controller::resumed(self, child)?;
            }
        }
        Ok(())
    }

    /// Parent-terminate every live child; children still NEW are discarded.
    pub fn terminate_live_children(&mut self, id: InstanceId) -> Result<()> {
        self.terminate_children(id, |_| true)
    }

    /// Like [`terminate_live_children`](Self::terminate_live_children) but
    /// leaves DISABLED children alone. Used when a stage completes.
    pub fn terminate_unfinished_children(&mut self, id: InstanceId) -> Result<()> {
        self.terminate_children(id, |state| state != Disabled)
    }

    fn terminate_children(
        &mut self,
        id: InstanceId,
        selected: fn(CaseExecutionState) -> bool,
    ) -> Result<()> {
        loop {
            let mut next = None;
            for &child in &self.arena.get(id)?.children {
                let inst = self.arena.get(child)?;
                let state = inst.state();
                if state == New {
                    next = Some((child, true));
                    break;
                }
                if !state.is_terminal()
                    && !inst.execution_state().is_terminating()
                    && selected(state)
                {
                    next = Some((child, false));
                    break;
                }
            }

            match next {
                None => return Ok(()),
                Some((child, true)) => self.discard(child)?,
                Some((child, false)) => controller::parent_terminate(self, child)?,
            }
        }
    }

    fn terminate_walk(&mut self, id: InstanceId, transition: Transition) -> Result<()> {
        self.terminate_live_children(id)?;
        if !self.arena.get(id)?.execution_state().is_terminating() {
            return Ok(());
        }
        self.settle(id, transition, Terminated)
    }

    fn suspension_walk(&mut self, id: InstanceId, transition: Transition) -> Result<()> {
        for child in self.children(id)? {
            let inst = self.arena.get(child)?;
            let suspendable = matches!(inst.state(), Available | Enabled | Disabled | Active);
            if suspendable && !inst.execution_state().is_transient() {
                controller::parent_suspend(self, child)?;
            }
        }

        // A child's cascade may have ended the instance meanwhile.
        let state = self.arena.get(id)?.execution_state();
        if !state.is_suspending() {
            return Ok(());
        }
        let resume_to = state.effective();
        self.arena.get_mut(id)?.resume_state = Some(resume_to);
        self.settle(id, transition, Suspended)
    }

    /// Remove an instance that never left NEW.
    fn discard(&mut self, id: InstanceId) -> Result<()> {
        let parent = self.arena.get(id)?.parent;
        self.remove_subtree(id);
        if let Some(parent) = parent {
            self.arena.get_mut(parent)?.children.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Detach a finished plan item (and its subtree) from its parent.
    pub fn prune(&mut self, id: InstanceId) -> Result<()> {
        let inst = self.arena.get(id)?;
        if inst.is_case_instance() {
            return Err(CoreError::impossible_transition("prune", id));
        }
        if !inst.state().is_terminal() || inst.execution_state().is_transient() {
            return Err(CoreError::wrong_state(
                "prune",
                id,
                "[completed|terminated|failed]",
                inst.state().label(),
            ));
        }
        self.discard(id)
    }

    fn remove_subtree(&mut self, id: InstanceId) {
        if let Some(inst) = self.arena.instances.remove(&id) {
            for child in inst.children {
                self.remove_subtree(child);
            }
        }
    }

    // ---------------- Settling and sentries ----------------

    pub(crate) fn get_mut(&mut self, id: InstanceId) -> Result<&mut PlanItemInstance> {
        self.arena.get_mut(id)
    }

    /// Move `id` to a stable `to`, clearing any marker, and record it.
    pub(crate) fn settle(
        &mut self,
        id: InstanceId,
        transition: Transition,
        to: CaseExecutionState,
    ) -> Result<()> {
        let inst = self.arena.get_mut(id)?;
        let from = inst.state.effective();
        inst.set_state(to);
        if to != Suspended {
            inst.resume_state = None;
        }
        self.record(id, transition, from, to)
    }

    fn record(
        &mut self,
        id: InstanceId,
        transition: Transition,
        from: CaseExecutionState,
        to: CaseExecutionState,
    ) -> Result<()> {
        let record = TransitionRecord {
            instance: id,
            definition_id: self.arena.get(id)?.definition_id().to_string(),
            transition,
            from,
            to,
            depth: self.depth,
        };
        self.journal.push(record.clone());

        let signals = match self.listener.as_mut() {
            Some(listener) => listener.on_transition(&record, &self.arena),
            None => Vec::new(),
        };
        for signal in signals {
            self.apply_sentry_signal(signal)?;
        }
        Ok(())
    }

    /// Record a satisfied sentry on the instance and fire its criteria.
    pub fn apply_sentry_signal(&mut self, signal: SentrySignal) -> Result<()> {
        match signal {
            SentrySignal::Entry(id) => {
                self.arena.get_mut(id)?.entry_criterion_satisfied = true;
                controller::fire_entry_criteria(self, id)
            }
            SentrySignal::Exit(id) => {
                self.arena.get_mut(id)?.exit_criterion_satisfied = true;
                controller::fire_exit_criteria(self, id)
            }
        }
    }

    pub(crate) fn enter(&mut self) -> Result<()> {
        if self.depth >= self.policy.max_depth {
            return Err(CoreError::cascade_depth_exceeded(self.policy.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ---------------- Persistence hand-over ----------------

    /// Persisted representation of every instance, parents before children.
    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.arena
            .iter()
            .map(|inst| InstanceSnapshot {
                id: inst.id.value(),
                parent: inst.parent.map(InstanceId::value),
                definition_id: inst.definition_id().to_string(),
                state: inst.state.current(),
                transient_marker: inst.state.transient_marker(),
                previous_state: inst.state.previous_state(),
                resume_state: inst.resume_state,
                required: inst.required,
                repeatable: inst.repeatable,
                repetition: inst.repetition,
                entry_criterion_satisfied: inst.entry_criterion_satisfied,
                exit_criterion_satisfied: inst.exit_criterion_satisfied,
            })
            .collect()
    }

    /// Rebuild a tree from snapshots (parents must precede children).
    ///
    /// Definition ids are resolved against `case_plan`; unresolvable ids
    /// yield unbound instances that fail with `MissingActivity` when driven.
    pub fn restore(
        case_plan: Arc<PlanItemDefinition>,
        evaluator: Box<dyn RuleEvaluator + Send>,
        snapshots: &[InstanceSnapshot],
    ) -> Result<Self> {
        let invalid = |msg: &'static str| {
            CoreError::error()
                .domain(Domain::Tree)
                .kind(ErrorKind::InvalidArgument)
                .msg(msg)
                .build()
        };

        let mut instances: BTreeMap<InstanceId, PlanItemInstance> = BTreeMap::new();
        let mut root = None;
        let mut next_id = 1;

        for snap in snapshots {
            let id = InstanceId(snap.id);
            if instances.contains_key(&id) {
                return Err(invalid("duplicate instance id in snapshot"));
            }

            let parent = snap.parent.map(InstanceId);
            let definition = match parent {
                None if snap.definition_id == case_plan.id => Some(Arc::clone(&case_plan)),
                None => None,
                Some(_) => case_plan.find_descendant(&snap.definition_id),
            };

            match parent {
                None if root.is_some() => return Err(invalid("snapshot has more than one root")),
                None => root = Some(id),
                Some(p) => instances
                    .get_mut(&p)
                    .ok_or_else(|| invalid("snapshot child precedes its parent"))?
                    .children
                    .push(id),
            }

            let mut inst = PlanItemInstance::new(id, definition, parent);
            inst.state =
                ExecutionState::from_parts(snap.state, snap.transient_marker, snap.previous_state);
            inst.resume_state = snap.resume_state;
            inst.required = snap.required;
            inst.repeatable = snap.repeatable;
            inst.repetition = snap.repetition;
            inst.entry_criterion_satisfied = snap.entry_criterion_satisfied;
            inst.exit_criterion_satisfied = snap.exit_criterion_satisfied;
            instances.insert(id, inst);

            next_id = next_id.max(snap.id + 1);
        }

        let root = root.ok_or_else(|| invalid("snapshot has no root"))?;
        Ok(Self::from_arena(
            Arena {
                instances,
                root,
                next_id,
            },
            evaluator,
        ))
    }
}

fn is_settled_in(instance: &PlanItemInstance, state: CaseExecutionState) -> bool {
    instance.state() == state && !instance.execution_state().is_transient()
}

/// Whether new children may still be created below `instance`.
pub(crate) fn holds_live_children(instance: &PlanItemInstance) -> bool {
    !instance.state().is_terminal() && !instance.execution_state().is_terminating()
}

impl std::fmt::Debug for ExecutionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionTree")
            .field("arena", &self.arena)
            .field("variables", &self.variables)
            .field("policy", &self.policy)
            .field("depth", &self.depth)
            .field("journal", &self.journal.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{FnRuleEvaluator, SentryDeclaration};

    fn always(_: &CaseControlRule, _: &RuleContext<'_>) -> Result<bool> {
        Ok(true)
    }

    fn no_rules() -> Box<dyn RuleEvaluator + Send> {
        Box::new(FnRuleEvaluator(always))
    }

    fn claim() -> Arc<PlanItemDefinition> {
        PlanItemDefinition::case_plan("Claim")
            .child(PlanItemDefinition::task("Triage"))
            .child(
                PlanItemDefinition::task("Review").entry_criterion(
                    SentryDeclaration::new("afterTriage").on("Triage", Transition::Complete),
                ),
            )
            .into_shared()
    }

    fn opened() -> ExecutionTree {
        let mut tree = ExecutionTree::new(claim(), no_rules()).unwrap();
        let root = tree.root();
        controller::create(&mut tree, root).unwrap();
        tree
    }

    fn id_of(tree: &ExecutionTree, definition_id: &str) -> InstanceId {
        tree.arena().by_definition(definition_id).next().unwrap().id()
    }

    /// Signals entry for available items whose sentries name the settled transition.
    struct OnPartListener;

    impl SentryListener for OnPartListener {
        fn on_transition(&mut self, record: &TransitionRecord, arena: &Arena) -> Vec<SentrySignal> {
            arena
                .iter()
                .filter(|inst| inst.state() == Available)
                .filter(|inst| {
                    inst.definition().is_ok_and(|def| {
                        def.entry_criteria.iter().flat_map(|s| &s.on_parts).any(|part| {
                            part.source == record.definition_id && part.event == record.transition
                        })
                    })
                })
                .map(|inst| SentrySignal::Entry(inst.id()))
                .collect()
        }
    }

    #[test]
    fn root_must_be_a_case_plan() {
        let err = ExecutionTree::new(PlanItemDefinition::task("Loose").into_shared(), no_rules())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn new_tree_has_a_single_new_root() {
        let tree = ExecutionTree::new(claim(), no_rules()).unwrap();
        let root = tree.get(tree.root()).unwrap();
        assert_eq!(tree.arena().len(), 1);
        assert!(root.is_case_instance());
        assert_eq!(root.state(), New);
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn children_keep_definition_order() {
        let tree = opened();
        let ids: Vec<_> = tree
            .children(tree.root())
            .unwrap()
            .into_iter()
            .map(|c| tree.get(c).unwrap().definition_id().to_string())
            .collect();
        assert_eq!(ids, ["Triage", "Review"]);
    }

    #[test]
    fn listener_signals_cascade_within_one_trigger() {
        let mut tree = opened().with_sentry_listener(Box::new(OnPartListener));
        let triage = id_of(&tree, "Triage");
        let review = id_of(&tree, "Review");
        tree.drain_journal();

        controller::complete(&mut tree, triage).unwrap();

        let review_inst = tree.get(review).unwrap();
        assert_eq!(review_inst.state(), Active);
        assert!(review_inst.is_entry_criterion_satisfied());

        let journal = tree.drain_journal();
        assert_eq!(journal[0].transition, Transition::Complete);
        assert_eq!(journal[0].depth, 1);
        let start = journal.iter().find(|r| r.instance == review).unwrap();
        assert_eq!(start.transition, Transition::Start);
        assert!(start.depth > 1);
    }

    #[test]
    fn exit_signal_terminates_the_target() {
        let mut tree = opened();
        let triage = id_of(&tree, "Triage");

        tree.apply_sentry_signal(SentrySignal::Exit(triage)).unwrap();

        let inst = tree.get(triage).unwrap();
        assert!(inst.is_exit_criterion_satisfied());
        assert_eq!(inst.state(), Terminated);
    }

    #[test]
    fn rollback_restores_instances_and_journal() {
        let mut tree = opened();
        let triage = id_of(&tree, "Triage");
        let saved = tree.checkpoint();
        let journal_len = tree.journal().len();

        controller::complete(&mut tree, triage).unwrap();
        tree.set_variable("amount", 10_i64);
        assert_eq!(tree.get(triage).unwrap().state(), Completed);

        tree.rollback(saved);
        assert_eq!(tree.get(triage).unwrap().state(), Active);
        assert_eq!(tree.journal().len(), journal_len);
        assert!(tree.variables().is_empty());
    }

    #[test]
    fn prune_only_detaches_finished_items() {
        let mut tree = opened();
        let root = tree.root();
        let triage = id_of(&tree, "Triage");

        assert_eq!(tree.prune(triage).unwrap_err().kind, ErrorKind::WrongState);
        assert_eq!(tree.prune(root).unwrap_err().kind, ErrorKind::ImpossibleTransition);

        controller::complete(&mut tree, triage).unwrap();
        tree.prune(triage).unwrap();
        assert!(!tree.arena().contains(triage));
        assert_eq!(tree.children(root).unwrap().len(), 1);
        assert_eq!(tree.get(triage).unwrap_err().kind, ErrorKind::UnknownInstance);
    }

    #[test]
    fn snapshot_restore_keeps_state_and_markers() {
        let mut tree = opened();
        let triage = id_of(&tree, "Triage");
        tree.get_mut(triage)
            .unwrap()
            .state
            .begin_transient(TransientMarker::Suspending);

        let snapshot = tree.snapshot();
        let restored = ExecutionTree::restore(claim(), no_rules(), &snapshot).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        let inst = restored.get(triage).unwrap();
        assert!(inst.execution_state().is_suspending());
        assert_eq!(inst.execution_state().previous_state(), Some(Active));
        assert_eq!(restored.children(restored.root()).unwrap().len(), 2);
    }

    #[test]
    fn restored_instance_without_definition_is_missing_activity() {
        let tree = opened();
        let mut snapshot = tree.snapshot();
        snapshot[1].definition_id = "Removed".to_string();
        let id = InstanceId(snapshot[1].id);

        let mut restored = ExecutionTree::restore(claim(), no_rules(), &snapshot).unwrap();
        let err = controller::complete(&mut restored, id).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingActivity);
        assert_eq!(err.severity, crate::error::Severity::Fatal);
    }

    #[test]
    fn restore_rejects_orphans() {
        let tree = opened();
        let mut snapshot = tree.snapshot();
        snapshot.swap(0, 1);
        let err = ExecutionTree::restore(claim(), no_rules(), &snapshot).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn depth_bound_is_enforced() {
        let mut tree = ExecutionTree::new(claim(), no_rules())
            .unwrap()
            .with_policy(CascadePolicy { max_depth: 1 });
        tree.enter().unwrap();
        assert_eq!(tree.enter().unwrap_err().kind, ErrorKind::CascadeDepthExceeded);
        tree.leave();
        assert_eq!(tree.depth(), 0);
    }
}
