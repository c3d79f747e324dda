use std::fmt;
use std::sync::Arc;

use crate::error::{CoreError, Result};

use super::{CaseExecutionState, ExecutionState, PlanItemDefinition, PlanItemKind};

/// Tree-scoped instance identifier, monotonically assigned.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One plan item instance inside an execution tree.
///
/// The parent owns the ordered child id list; `parent` is a plain id and
/// never changes after creation.
#[derive(Debug, Clone)]
pub struct PlanItemInstance {
    pub(crate) id: InstanceId,
    pub(crate) definition: Option<Arc<PlanItemDefinition>>,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) children: Vec<InstanceId>,
    pub(crate) state: ExecutionState,
    /// State to restore on resume; `Some` exactly while suspended.
    pub(crate) resume_state: Option<CaseExecutionState>,
    pub(crate) required: bool,
    pub(crate) repeatable: bool,
    pub(crate) repetition: bool,
    pub(crate) entry_criterion_satisfied: bool,
    pub(crate) exit_criterion_satisfied: bool,
    pub(crate) case_instance: bool,
}

impl PlanItemInstance {
    pub(crate) fn new(
        id: InstanceId,
        definition: Option<Arc<PlanItemDefinition>>,
        parent: Option<InstanceId>,
    ) -> Self {
        Self {
            id,
            definition,
            parent,
            children: Vec::new(),
            state: ExecutionState::new(),
            resume_state: None,
            required: false,
            repeatable: false,
            repetition: false,
            entry_criterion_satisfied: false,
            exit_criterion_satisfied: false,
            case_instance: parent.is_none(),
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Bound definition, or `MissingActivity` if the instance is unbound.
    pub fn definition(&self) -> Result<&Arc<PlanItemDefinition>> {
        self.definition
            .as_ref()
            .ok_or_else(|| CoreError::missing_activity(self.id))
    }

    pub fn kind(&self) -> Result<PlanItemKind> {
        Ok(self.definition()?.kind)
    }

    /// Definition id, or an empty string for unbound instances.
    pub fn definition_id(&self) -> &str {
        self.definition.as_ref().map(|d| d.id.as_str()).unwrap_or("")
    }

    pub fn parent(&self) -> Option<InstanceId> {
        self.parent
    }

    pub fn children(&self) -> &[InstanceId] {
        &self.children
    }

    pub fn execution_state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn state(&self) -> CaseExecutionState {
        self.state.current()
    }

    pub fn resume_state(&self) -> Option<CaseExecutionState> {
        self.resume_state
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_repeatable(&self) -> bool {
        self.repeatable
    }

    pub fn is_repetition(&self) -> bool {
        self.repetition
    }

    pub fn is_entry_criterion_satisfied(&self) -> bool {
        self.entry_criterion_satisfied
    }

    pub fn is_exit_criterion_satisfied(&self) -> bool {
        self.exit_criterion_satisfied
    }

    pub fn is_case_instance(&self) -> bool {
        self.case_instance
    }

    pub(crate) fn set_state(&mut self, state: CaseExecutionState) {
        self.state.settle(state);
    }
}
