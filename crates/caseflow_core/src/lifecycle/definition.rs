use std::sync::Arc;

use super::Transition;

/// Closed set of plan item kinds.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PlanItemKind {
    /// The case plan model; only ever bound to the case instance (root).
    CasePlan,
    Stage,
    Task,
    Milestone,
}

impl PlanItemKind {
    pub const fn label(self) -> &'static str {
        match self {
            PlanItemKind::CasePlan => "casePlan",
            PlanItemKind::Stage => "stage",
            PlanItemKind::Task => "task",
            PlanItemKind::Milestone => "milestone",
        }
    }

    /// Kinds that own child plan items.
    pub const fn is_container(self) -> bool {
        matches!(self, PlanItemKind::CasePlan | PlanItemKind::Stage)
    }
}

/// One event condition of a sentry: `source` plan item reached `event`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OnPart {
    pub source: String,
    pub event: Transition,
}

impl OnPart {
    pub fn new(source: impl Into<String>, event: Transition) -> Self {
        Self {
            source: source.into(),
            event,
        }
    }
}

/// AND-combination of on-parts.
///
/// Satisfaction is recorded on instances by the sentry subsystem; it is
/// never computed from the declaration here.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SentryDeclaration {
    pub id: String,
    pub on_parts: Vec<OnPart>,
}

impl SentryDeclaration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            on_parts: Vec::new(),
        }
    }

    pub fn on(mut self, source: impl Into<String>, event: Transition) -> Self {
        self.on_parts.push(OnPart::new(source, event));
        self
    }
}

/// Opaque boolean expression handed to the rule evaluator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CaseControlRule {
    pub expression: String,
}

impl CaseControlRule {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }
}

/// Immutable plan item definition, shared by every instance of the item.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanItemDefinition {
    pub id: String,
    pub name: String,
    pub kind: PlanItemKind,
    pub entry_criteria: Vec<SentryDeclaration>,
    pub exit_criteria: Vec<SentryDeclaration>,
    /// Used instead of `entry_criteria` for repetitions, when non-empty.
    pub repetition_criteria: Vec<SentryDeclaration>,
    pub required_rule: Option<CaseControlRule>,
    pub repetition_rule: Option<CaseControlRule>,
    pub manual_activation_rule: Option<CaseControlRule>,
    /// Stages only: complete once required children are finished.
    pub auto_complete: bool,
    /// Stages only: items instantiated when the stage starts.
    pub children: Vec<Arc<PlanItemDefinition>>,
}

impl PlanItemDefinition {
    pub fn new(id: impl Into<String>, kind: PlanItemKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            kind,
            entry_criteria: Vec::new(),
            exit_criteria: Vec::new(),
            repetition_criteria: Vec::new(),
            required_rule: None,
            repetition_rule: None,
            manual_activation_rule: None,
            auto_complete: false,
            children: Vec::new(),
        }
    }

    pub fn case_plan(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::CasePlan)
    }

    pub fn stage(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::Stage)
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::Task)
    }

    pub fn milestone(id: impl Into<String>) -> Self {
        Self::new(id, PlanItemKind::Milestone)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn entry_criterion(mut self, sentry: SentryDeclaration) -> Self {
        self.entry_criteria.push(sentry);
        self
    }

    pub fn exit_criterion(mut self, sentry: SentryDeclaration) -> Self {
        self.exit_criteria.push(sentry);
        self
    }

    pub fn repetition_criterion(mut self, sentry: SentryDeclaration) -> Self {
        self.repetition_criteria.push(sentry);
        self
    }

    pub fn required_rule(mut self, expression: impl Into<String>) -> Self {
        self.required_rule = Some(CaseControlRule::new(expression));
        self
    }

    pub fn repetition_rule(mut self, expression: impl Into<String>) -> Self {
        self.repetition_rule = Some(CaseControlRule::new(expression));
        self
    }

    pub fn manual_activation_rule(mut self, expression: impl Into<String>) -> Self {
        self.manual_activation_rule = Some(CaseControlRule::new(expression));
        self
    }

    pub fn auto_complete(mut self, enabled: bool) -> Self {
        self.auto_complete = enabled;
        self
    }

    pub fn child(mut self, definition: PlanItemDefinition) -> Self {
        self.children.push(Arc::new(definition));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Depth-first search for a nested definition by id (excluding `self`).
    pub fn find_descendant(&self, id: &str) -> Option<Arc<PlanItemDefinition>> {
        self.children.iter().find_map(|child| {
            if child.id == id {
                Some(Arc::clone(child))
            } else {
                child.find_descendant(id)
            }
        })
    }
}
