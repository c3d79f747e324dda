use crate::error::Result;

use super::{controller, CaseExecutionState, ExecutionTree, InstanceId, PlanItemInstance, PlanItemKind};

/// Extension points invoked by the controller during transitions.
///
/// Every hook defaults to a no-op. Hooks never change the state of the
/// instance they are called for; they may drive other instances.
pub trait LifecycleHooks {
    fn creating(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }

    fn started(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }

    fn completing(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }

    fn manual_completing(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }

    fn resuming(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }

    fn reactivated(&self, _tree: &mut ExecutionTree, _id: InstanceId) -> Result<()> {
        Ok(())
    }
}

/// Tasks carry no structural behavior; work happens outside the tree.
#[derive(Debug, Default, Copy, Clone)]
pub struct TaskBehavior;

impl LifecycleHooks for TaskBehavior {}

#[derive(Debug, Default, Copy, Clone)]
pub struct MilestoneBehavior;

impl LifecycleHooks for MilestoneBehavior {}

/// Stages (and the case plan) own child plan items.
#[derive(Debug, Default, Copy, Clone)]
pub struct StageBehavior;

impl LifecycleHooks for StageBehavior {
    /// Instantiate the stage's plan items and drive their lifecycle.
    fn started(&self, tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
        let stage = tree.get(id)?;
        if stage.state() != CaseExecutionState::Active {
            return Ok(());
        }

        let definitions = stage.definition()?.children.clone();
        let children = tree.create_child_executions(id, &definitions)?;
        tree.trigger_child_executions_lifecycle(id, &children)?;

        // Nothing to wait for (or everything finished synchronously).
        controller::check_auto_completion(tree, id)
    }

    fn completing(&self, tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
        tree.terminate_unfinished_children(id)
    }

    fn manual_completing(&self, tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
        tree.terminate_unfinished_children(id)
    }
}

/// Closed set of per-kind behaviors.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlanItemBehavior {
    CasePlan,
    Stage,
    Task,
    Milestone,
}

impl PlanItemBehavior {
    pub const fn for_kind(kind: PlanItemKind) -> Self {
        match kind {
            PlanItemKind::CasePlan => PlanItemBehavior::CasePlan,
            PlanItemKind::Stage => PlanItemBehavior::Stage,
            PlanItemKind::Task => PlanItemBehavior::Task,
            PlanItemKind::Milestone => PlanItemBehavior::Milestone,
        }
    }

    pub fn of(instance: &PlanItemInstance) -> Result<Self> {
        Ok(Self::for_kind(instance.kind()?))
    }

    pub fn hooks(self) -> &'static dyn LifecycleHooks {
        match self {
            PlanItemBehavior::CasePlan | PlanItemBehavior::Stage => &StageBehavior,
            PlanItemBehavior::Task => &TaskBehavior,
            PlanItemBehavior::Milestone => &MilestoneBehavior,
        }
    }
}
