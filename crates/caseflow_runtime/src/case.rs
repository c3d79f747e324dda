use std::sync::Arc;

use caseflow_core::error::{CoreError, Domain, ErrorKind, Result};
use caseflow_core::lifecycle::{
    controller, CaseExecutionState, ExecutionTree, InstanceId, InstanceSnapshot,
    PlanItemDefinition, RuleEvaluator, SentryListener, SentrySignal, TransitionRecord,
    VariableValue,
};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::log_core_error;
use crate::{CaseEvent, RuntimeConfig};

/// Runtime owner of one case instance.
///
/// Responsibilities:
/// - Hold the case execution tree and its collaborators
/// - Run each command as one trigger, cascades included
/// - Roll back a failed trigger (when configured) so no partial state is kept
/// - Log accepted and rejected triggers
/// - Publish every settled transition on a broadcast stream
pub struct CaseRuntime {
    name: String,
    tree: ExecutionTree,
    config: RuntimeConfig,

    // broadcast is used so:
    // - triggers never block on a slow consumer
    // - lagging receivers drop old events rather than stalling the case
    events: broadcast::Sender<CaseEvent>,
}

impl CaseRuntime {
    /// Create a runtime for a new case; the root stays NEW until [`open`](Self::open).
    pub fn new(
        name: impl Into<String>,
        case_plan: Arc<PlanItemDefinition>,
        evaluator: Box<dyn RuleEvaluator + Send>,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let name = checked_name(name.into())?;
        let tree = ExecutionTree::new(case_plan, evaluator)?.with_policy(config.cascade);
        Ok(Self::from_tree(name, tree, config))
    }

    /// Rebuild a runtime from persisted instances.
    pub fn restore(
        name: impl Into<String>,
        case_plan: Arc<PlanItemDefinition>,
        evaluator: Box<dyn RuleEvaluator + Send>,
        config: RuntimeConfig,
        snapshots: &[InstanceSnapshot],
    ) -> Result<Self> {
        let name = checked_name(name.into())?;
        let tree =
            ExecutionTree::restore(case_plan, evaluator, snapshots)?.with_policy(config.cascade);
        Ok(Self::from_tree(name, tree, config))
    }

    fn from_tree(name: String, tree: ExecutionTree, config: RuntimeConfig) -> Self {
        let (events, _rx) = broadcast::channel(config.event_capacity);
        Self {
            name,
            tree,
            config,
            events,
        }
    }

    pub fn with_sentry_listener(mut self, listener: Box<dyn SentryListener + Send>) -> Self {
        self.tree.set_sentry_listener(listener);
        self
    }

    /// Case name (for logging/introspection).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Read access to the tree between triggers.
    pub fn tree(&self) -> &ExecutionTree {
        &self.tree
    }

    pub fn root(&self) -> InstanceId {
        self.tree.root()
    }

    pub fn state_of(&self, id: InstanceId) -> Result<CaseExecutionState> {
        Ok(self.tree.get(id)?.state())
    }

    /// Instances of one plan item definition, oldest first.
    pub fn instances_of(&self, definition_id: &str) -> Vec<InstanceId> {
        self.tree
            .arena()
            .by_definition(definition_id)
            .map(|inst| inst.id())
            .collect()
    }

    pub fn snapshot(&self) -> Vec<InstanceSnapshot> {
        self.tree.snapshot()
    }

    /// Subscribe to settled transitions of accepted triggers.
    pub fn subscribe_events(&self) -> broadcast::Receiver<CaseEvent> {
        self.events.subscribe()
    }

    /// Case variables are read by rules at the next trigger.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        let name = name.into();
        let value = value.into();
        debug!("case={} variable {}={:?}", self.name, name, value);
        self.tree.set_variable(name, value);
    }
}

/// Commands. Each one is a single trigger.
impl CaseRuntime {
    /// Create the case instance; with no gating criteria it starts at once.
    pub fn open(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.trigger("open", root, |tree| controller::create(tree, root))
    }

    pub fn enable(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("enable", id, |tree| controller::enable(tree, id))
    }

    pub fn disable(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("disable", id, |tree| controller::disable(tree, id))
    }

    pub fn reenable(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("reenable", id, |tree| controller::reenable(tree, id))
    }

    pub fn start(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("start", id, |tree| controller::start(tree, id))
    }

    pub fn manual_start(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("manualStart", id, |tree| controller::manual_start(tree, id))
    }

    pub fn complete(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("complete", id, |tree| controller::complete(tree, id))
    }

    pub fn manual_complete(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("manualComplete", id, |tree| controller::manual_complete(tree, id))
    }

    pub fn occur(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("occur", id, |tree| controller::occur(tree, id))
    }

    pub fn terminate(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("terminate", id, |tree| controller::terminate(tree, id))
    }

    pub fn exit(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("exit", id, |tree| controller::exit(tree, id))
    }

    pub fn suspend(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("suspend", id, |tree| controller::suspend(tree, id))
    }

    pub fn resume(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("resume", id, |tree| controller::resume(tree, id))
    }

    pub fn fault(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("fault", id, |tree| controller::fault(tree, id))
    }

    pub fn reactivate(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("reactivate", id, |tree| controller::reactivate(tree, id))
    }

    pub fn close(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.trigger("close", root, |tree| controller::close(tree, root))
    }

    pub fn repeat(&mut self, id: InstanceId) -> Result<Option<InstanceId>> {
        self.trigger("repeat", id, |tree| controller::repeat(tree, id))
    }

    /// Entry sentry of `id` fired.
    pub fn signal_entry(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("signalEntry", id, |tree| {
            tree.apply_sentry_signal(SentrySignal::Entry(id))
        })
    }

    /// Exit sentry of `id` fired.
    pub fn signal_exit(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("signalExit", id, |tree| {
            tree.apply_sentry_signal(SentrySignal::Exit(id))
        })
    }

    /// Drop a finished plan item and its subtree.
    pub fn prune(&mut self, id: InstanceId) -> Result<()> {
        self.trigger("prune", id, |tree| tree.prune(id))
    }

    fn trigger<T>(
        &mut self,
        command: &'static str,
        target: InstanceId,
        op: impl FnOnce(&mut ExecutionTree) -> Result<T>,
    ) -> Result<T> {
        let checkpoint = self.config.rollback.then(|| self.tree.checkpoint());

        match op(&mut self.tree) {
            Ok(value) => {
                let records = self.tree.drain_journal();
                info!(
                    "case={} {} on {} accepted transitions={}",
                    self.name,
                    command,
                    target,
                    records.len()
                );
                self.publish(records);
                Ok(value)
            }
            Err(err) => {
                log_core_error(&self.name, &err);
                match checkpoint {
                    Some(checkpoint) => {
                        self.tree.rollback(checkpoint);
                        debug!("case={} {} on {} rolled back", self.name, command, target);
                    }
                    None => {
                        // Without rollback the partial cascade stays; report it.
                        let records = self.tree.drain_journal();
                        self.publish(records);
                    }
                }
                Err(err)
            }
        }
    }

    fn publish(&self, records: Vec<TransitionRecord>) {
        for record in records {
            debug!(
                "case={} {}#{} {}: {} -> {} depth={}",
                self.name,
                record.definition_id,
                record.instance,
                record.transition,
                record.from,
                record.to,
                record.depth
            );
            // Ignore errors (no receivers) to keep triggers non-blocking.
            let _ = self.events.send(CaseEvent {
                case: self.name.clone(),
                record,
            });
        }
    }
}

fn checked_name(name: String) -> Result<String> {
    if name.is_empty() {
        return Err(CoreError::error()
            .domain(Domain::Config)
            .kind(ErrorKind::InvalidArgument)
            .msg("case name must not be empty")
            .build());
    }
    Ok(name)
}
