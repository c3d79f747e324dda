//! Sample claim-handling case: model, collaborators and a scripted run.

use std::sync::Arc;

use caseflow_core::error::{CoreError, Domain, ErrorKind, Result};
use caseflow_core::lifecycle::{
    applicable_entry_criteria, rule_evaluation_error, Arena, CaseControlRule, PlanItemDefinition,
    RuleContext, RuleEvaluator, SentryDeclaration, SentryListener, SentrySignal,
    TransitionRecord, VariableValue,
};
use caseflow_runtime::{CaseExecutionState, CaseRuntime, InstanceId, RuntimeConfig, Transition};

/// Claim handling: intake, an assessment stage, payout and a final milestone.
///
/// Expert review inside the assessment is required for claims above 1000
/// and waits for a manual start.
pub fn claim_model() -> Arc<PlanItemDefinition> {
    let after = |source: &str, event: Transition| {
        SentryDeclaration::new(format!("after{source}")).on(source, event)
    };

    PlanItemDefinition::case_plan("ClaimHandling")
        .named("Claim handling")
        .child(PlanItemDefinition::task("Intake").named("Register claim"))
        .child(
            PlanItemDefinition::stage("Assessment")
                .auto_complete(true)
                .entry_criterion(after("Intake", Transition::Complete))
                .child(PlanItemDefinition::task("Inspect").required_rule("true"))
                .child(
                    PlanItemDefinition::task("ExpertReview")
                        .required_rule("amount > 1000")
                        .manual_activation_rule("true")
                        .entry_criterion(after("Inspect", Transition::Complete)),
                )
                .child(
                    PlanItemDefinition::milestone("Assessed")
                        .entry_criterion(after("Inspect", Transition::Complete)),
                ),
        )
        .child(
            PlanItemDefinition::task("Payout")
                .entry_criterion(after("Assessment", Transition::Complete)),
        )
        .child(
            PlanItemDefinition::milestone("Settled")
                .entry_criterion(after("Payout", Transition::Complete)),
        )
        .into_shared()
}

/// Evaluates `true`, `false`, `<variable> > <integer>` and `<variable> < <integer>`.
#[derive(Debug, Default, Copy, Clone)]
pub struct ThresholdEvaluator;

impl RuleEvaluator for ThresholdEvaluator {
    fn evaluate(&self, rule: &CaseControlRule, context: &RuleContext<'_>) -> Result<bool> {
        let expr = rule.expression.trim();
        match expr {
            "true" => return Ok(true),
            "false" => return Ok(false),
            _ => {}
        }

        let (name, op, bound) = if let Some((name, bound)) = expr.split_once('>') {
            (name, '>', bound)
        } else if let Some((name, bound)) = expr.split_once('<') {
            (name, '<', bound)
        } else {
            return Err(rule_evaluation_error(rule, "unsupported expression"));
        };

        let bound: i64 = bound
            .trim()
            .parse()
            .map_err(|_| rule_evaluation_error(rule, "bound must be an integer"))?;
        let value = match context.variable(name.trim()) {
            Some(VariableValue::Integer(v)) => *v,
            Some(_) => return Err(rule_evaluation_error(rule, "variable is not an integer")),
            None => return Err(rule_evaluation_error(rule, "variable is not set")),
        };

        Ok(if op == '>' { value > bound } else { value < bound })
    }
}

/// Simplified sentry subsystem: an on-part fires when its source plan item
/// settles the named transition. Every on-part counts on its own.
#[derive(Debug, Default)]
pub struct OnPartListener;

impl SentryListener for OnPartListener {
    fn on_transition(&mut self, record: &TransitionRecord, arena: &Arena) -> Vec<SentrySignal> {
        let fired = |sentries: &[SentryDeclaration]| {
            sentries.iter().flat_map(|s| &s.on_parts).any(|part| {
                part.source == record.definition_id && part.event == record.transition
            })
        };

        let mut signals = Vec::new();
        for inst in arena.iter() {
            let Ok(definition) = inst.definition() else {
                continue;
            };
            let live = !inst.state().is_terminal() && inst.state() != CaseExecutionState::New;

            if inst.state() == CaseExecutionState::Available
                && applicable_entry_criteria(inst).is_ok_and(|criteria| fired(criteria))
            {
                signals.push(SentrySignal::Entry(inst.id()));
            } else if live && fired(definition.exit_criteria.as_slice()) {
                signals.push(SentrySignal::Exit(inst.id()));
            }
        }
        signals
    }
}

/// Claim case wired with the sample collaborators.
pub fn claim_case(name: &str, config: RuntimeConfig) -> Result<CaseRuntime> {
    Ok(CaseRuntime::new(name, claim_model(), Box::new(ThresholdEvaluator), config)?
        .with_sentry_listener(Box::new(OnPartListener)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub expert_review_required: bool,
    pub final_state: CaseExecutionState,
}

/// Scripted run: open, work through the claim, close.
pub fn run(case: &mut CaseRuntime) -> Result<Outcome> {
    case.open()?;
    let intake = only(case, "Intake")?;
    case.complete(intake)?;

    // Pause the assessment once; resuming restores its items.
    let assessment = only(case, "Assessment")?;
    case.suspend(assessment)?;
    case.resume(assessment)?;

    let inspect = only(case, "Inspect")?;
    case.complete(inspect)?;

    let expert = only(case, "ExpertReview")?;
    let expert_review_required = case.tree().get(expert)?.is_required();
    if expert_review_required {
        case.manual_start(expert)?;
        case.complete(expert)?;
    }

    let payout = only(case, "Payout")?;
    case.complete(payout)?;
    case.close()?;

    Ok(Outcome {
        expert_review_required,
        final_state: case.state_of(case.root())?,
    })
}

fn only(case: &CaseRuntime, definition_id: &str) -> Result<InstanceId> {
    case.instances_of(definition_id)
        .first()
        .copied()
        .ok_or_else(|| {
            CoreError::error()
                .domain(Domain::Tree)
                .kind(ErrorKind::UnknownInstance)
                .msgf(format_args!("no instance of '{definition_id}'"))
                .build()
        })
}
