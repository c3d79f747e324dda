use std::collections::BTreeMap;

use crate::error::{CoreError, Domain, ErrorKind, Payload, Result};

use super::{CaseControlRule, ExecutionTree, InstanceId, PlanItemInstance};

/// Case variable value visible to rule expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for VariableValue {
    fn from(v: bool) -> Self {
        VariableValue::Bool(v)
    }
}

impl From<i64> for VariableValue {
    fn from(v: i64) -> Self {
        VariableValue::Integer(v)
    }
}

impl From<f64> for VariableValue {
    fn from(v: f64) -> Self {
        VariableValue::Float(v)
    }
}

impl From<&str> for VariableValue {
    fn from(v: &str) -> Self {
        VariableValue::Text(v.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(v: String) -> Self {
        VariableValue::Text(v)
    }
}

pub type CaseVariables = BTreeMap<String, VariableValue>;

/// What a rule expression is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub instance: &'a PlanItemInstance,
    pub variables: &'a CaseVariables,
}

impl RuleContext<'_> {
    pub fn variable(&self, name: &str) -> Option<&VariableValue> {
        self.variables.get(name)
    }
}

/// Rule language seam. Pure from the controller's point of view.
pub trait RuleEvaluator {
    fn evaluate(&self, rule: &CaseControlRule, context: &RuleContext<'_>) -> Result<bool>;
}

/// Evaluator backed by a closure.
pub struct FnRuleEvaluator<F>(pub F);

impl<F> RuleEvaluator for FnRuleEvaluator<F>
where
    F: Fn(&CaseControlRule, &RuleContext<'_>) -> Result<bool>,
{
    fn evaluate(&self, rule: &CaseControlRule, context: &RuleContext<'_>) -> Result<bool> {
        (self.0)(rule, context)
    }
}

/// Error for evaluators that cannot make sense of an expression.
pub fn rule_evaluation_error(rule: &CaseControlRule, reason: &str) -> CoreError {
    CoreError::error()
        .domain(Domain::Rule)
        .kind(ErrorKind::RuleEvaluation)
        .msgf(format_args!(
            "failed to evaluate rule '{}': {reason}",
            rule.expression
        ))
        .payload(Payload::Context {
            key: "expression",
            value: rule.expression.clone().into(),
        })
        .build()
}

/// Evaluate the required rule once and store it; absent rule leaves the flag.
pub fn apply_required_rule(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    let rule = tree.get(id)?.definition()?.required_rule.clone();
    if let Some(rule) = rule {
        let required = tree.evaluate_rule(id, &rule)?;
        tree.get_mut(id)?.required = required;
    }
    Ok(())
}

/// Evaluate the repetition rule once and store it; absent rule leaves the flag.
pub fn apply_repetition_rule(tree: &mut ExecutionTree, id: InstanceId) -> Result<()> {
    let rule = tree.get(id)?.definition()?.repetition_rule.clone();
    if let Some(rule) = rule {
        let repeatable = tree.evaluate_rule(id, &rule)?;
        tree.get_mut(id)?.repeatable = repeatable;
    }
    Ok(())
}

/// Absent manual activation rule means automatic activation.
pub fn evaluate_manual_activation_rule(tree: &ExecutionTree, id: InstanceId) -> Result<bool> {
    match &tree.get(id)?.definition()?.manual_activation_rule {
        Some(rule) => tree.evaluate_rule(id, rule),
        None => Ok(false),
    }
}
