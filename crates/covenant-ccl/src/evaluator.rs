// evaluator.rs - Policy evaluation.
//
// `evaluate()` is the single decision point for one action:
//
// 1. Collect every deny and permit whose action, resource and condition match.
// 2. Any matching deny? → Denied by the most specific deny.
// 3. Any matching permit? → Permitted by the most specific permit.
// 4. Nothing matched → Denied (default deny), no matched rule.
//
// Equal specificity goes to the statement declared first. Limit statements
// never affect this decision; rate limiting is layered on top by the caller.

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::document::{
    CompareOp, Comparison, Condition, Context, ContextValue, Literal, PolicyDocument, Severity,
    Statement,
};
use crate::pattern::{match_action, match_resource};

/// Outcome of evaluating one action against a document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResult {
    pub permitted: bool,
    /// The statement that decided the outcome, if any matched.
    pub matched_rule: Option<Statement>,
    /// Every matching permit and deny, most specific first.
    pub all_matches: Vec<Statement>,
    pub reason: Option<String>,
    pub severity: Option<Severity>,
}

impl EvaluationResult {
    /// Turn a result into a denial, keeping the match information.
    pub fn into_denied(mut self, reason: impl Into<String>, severity: Severity) -> Self {
        self.permitted = false;
        self.reason = Some(reason.into());
        self.severity = Some(severity);
        self
    }
}

/// Evaluate `action` on `resource` with `context` against `document`.
pub fn evaluate(
    document: &PolicyDocument,
    action: &str,
    resource: &str,
    context: &Context,
) -> EvaluationResult {
    let applies = |statement: &&Statement| {
        match_action(&statement.action, action)
            && match_resource(&statement.resource, resource)
            && statement
                .condition
                .as_ref()
                .map_or(true, |c| condition_holds(c, context))
    };

    let denies: Vec<&Statement> = document.denies().iter().filter(applies).collect();
    let permits: Vec<&Statement> = document.permits().iter().filter(applies).collect();

    let mut all_matches: Vec<Statement> = denies
        .iter()
        .chain(permits.iter())
        .map(|s| (*s).clone())
        .collect();
    all_matches.sort_by(by_precedence);

    if let Some(deny) = most_specific(&denies) {
        tracing::debug!(action, resource, line = deny.line, "denied by rule");
        return EvaluationResult {
            permitted: false,
            matched_rule: Some(deny.clone()),
            all_matches,
            reason: Some(format!("Denied by rule on line {}: {}", deny.line, deny)),
            severity: deny.severity,
        };
    }

    if let Some(permit) = most_specific(&permits) {
        tracing::debug!(action, resource, line = permit.line, "permitted by rule");
        return EvaluationResult {
            permitted: true,
            matched_rule: Some(permit.clone()),
            all_matches,
            reason: Some(format!("Permitted by rule on line {}", permit.line)),
            severity: permit.severity,
        };
    }

    tracing::debug!(action, resource, "no matching rule, default deny");
    EvaluationResult {
        permitted: false,
        matched_rule: None,
        all_matches,
        reason: Some(format!(
            "No rule permits action '{}' on resource '{}'",
            action, resource
        )),
        severity: None,
    }
}

/// Higher specificity first, then declaration order.
fn by_precedence(a: &Statement, b: &Statement) -> Ordering {
    b.specificity()
        .cmp(&a.specificity())
        .then(a.line.cmp(&b.line))
}

fn most_specific<'a>(statements: &[&'a Statement]) -> Option<&'a Statement> {
    statements.iter().copied().min_by(|a, b| by_precedence(a, b))
}

/// Evaluate a condition tree against the context.
pub fn condition_holds(condition: &Condition, context: &Context) -> bool {
    match condition {
        Condition::Compare(comparison) => comparison_holds(comparison, context),
        Condition::And(left, right) => {
            condition_holds(left, context) && condition_holds(right, context)
        }
        Condition::Or(left, right) => {
            condition_holds(left, context) || condition_holds(right, context)
        }
        Condition::Not(inner) => !condition_holds(inner, context),
    }
}

fn comparison_holds(comparison: &Comparison, context: &Context) -> bool {
    // An absent field never satisfies a comparison.
    let Some(actual) = context.get(&comparison.field) else {
        return false;
    };
    let expected = &comparison.value;

    match comparison.op {
        CompareOp::Eq => scalar_eq(actual, expected),
        CompareOp::Ne => !scalar_eq(actual, expected),
        CompareOp::Lt => ordering(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            ordering(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => ordering(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            ordering(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains => string_pair(actual, expected).is_some_and(|(a, e)| a.contains(e)),
        CompareOp::NotContains => {
            string_pair(actual, expected).is_some_and(|(a, e)| !a.contains(e))
        }
        CompareOp::In => list_contains(actual, expected),
        CompareOp::NotIn => matches!(expected, Literal::List(_)) && !list_contains(actual, expected),
        CompareOp::Matches => string_pair(actual, expected)
            .is_some_and(|(a, e)| Regex::new(e).map(|re| re.is_match(a)).unwrap_or(false)),
        CompareOp::StartsWith => {
            string_pair(actual, expected).is_some_and(|(a, e)| a.starts_with(e))
        }
        CompareOp::EndsWith => string_pair(actual, expected).is_some_and(|(a, e)| a.ends_with(e)),
    }
}

fn scalar_eq(actual: &ContextValue, expected: &Literal) -> bool {
    match (actual, expected) {
        (ContextValue::Null, Literal::Null) => true,
        (ContextValue::Bool(a), Literal::Bool(e)) => a == e,
        (ContextValue::Number(a), Literal::Number(e)) => a == e,
        (ContextValue::String(a), Literal::String(e)) => a == e,
        _ => false,
    }
}

fn ordering(actual: &ContextValue, expected: &Literal) -> Option<Ordering> {
    match (actual, expected) {
        (ContextValue::Number(a), Literal::Number(e)) => a.partial_cmp(e),
        (ContextValue::String(a), Literal::String(e)) => Some(a.as_str().cmp(e.as_str())),
        _ => None,
    }
}

fn string_pair<'a>(actual: &'a ContextValue, expected: &'a Literal) -> Option<(&'a str, &'a str)> {
    match (actual, expected) {
        (ContextValue::String(a), Literal::String(e)) => Some((a.as_str(), e.as_str())),
        _ => None,
    }
}

fn list_contains(actual: &ContextValue, expected: &Literal) -> bool {
    match expected {
        Literal::List(items) => items.iter().any(|item| scalar_eq(actual, item)),
        _ => false,
    }
}
