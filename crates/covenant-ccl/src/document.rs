// document.rs - Parsed covenant document model.
//
// A PolicyDocument is the immutable result of parsing constraint source.
// It keeps permit, deny and limit statements in declaration order; the
// evaluator and the enforcement layer only ever read it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pattern;

/// How serious a violation of a statement is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Parse a severity keyword as written in constraint source.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Whether a statement grants or forbids.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Permit,
    Deny,
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Permit => write!(f, "permit"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

/// A single `permit` or `deny` statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub effect: Effect,
    /// Dotted action pattern, e.g. `file.read` or `file.*`.
    pub action: String,
    /// Slash-separated resource pattern, e.g. `/data/**`.
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    /// 1-based source line.
    pub line: usize,
}

impl Statement {
    /// Combined specificity of the action and resource patterns.
    pub fn specificity(&self) -> u32 {
        pattern::specificity(&self.action, &self.resource)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} on '{}'", self.effect, self.action, self.resource)?;
        if let Some(condition) = &self.condition {
            write!(f, " when {}", condition)?;
        }
        if let Some(severity) = self.severity {
            write!(f, " severity {}", severity)?;
        }
        Ok(())
    }
}

/// A `limit <action> <count> per <n> <unit>` statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LimitStatement {
    pub action: String,
    /// Maximum permitted calls per window.
    pub count: u64,
    /// Window length in seconds.
    pub period_seconds: u64,
    pub line: usize,
}

impl LimitStatement {
    pub fn specificity(&self) -> u32 {
        pattern::pattern_specificity(&self.action, '.')
    }
}

impl fmt::Display for LimitStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "limit {} {} per {} seconds",
            self.action, self.count, self.period_seconds
        )
    }
}

/// A parsed covenant. Read-only once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PolicyDocument {
    permits: Vec<Statement>,
    denies: Vec<Statement>,
    limits: Vec<LimitStatement>,
}

impl PolicyDocument {
    pub(crate) fn new(
        permits: Vec<Statement>,
        denies: Vec<Statement>,
        limits: Vec<LimitStatement>,
    ) -> Self {
        Self {
            permits,
            denies,
            limits,
        }
    }

    pub fn permits(&self) -> &[Statement] {
        &self.permits
    }

    pub fn denies(&self) -> &[Statement] {
        &self.denies
    }

    pub fn limits(&self) -> &[LimitStatement] {
        &self.limits
    }

    /// Total number of statements of every kind.
    pub fn len(&self) -> usize {
        self.permits.len() + self.denies.len() + self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A scalar value supplied with an action for condition evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContextValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<&str> for ContextValue {
    fn from(value: &str) -> Self {
        ContextValue::String(value.to_string())
    }
}

impl From<String> for ContextValue {
    fn from(value: String) -> Self {
        ContextValue::String(value)
    }
}

impl From<f64> for ContextValue {
    fn from(value: f64) -> Self {
        ContextValue::Number(value)
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Number(value as f64)
    }
}

impl From<bool> for ContextValue {
    fn from(value: bool) -> Self {
        ContextValue::Bool(value)
    }
}

/// Context passed alongside an action. Sorted so it hashes canonically.
pub type Context = BTreeMap<String, ContextValue>;

/// A literal on the right-hand side of a comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Literal>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "\\'")),
            Literal::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Comparison operators available in `when` clauses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    NotContains,
    In,
    NotIn,
    Matches,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    /// Map an operator token to its operator.
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "=" | "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            "<=" => CompareOp::Le,
            ">" => CompareOp::Gt,
            ">=" => CompareOp::Ge,
            "contains" => CompareOp::Contains,
            "not_contains" => CompareOp::NotContains,
            "in" => CompareOp::In,
            "not_in" => CompareOp::NotIn,
            "matches" => CompareOp::Matches,
            "starts_with" => CompareOp::StartsWith,
            "ends_with" => CompareOp::EndsWith,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Contains => "contains",
            CompareOp::NotContains => "not_contains",
            CompareOp::In => "in",
            CompareOp::NotIn => "not_in",
            CompareOp::Matches => "matches",
            CompareOp::StartsWith => "starts_with",
            CompareOp::EndsWith => "ends_with",
        };
        f.write_str(token)
    }
}

/// `<field> <op> <value>`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    pub field: String,
    pub op: CompareOp,
    pub value: Literal,
}

/// Boolean condition tree from a `when` clause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Compare(Comparison),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent_is_and: bool) -> fmt::Result {
        match self {
            Condition::Or(..) if parent_is_and => write!(f, "({})", self),
            _ => write!(f, "{}", self),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare(c) => write!(f, "{} {} {}", c.field, c.op, c.value),
            Condition::And(left, right) => {
                left.fmt_operand(f, true)?;
                write!(f, " and ")?;
                right.fmt_operand(f, true)
            }
            Condition::Or(left, right) => write!(f, "{} or {}", left, right),
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Compare(_) | Condition::Not(_) => write!(f, "not {}", inner),
                _ => write!(f, "not ({})", inner),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compare(field: &str, op: CompareOp, value: Literal) -> Condition {
        Condition::Compare(Comparison {
            field: field.to_string(),
            op,
            value,
        })
    }

    #[test]
    fn severity_orders_by_seriousness() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
        assert_eq!(Severity::from_keyword("high"), Some(Severity::High));
        assert_eq!(Severity::from_keyword("urgent"), None);
    }

    #[test]
    fn statement_display_reads_like_source() {
        let statement = Statement {
            effect: Effect::Deny,
            action: "file.write".to_string(),
            resource: "/system/**".to_string(),
            condition: Some(compare(
                "user",
                CompareOp::Eq,
                Literal::String("guest".to_string()),
            )),
            severity: Some(Severity::Critical),
            line: 2,
        };
        assert_eq!(
            statement.to_string(),
            "deny file.write on '/system/**' when user = 'guest' severity critical"
        );
    }

    #[test]
    fn nested_or_is_parenthesized_under_and() {
        let condition = Condition::And(
            Box::new(compare("a", CompareOp::Gt, Literal::Number(1.0))),
            Box::new(Condition::Or(
                Box::new(compare("b", CompareOp::Eq, Literal::Bool(true))),
                Box::new(compare("c", CompareOp::Eq, Literal::Null)),
            )),
        );
        assert_eq!(condition.to_string(), "a > 1 and (b = true or c = null)");
    }

    #[test]
    fn context_value_deserializes_scalars() {
        let context: Context =
            serde_json::from_str(r#"{"a": "x", "b": 2.5, "c": false, "d": null}"#).unwrap();
        assert_eq!(context["a"], ContextValue::String("x".to_string()));
        assert_eq!(context["b"], ContextValue::Number(2.5));
        assert_eq!(context["c"], ContextValue::Bool(false));
        assert_eq!(context["d"], ContextValue::Null);
    }
}
