//! # covenant-ccl
//!
//! The Covenant constraint language (CCL).
//!
//! A covenant is a short text of `permit`, `deny` and `limit` statements:
//!
//! ```text
//! permit file.read on '/data/**'
//! deny file.write on '/system/**' severity critical
//! deny payment.send when amount > 1000 severity high
//! limit api.call 100 per 1 hour
//! ```
//!
//! [`parse`] turns the text into an immutable [`PolicyDocument`];
//! [`evaluate`] decides a single action against it.
//!
//! ## Key invariants
//!
//! - **Default deny**: no matching permit means denied, with no matched rule.
//! - **Deny wins**: any matching deny denies, even when a broader permit
//!   also matches. The most specific deny is reported.
//! - **Specificity**: `**` scores 0, `*` scores 1, a literal segment 2,
//!   summed over the action and resource patterns.

pub mod document;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod pattern;

pub use document::{
    CompareOp, Comparison, Condition, Context, ContextValue, Effect, LimitStatement, Literal,
    PolicyDocument, Severity, Statement,
};
pub use error::CclError;
pub use evaluator::{evaluate, EvaluationResult};
pub use parser::parse;
pub use pattern::{match_action, match_resource, pattern_specificity, specificity};
