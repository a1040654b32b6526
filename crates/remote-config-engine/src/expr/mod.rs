//! Condition expression language: lexing, parsing, and evaluation.
//!
//! Condition expressions are small boolean predicates over client context
//! attributes (`device.platform == 'ios' && percent(rollout) < 25`). They are
//! parsed once, at template-validation time; stored templates therefore never
//! fail to parse during resolution.

pub mod ast;
pub mod eval;
pub mod grammar;
pub mod lexer;

use thiserror::Error;

pub use ast::{CompareOp, Expr, Literal};
pub use eval::{evaluate, percent_bucket, ClientContext, RANDOMIZATION_ID};
pub use grammar::parse;
pub use lexer::Span;

/// Errors produced while parsing a condition expression.
///
/// Raised at template-validation time only; a parse failure at resolution
/// time would mean the store accepted an unvalidated template.
#[derive(Debug, Error)]
pub enum ExpressionError {
    #[error("unexpected character at {}..{}", .span.start, .span.end)]
    UnexpectedCharacter { span: Span },
    #[error("syntax error at {}..{}: {message}", .span.start, .span.end)]
    Syntax { span: Span, message: String },
}
