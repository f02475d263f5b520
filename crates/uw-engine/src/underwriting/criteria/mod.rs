//! Rule criteria: a restricted boolean expression language over two bindings,
//! `client` and `carrier`.
//!
//! Criteria are tokenized with `logos`, parsed into a small expression tree and
//! interpreted against borrowed JSON records. There is no access to anything
//! beyond the two bindings, and every failure is reported as a value rather
//! than a panic.

mod interpreter;
mod lexer;
mod parser;

pub use interpreter::EvalError;
pub use lexer::LexError;
pub use parser::ParseError;

use serde_json::{Map, Value as JsonValue};
use tracing::warn;

/// Bindings visible to a criteria expression.
#[derive(Debug, Clone, Copy)]
pub struct CriteriaContext<'a> {
    pub client: &'a Map<String, JsonValue>,
    pub carrier: &'a JsonValue,
}

impl<'a> CriteriaContext<'a> {
    pub fn new(client: &'a Map<String, JsonValue>, carrier: &'a JsonValue) -> Self {
        Self { client, carrier }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("invalid criteria: {0}")]
    Parse(#[from] ParseError),
    #[error("criteria evaluation failed: {0}")]
    Eval(#[from] EvalError),
}

/// A parsed criteria expression, reusable across evaluations.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    source: String,
    expr: parser::Expr,
}

impl Criteria {
    pub fn parse(source: &str) -> Result<Self, CriteriaError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluates the expression and coerces the result to a boolean.
    pub fn evaluate(&self, context: &CriteriaContext<'_>) -> Result<bool, CriteriaError> {
        let value = interpreter::evaluate(&self.expr, context)?;
        Ok(value.truthy())
    }
}

/// Returns whether `criteria` holds for `context`.
///
/// Missing or blank criteria never match. Parse and evaluation failures are
/// logged and count as a non-match.
pub fn matches(criteria: Option<&str>, context: &CriteriaContext<'_>) -> bool {
    let source = match criteria {
        Some(source) if !source.trim().is_empty() => source,
        _ => return false,
    };

    match Criteria::parse(source).and_then(|parsed| parsed.evaluate(context)) {
        Ok(result) => result,
        Err(error) => {
            warn!(criteria = source, %error, "failed to evaluate rule criteria");
            false
        }
    }
}
