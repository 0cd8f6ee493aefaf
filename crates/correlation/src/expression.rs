//! Expression evaluation seam.
//!
//! Activation conditions, correlation keys, message ids and result
//! expressions are strings in the element configuration. The full expression
//! language lives outside this crate behind [`ExpressionEvaluator`];
//! [`SimpleExpressionEvaluator`] covers the subset connectors use most:
//!
//! - `=a.b.c` -- path lookup in the payload (missing paths yield `null`)
//! - `=a.b = "x"`, `=a != 3` -- equality against a literal or another path
//! - `=true`, `=42`, `="text"`, `=null` -- literals
//! - `={id: order.id, source: "webhook"}` -- flat object construction
//! - anything without a leading `=` is a plain string literal

use serde_json::{Map, Number, Value};

/// An expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    /// The expression is malformed.
    #[error("cannot parse expression '{expression}': {reason}")]
    Parse {
        /// The offending expression.
        expression: String,
        /// What went wrong.
        reason: String,
    },

    /// The expression evaluated to a value of the wrong type.
    #[error("expression '{expression}' produced {actual}, expected {expected}")]
    TypeMismatch {
        /// The offending expression.
        expression: String,
        /// Expected JSON type.
        expected: &'static str,
        /// Rendered result.
        actual: String,
    },
}

/// Evaluates configuration expressions against a JSON context.
#[cfg_attr(test, mockall::automock)]
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression` with `context` as the variable scope.
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError>;
}

/// Evaluate a boolean condition. `null` counts as `false`.
pub fn evaluate_condition(
    evaluator: &dyn ExpressionEvaluator,
    expression: &str,
    context: &Value,
) -> Result<bool, ExpressionError> {
    match evaluator.evaluate(expression, context)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(ExpressionError::TypeMismatch {
            expression: expression.to_owned(),
            expected: "boolean",
            actual: other.to_string(),
        }),
    }
}

/// Evaluate to a string. Numbers are rendered, `null` yields `None`.
pub fn evaluate_string(
    evaluator: &dyn ExpressionEvaluator,
    expression: &str,
    context: &Value,
) -> Result<Option<String>, ExpressionError> {
    match evaluator.evaluate(expression, context)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        other => Err(ExpressionError::TypeMismatch {
            expression: expression.to_owned(),
            expected: "string",
            actual: other.to_string(),
        }),
    }
}

/// Built-in evaluator for the path / literal / equality subset.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExpressionEvaluator;

impl ExpressionEvaluator for SimpleExpressionEvaluator {
    fn evaluate(&self, expression: &str, context: &Value) -> Result<Value, ExpressionError> {
        let Some(body) = expression.trim().strip_prefix('=') else {
            return Ok(Value::String(expression.to_owned()));
        };
        let body = body.trim();
        let parser = Parser {
            expression,
            context,
        };

        if body.starts_with('{') {
            return parser.object(body);
        }
        if let Some((lhs, comparison, rhs)) = split_comparison(body) {
            let left = parser.operand(lhs)?;
            let right = parser.operand(rhs)?;
            let equal = values_equal(&left, &right);
            return Ok(Value::Bool(match comparison {
                Comparison::Eq => equal,
                Comparison::Ne => !equal,
            }));
        }
        parser.operand(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Eq,
    Ne,
}

/// Split at the first `=` or `!=` outside a string literal.
fn split_comparison(body: &str) -> Option<(&str, Comparison, &str)> {
    let bytes = body.as_bytes();
    let mut in_string = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            b'!' if !in_string && bytes.get(i + 1) == Some(&b'=') => {
                return Some((&body[..i], Comparison::Ne, &body[i + 2..]));
            }
            b'=' if !in_string => return Some((&body[..i], Comparison::Eq, &body[i + 1..])),
            _ => {}
        }
    }
    None
}

/// Split at top-level occurrences of `sep` outside string literals.
fn split_outside_strings(body: &str, sep: u8) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (i, &b) in body.as_bytes().iter().enumerate() {
        if b == b'"' {
            in_string = !in_string;
        } else if b == sep && !in_string {
            parts.push(&body[start..i]);
            start = i + 1;
        }
    }
    parts.push(&body[start..]);
    parts
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
        _ => left == right,
    }
}

struct Parser<'a> {
    expression: &'a str,
    context: &'a Value,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> ExpressionError {
        ExpressionError::Parse {
            expression: self.expression.to_owned(),
            reason: reason.into(),
        }
    }

    fn operand(&self, raw: &str) -> Result<Value, ExpressionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(self.error("missing operand"));
        }
        if let Some(rest) = raw.strip_prefix('"') {
            return rest
                .strip_suffix('"')
                .map(|s| Value::String(s.to_owned()))
                .ok_or_else(|| self.error("unterminated string literal"));
        }
        match raw {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(Value::Number(n.into()));
        }
        if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
            return Ok(Value::Number(n));
        }
        self.path(raw)
    }

    fn path(&self, raw: &str) -> Result<Value, ExpressionError> {
        let mut current = self.context;
        for segment in raw.split('.') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '-');
            if !valid {
                return Err(self.error(format!("invalid path segment '{segment}'")));
            }
            match current.get(segment) {
                Some(next) => current = next,
                None => return Ok(Value::Null),
            }
        }
        Ok(current.clone())
    }

    fn object(&self, body: &str) -> Result<Value, ExpressionError> {
        let inner = body
            .strip_prefix('{')
            .and_then(|b| b.strip_suffix('}'))
            .ok_or_else(|| self.error("unterminated object literal"))?;

        let mut object = Map::new();
        if inner.trim().is_empty() {
            return Ok(Value::Object(object));
        }
        for entry in split_outside_strings(inner, b',') {
            let parts = split_outside_strings(entry, b':');
            let [key, value] = parts.as_slice() else {
                return Err(self.error(format!("expected 'key: value', got '{}'", entry.trim())));
            };
            let key = key.trim();
            let key = key
                .strip_prefix('"')
                .and_then(|k| k.strip_suffix('"'))
                .unwrap_or(key);
            if key.is_empty() {
                return Err(self.error("empty object key"));
            }
            object.insert(key.to_owned(), self.operand(value)?);
        }
        Ok(Value::Object(object))
    }
}
