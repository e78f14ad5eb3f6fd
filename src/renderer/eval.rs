//! Expression evaluation over `serde_json` values

use std::cmp::Ordering;
use std::fmt::Write;

use serde_json::Value;
use thiserror::Error;

use crate::parser::{Accessor, BinaryOp, Expr, UnaryOp};

/// Failures while evaluating expressions or executing tag bodies
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: BinaryOp,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot negate {type_name}")]
    BadNegation { type_name: &'static str },

    #[error("cannot index {container} with {index}")]
    BadIndex {
        container: &'static str,
        index: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{op}'")]
    Overflow { op: BinaryOp },

    #[error("cannot iterate over {type_name}")]
    NotIterable { type_name: &'static str },

    #[error("include of {name} exceeds the nesting limit of {limit}")]
    IncludeDepth { name: String, limit: usize },
}

/// Variable lookup used by [`evaluate`]
pub trait Lookup {
    fn lookup(&self, name: &str) -> Option<&Value>;
}

/// Evaluate an expression; undefined names and fields are null
pub fn evaluate(expr: &Expr, vars: &dyn Lookup) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable { root, accessors } => {
            let mut current = vars.lookup(root).cloned().unwrap_or(Value::Null);
            for accessor in accessors {
                current = match accessor {
                    Accessor::Field(field) => member(&current, field),
                    Accessor::Index(index) => {
                        let index = evaluate(index, vars)?;
                        subscript(&current, &index)?
                    }
                };
            }
            Ok(current)
        }
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&evaluate(inner, vars)?))),
        Expr::Unary(UnaryOp::Neg, inner) => negate(evaluate(inner, vars)?),
        Expr::Binary(BinaryOp::And, lhs, rhs) => {
            let left = evaluate(lhs, vars)?;
            if !truthy(&left) {
                return Ok(left);
            }
            evaluate(rhs, vars)
        }
        Expr::Binary(BinaryOp::Or, lhs, rhs) => {
            let left = evaluate(lhs, vars)?;
            if truthy(&left) {
                return Ok(left);
            }
            evaluate(rhs, vars)
        }
        Expr::Binary(op, lhs, rhs) => {
            let left = evaluate(lhs, vars)?;
            let right = evaluate(rhs, vars)?;
            binary(*op, &left, &right)
        }
    }
}

fn member(value: &Value, field: &str) -> Value {
    match value {
        Value::Object(map) => map.get(field).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn subscript(value: &Value, index: &Value) -> Result<Value, EvalError> {
    match (value, index) {
        (Value::Null, _) => Ok(Value::Null),
        (Value::Object(map), Value::String(key)) => {
            Ok(map.get(key).cloned().unwrap_or(Value::Null))
        }
        (Value::Array(items), Value::Number(n)) => {
            let item = n
                .as_i64()
                .and_then(|i| {
                    // Negative indexes count from the end
                    let len = items.len() as i64;
                    let i = if i < 0 { len + i } else { i };
                    usize::try_from(i).ok()
                })
                .and_then(|i| items.get(i));
            Ok(item.cloned().unwrap_or(Value::Null))
        }
        (container, index) => Err(EvalError::BadIndex {
            container: type_name(container),
            index: type_name(index),
        }),
    }
}

fn negate(value: Value) -> Result<Value, EvalError> {
    if let Some(n) = value.as_i64() {
        return n
            .checked_neg()
            .map(Value::from)
            .ok_or(EvalError::BadNegation { type_name: "integer" });
    }
    if let Some(f) = value.as_f64() {
        return Ok(Value::from(-f));
    }
    Err(EvalError::BadNegation {
        type_name: type_name(&value),
    })
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let mismatch = || EvalError::TypeMismatch {
        op,
        left: type_name(left),
        right: type_name(right),
    };

    match op {
        BinaryOp::Equal => Ok(Value::Bool(values_equal(left, right))),
        BinaryOp::NotEqual => Ok(Value::Bool(!values_equal(left, right))),
        BinaryOp::Less | BinaryOp::LessOrEqual | BinaryOp::Greater | BinaryOp::GreaterOrEqual => {
            let ordering = compare(left, right).ok_or_else(mismatch)?;
            let result = match op {
                BinaryOp::Less => ordering == Ordering::Less,
                BinaryOp::LessOrEqual => ordering != Ordering::Greater,
                BinaryOp::Greater => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }
        BinaryOp::Add => match (left, right) {
            (Value::String(a), b) => {
                let mut joined = a.clone();
                write_value(&mut joined, b);
                Ok(Value::String(joined))
            }
            (Value::Array(a), Value::Array(b)) => {
                Ok(Value::Array(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => arithmetic(op, left, right).ok_or_else(mismatch)?,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right).ok_or_else(mismatch)?
        }
        // Short-circuit operators are handled in `evaluate`
        BinaryOp::And | BinaryOp::Or => Err(mismatch()),
    }
}

/// Numeric arithmetic; `None` when either side is not a number
fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Option<Result<Value, EvalError>> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
            return Some(Err(EvalError::DivisionByZero));
        }
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        return Some(result.map(Value::from).ok_or(EvalError::Overflow { op }));
    }

    let (a, b) = (left.as_f64()?, right.as_f64()?);
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0.0 {
        return Some(Err(EvalError::DivisionByZero));
    }
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    };
    Some(Ok(Value::from(result)))
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Template truthiness: null, false, zero and empty values are false
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Append a value in its output form
pub fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        // Display for Value is compact JSON
        other => {
            let _ = write!(out, "{}", other);
        }
    }
}

/// Convert a value to a block priority score
pub fn as_priority(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
