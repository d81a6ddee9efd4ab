//! Pure, deterministic evaluation of condition trees.

use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::condition::Condition;

/// The session variable bag: variable name to arbitrary JSON value.
pub type VariableMap = HashMap<String, Value>;

/// Recursion bound for nested `not`/`or`/`and` trees. A document nested
/// deeper than this evaluates to false rather than exhausting the stack.
pub const MAX_DEPTH: usize = 32;

/// Evaluates a condition against the variable bag. No side effects; the same
/// inputs always produce the same result.
pub fn evaluate(condition: &Condition, variables: &VariableMap) -> bool {
    evaluate_at(condition, variables, 0)
}

fn evaluate_at(condition: &Condition, variables: &VariableMap, depth: usize) -> bool {
    if depth > MAX_DEPTH {
        warn!(depth, "condition tree exceeds depth bound, evaluating false");
        return false;
    }

    match condition {
        Condition::Equals { variable, expected } => match variables.get(variable) {
            Some(Value::Array(actual)) => match expected {
                Value::Array(items) => arrays_match(actual, items),
                _ => false,
            },
            Some(actual) => actual == expected,
            None => false,
        },
        Condition::Contains { variable, needle } => variables
            .get(variable)
            .and_then(Value::as_array)
            .is_some_and(|items| items.contains(needle)),
        Condition::GreaterThan { variable, threshold } => variables
            .get(variable)
            .and_then(Value::as_f64)
            .is_some_and(|actual| actual > *threshold),
        Condition::LessThan { variable, threshold } => variables
            .get(variable)
            .and_then(Value::as_f64)
            .is_some_and(|actual| actual < *threshold),
        Condition::Not(inner) => !evaluate_at(inner, variables, depth + 1),
        Condition::Or(branches) => branches
            .iter()
            .any(|branch| evaluate_at(branch, variables, depth + 1)),
        Condition::And(branches) => branches
            .iter()
            .all(|branch| evaluate_at(branch, variables, depth + 1)),
    }
}

/// Order-insensitive array comparison: both sides are canonicalized by their
/// serialized element form before comparing.
fn arrays_match(left: &[Value], right: &[Value]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    canonical(left) == canonical(right)
}

fn canonical(values: &[Value]) -> Vec<String> {
    let mut keys: Vec<String> = values.iter().map(Value::to_string).collect();
    keys.sort();
    keys
}
