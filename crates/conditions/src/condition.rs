//! The condition expression tree and its shape-validating deserializer.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A boolean expression over the session variable bag.
///
/// Leaf variants compare a single variable; `Not`/`Or`/`And` combine nested
/// conditions. The set of variants is closed — a document containing a
/// condition that matches none of the known JSON shapes fails to load.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Exact equality, except arrays compare order-insensitively.
    Equals { variable: String, expected: Value },
    /// Array membership. False (not an error) when the variable is absent
    /// or holds a non-array value.
    Contains { variable: String, needle: Value },
    /// Numeric `>` comparison.
    GreaterThan { variable: String, threshold: f64 },
    /// Numeric `<` comparison.
    LessThan { variable: String, threshold: f64 },
    Not(Box<Condition>),
    Or(Vec<Condition>),
    And(Vec<Condition>),
}

/// Raw document shape. `deny_unknown_fields` is what closes the grammar:
/// a key outside this set fails deserialization instead of silently
/// evaluating to anything.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawCondition {
    variable: Option<String>,
    equals: Option<Value>,
    contains: Option<Value>,
    greater_than: Option<Value>,
    less_than: Option<Value>,
    not: Option<Box<Condition>>,
    or: Option<OneOrMany>,
    and: Option<Vec<Condition>>,
}

/// `or` accepts either a single nested condition or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Condition>),
    One(Box<Condition>),
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawCondition::deserialize(deserializer)?;

        let mut operators = 0;
        for present in [
            raw.equals.is_some(),
            raw.contains.is_some(),
            raw.greater_than.is_some(),
            raw.less_than.is_some(),
            raw.not.is_some(),
            raw.or.is_some(),
            raw.and.is_some(),
        ] {
            if present {
                operators += 1;
            }
        }
        if operators != 1 {
            return Err(D::Error::custom(
                "condition must contain exactly one of equals/contains/greaterThan/lessThan/not/or/and",
            ));
        }

        let comparison = raw.equals.is_some()
            || raw.contains.is_some()
            || raw.greater_than.is_some()
            || raw.less_than.is_some();
        match (comparison, raw.variable.is_some()) {
            (true, false) => {
                return Err(D::Error::custom("comparison condition is missing 'variable'"));
            }
            (false, true) => {
                return Err(D::Error::custom(
                    "'variable' is only valid on comparison conditions",
                ));
            }
            _ => {}
        }

        if let Some(expected) = raw.equals {
            return Ok(Condition::Equals {
                variable: raw.variable.unwrap_or_default(),
                expected,
            });
        }
        if let Some(needle) = raw.contains {
            return Ok(Condition::Contains {
                variable: raw.variable.unwrap_or_default(),
                needle,
            });
        }
        if let Some(value) = raw.greater_than {
            let threshold = value
                .as_f64()
                .ok_or_else(|| D::Error::custom("'greaterThan' requires a numeric bound"))?;
            return Ok(Condition::GreaterThan {
                variable: raw.variable.unwrap_or_default(),
                threshold,
            });
        }
        if let Some(value) = raw.less_than {
            let threshold = value
                .as_f64()
                .ok_or_else(|| D::Error::custom("'lessThan' requires a numeric bound"))?;
            return Ok(Condition::LessThan {
                variable: raw.variable.unwrap_or_default(),
                threshold,
            });
        }
        if let Some(inner) = raw.not {
            return Ok(Condition::Not(inner));
        }
        if let Some(branches) = raw.or {
            return Ok(Condition::Or(match branches {
                OneOrMany::Many(list) => list,
                OneOrMany::One(single) => vec![*single],
            }));
        }
        if let Some(branches) = raw.and {
            return Ok(Condition::And(branches));
        }

        unreachable!("operator count was validated above")
    }
}
