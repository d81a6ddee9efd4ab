//! Boolean condition trees evaluated against a session variable bag.
//!
//! Conditions arrive as JSON shapes like `{"variable": "tier", "equals":
//! "gold"}` inside survey documents. The grammar is closed: unknown shapes are
//! rejected when the document is deserialized, so evaluation never has to
//! guess what a malformed rule meant.

pub mod condition;
pub mod evaluator;

pub use condition::Condition;
pub use evaluator::{evaluate, VariableMap, MAX_DEPTH};
