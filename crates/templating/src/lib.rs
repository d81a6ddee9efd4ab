//! Placeholder substitution for survey block text.
//!
//! Supports `{{var}}`, `{{#if var}}A{{/if}}` and `{{#if var}}A{{else}}B{{/if}}`
//! over the session variable bag. Rendering never fails: a missing variable
//! substitutes as the empty string.

pub mod render;
pub mod value;

pub use render::render;
pub use value::{display_value, is_truthy};
