//! The three-pass template renderer.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use surveyflow_conditions::VariableMap;

use crate::value::{display_value, is_truthy};

// Pass order is fixed: if/else before bare if before plain substitution, so
// the literal braces inside conditional arms are never consumed by the
// variable pass.
static IF_ELSE_RE: OnceLock<Regex> = OnceLock::new();
static IF_RE: OnceLock<Regex> = OnceLock::new();
static VAR_RE: OnceLock<Regex> = OnceLock::new();

fn if_else_re() -> &'static Regex {
    IF_ELSE_RE.get_or_init(|| {
        Regex::new(r"\{\{#if (\w+)\}\}(.*?)\{\{else\}\}(.*?)\{\{/if\}\}")
            .expect("if/else pattern is valid")
    })
}

fn if_re() -> &'static Regex {
    IF_RE.get_or_init(|| {
        Regex::new(r"\{\{#if (\w+)\}\}(.*?)\{\{/if\}\}").expect("if pattern is valid")
    })
}

fn var_re() -> &'static Regex {
    VAR_RE.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("variable pattern is valid"))
}

/// Substitutes all placeholders in `text` from the variable bag. Missing
/// variables render as the empty string; this function never fails.
pub fn render(text: &str, variables: &VariableMap) -> String {
    let truthy = |name: &str| variables.get(name).is_some_and(is_truthy);

    let pass1 = if_else_re().replace_all(text, |caps: &Captures<'_>| {
        if truthy(&caps[1]) {
            caps[2].to_string()
        } else {
            caps[3].to_string()
        }
    });

    let pass2 = if_re().replace_all(&pass1, |caps: &Captures<'_>| {
        if truthy(&caps[1]) {
            caps[2].to_string()
        } else {
            String::new()
        }
    });

    var_re()
        .replace_all(&pass2, |caps: &Captures<'_>| {
            variables.get(&caps[1]).map(display_value).unwrap_or_default()
        })
        .into_owned()
}
