//! Variable updates applied on every answer submission, before navigation.
//!
//! Pure: `(block, answer) -> deltas`, so derivations are testable without
//! the resolver. The engine merges the returned deltas into session state.

use serde_json::{json, Value};
use surveyflow_conditions::VariableMap;
use surveyflow_core::types::Block;
use tracing::debug;

use crate::resolver::matched_option;

/// Computes the variable writes for one submitted answer:
/// the block's declared `variable`, any matched option's `setVariables`
/// (merged in addition to the `variable` write), and block-specific
/// derivations for the standard document.
pub fn derive_variables(block: &Block, answer: &Value) -> VariableMap {
    let mut deltas = VariableMap::new();

    if let Some(name) = &block.variable {
        debug!(block = %block.id, variable = %name, "storing raw answer in variable");
        deltas.insert(name.clone(), answer.clone());
    }

    if let Some(option) = matched_option(block, answer) {
        if let Some(extra) = &option.set_variables {
            debug!(block = %block.id, option = %option.id, "merging option setVariables");
            for (key, value) in extra {
                deltas.insert(key.clone(), value.clone());
            }
        }
    }

    derive_special(&block.id, answer, &mut deltas);
    deltas
}

/// Block-specific derivations from the community arts survey document.
fn derive_special(block_id: &str, answer: &Value, deltas: &mut VariableMap) {
    match block_id {
        // Respondent name
        "b3" => {
            let name = answer.as_str().unwrap_or_default().to_string();
            deltas.insert("user_name".to_string(), Value::String(name));
        }
        // Connection to the arts; also keys dynamic-message content variants
        "b4" => {
            deltas.insert("connection_type".to_string(), answer.clone());
        }
        // Multi-select arts connections
        "b5" => {
            deltas.insert("arts_connections".to_string(), answer.clone());
            let items = answer.as_array().cloned().unwrap_or_default();
            deltas.insert("arts_connections_count".to_string(), json!(items.len()));
            deltas.insert(
                "arts_connections_contains_other".to_string(),
                json!(items.contains(&json!("other"))),
            );
        }
        "b6" => {
            deltas.insert("arts_importance".to_string(), answer.clone());
        }
        // Video responses carry a typed sub-object, or a skipped marker
        "b7" => video_response_deltas("personal_story", answer, deltas),
        "b12" => video_response_deltas("future_vision", answer, deltas),
        "b18" => {
            deltas.insert("demographics_consent".to_string(), answer.clone());
        }
        // Demographics group answers merge wholesale
        "b19" => {
            if let Some(fields) = answer.as_object() {
                for (key, value) in fields {
                    deltas.insert(key.clone(), value.clone());
                }
            }
        }
        _ => {}
    }
}

fn video_response_deltas(prefix: &str, answer: &Value, deltas: &mut VariableMap) {
    match answer.as_object() {
        Some(fields) => {
            deltas.insert(
                format!("{prefix}_type"),
                fields.get("type").cloned().unwrap_or_else(|| json!("skipped")),
            );
            deltas.insert(
                format!("{prefix}_response_id"),
                fields.get("responseId").cloned().unwrap_or(Value::Null),
            );
            deltas.insert(
                format!("{prefix}_response_url"),
                fields.get("responseUrl").cloned().unwrap_or(Value::Null),
            );
        }
        None => {
            deltas.insert(format!("{prefix}_type"), json!("skipped"));
        }
    }
}
