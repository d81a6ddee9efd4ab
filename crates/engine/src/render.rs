//! Client-facing block formatting: content variant selection plus template
//! substitution in content, option labels, and placeholders.

use serde::Serialize;
use serde_json::Value;
use surveyflow_conditions::{evaluate, VariableMap};
use surveyflow_core::types::{
    Block, BlockContent, BlockOption, BlockType, ConditionalContentItem, ContentRule,
};
use surveyflow_templating::{display_value, render};

/// Fallback when a dynamic-message variant map matches nothing and declares
/// no `default` key.
const DYNAMIC_FALLBACK: &str = "Thanks for sharing!";

/// A fully rendered block, ready for the transport layer to ship to the
/// respondent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedBlock {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<BlockOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_ask_form_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    /// Deferred target carried on synthetic acknowledgement blocks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Renders a catalog block against the current variable bag.
pub fn format_block(block: &Block, variables: &VariableMap) -> FormattedBlock {
    let content = resolve_content(block, variables);

    let options = block.options.as_ref().map(|options| {
        options
            .iter()
            .map(|option| BlockOption {
                label: render(&option.label, variables),
                ..option.clone()
            })
            .collect()
    });

    FormattedBlock {
        id: block.id.clone(),
        block_type: block.block_type,
        content,
        placeholder: block
            .placeholder
            .as_ref()
            .map(|text| render(text, variables)),
        options,
        video_ask_form_id: block.video_ask_form_id.clone(),
        video_url: block.video_url.clone(),
        next: None,
    }
}

/// Renders a synthetic acknowledgement as a transient dynamic message. The
/// `-ack` id is cosmetic: navigation reads the pending transition from
/// session state, never from this string.
pub fn format_ack(
    original_id: &str,
    message: &str,
    next: Option<String>,
    variables: &VariableMap,
) -> FormattedBlock {
    FormattedBlock {
        id: format!("{original_id}-ack"),
        block_type: BlockType::DynamicMessage,
        content: render(message, variables),
        placeholder: None,
        options: None,
        video_ask_form_id: None,
        video_url: None,
        next,
    }
}

fn resolve_content(block: &Block, variables: &VariableMap) -> String {
    let base = match &block.content {
        Some(BlockContent::Text(text)) => text.clone(),
        Some(BlockContent::Variants(map)) => {
            if let Some(selector) = &block.content_condition {
                let key = if evaluate(&selector.condition, variables) {
                    &selector.then
                } else {
                    &selector.otherwise
                };
                map.get(key).cloned().unwrap_or_default()
            } else {
                // Variant keyed by a variable's current value, with a
                // document-level `default` fallback.
                block
                    .content_variable
                    .as_ref()
                    .and_then(|name| variables.get(name))
                    .map(|value| display_value(value))
                    .and_then(|key| map.get(&key).cloned())
                    .or_else(|| map.get("default").cloned())
                    .unwrap_or_else(|| DYNAMIC_FALLBACK.to_string())
            }
        }
        None => String::new(),
    };

    let base = if base.is_empty() || base == "placeholder" {
        block
            .conditional_content
            .as_deref()
            .and_then(|rules| first_matching(rules, variables))
            .unwrap_or(base)
    } else {
        base
    };

    render(&base, variables)
}

/// First matching `conditionalContent` entry; the literal `"default"` tag
/// always matches.
fn first_matching(rules: &[ConditionalContentItem], variables: &VariableMap) -> Option<String> {
    for rule in rules {
        match &rule.condition {
            ContentRule::Tag(tag) if tag == "default" => return Some(rule.content.clone()),
            ContentRule::Tag(_) => {}
            ContentRule::When(condition) => {
                if evaluate(condition, variables) {
                    return Some(rule.content.clone());
                }
            }
        }
    }
    None
}
