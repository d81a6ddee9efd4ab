//! Completion progress over the canonical respondent journey.

use serde_json::Value;
use surveyflow_core::types::SessionState;

/// Communication-preference block whose answer selects a follow-up variant.
const COMM_PREFERENCE_BLOCK: &str = "b16";
/// Demographics block, shown only after consent.
const DEMOGRAPHICS_BLOCK: &str = "b19";
/// Closing block, always part of the journey.
const FINAL_BLOCK: &str = "b20";

const COMM_PREFERENCE_VARIANTS: [&str; 4] = ["email", "newsletter", "text", "mix"];

/// Percentage of the expected journey completed, clamped to 100.
///
/// Pure function of (main path, state): the expected set is the document's
/// section ordering plus variant blocks implied by answers already given.
/// Duplicate entries in `completed_blocks` cannot inflate the result.
pub fn calculate_progress(main_path: &[String], state: &SessionState) -> u8 {
    let mut expected: Vec<String> = main_path.to_vec();

    if let Some(preference) = state
        .answers
        .get(COMM_PREFERENCE_BLOCK)
        .and_then(Value::as_str)
    {
        if COMM_PREFERENCE_VARIANTS.contains(&preference) {
            push_unique(&mut expected, format!("b16a-{preference}"));
        }
    }

    if state.variables.get("demographics_consent") == Some(&Value::Bool(true)) {
        push_unique(&mut expected, DEMOGRAPHICS_BLOCK.to_string());
    }

    push_unique(&mut expected, FINAL_BLOCK.to_string());

    if expected.is_empty() {
        return 0;
    }

    let completed = expected
        .iter()
        .filter(|id| state.completed_blocks.iter().any(|done| done == *id))
        .count();

    let percent = ((completed as f64 / expected.len() as f64) * 100.0).round() as u32;
    percent.min(100) as u8
}

fn push_unique(expected: &mut Vec<String>, id: String) {
    if !expected.contains(&id) {
        expected.push(id);
    }
}
