//! The navigation state machine: given the current block, the submitted
//! answer, and session state, computes the next block.
//!
//! Transitions are computed per call, never pre-enumerated. Priority order:
//! pending acknowledgement, `onEmpty`, option override, block-level `next`,
//! `conditionalNext` — then display-guard skips and routing-block
//! auto-advance until a visible block or a dead end.

use serde_json::Value;
use surveyflow_conditions::{evaluate, VariableMap};
use surveyflow_core::types::{
    Block, BlockOption, BlockType, ConditionalNext, CurrentBlock, ElseBranch, SessionState,
};
use surveyflow_core::SurveyCatalog;
use tracing::{debug, warn};

/// Bound on skip/auto-advance hops in one call; a cyclic document terminates
/// navigation instead of looping.
pub const MAX_HOPS: usize = 64;

/// Bound on `conditionalNext` else-chain recursion.
const MAX_CHAIN: usize = 32;

/// What navigation resolved to: a real catalog block, or a transient
/// acknowledgement shown before a deferred transition.
#[derive(Debug, Clone)]
pub enum ResolvedBlock {
    Real(Block),
    Ack {
        original_id: String,
        message: String,
        next: Option<String>,
    },
}

enum Candidate {
    Ack(ResolvedBlock),
    Target(String),
    DeadEnd,
}

/// Resolves the next block, mutating `state.current` in memory only — the
/// caller persists the final state exactly once, so a transition is never
/// half-persisted.
pub fn resolve_next(
    catalog: &SurveyCatalog,
    state: &mut SessionState,
    block_id: &str,
    answer: &Value,
) -> Option<ResolvedBlock> {
    let mut current_id = block_id.to_string();
    let mut answer = answer.clone();

    for _ in 0..MAX_HOPS {
        let candidate = match next_candidate(catalog, state, &current_id, &answer) {
            Candidate::Ack(ack) => return Some(ack),
            Candidate::Target(id) => id,
            Candidate::DeadEnd => return None,
        };

        let Some(next_block) = catalog.get(&candidate) else {
            warn!(target = %candidate, "navigation target missing from catalog");
            return None;
        };

        // Display-guard: skip invisible blocks transparently.
        if let Some(guard) = &next_block.show_if {
            if !evaluate(guard, &state.variables) {
                debug!(block = %candidate, "display guard false, skipping block");
                state.current = CurrentBlock::At {
                    block_id: candidate.clone(),
                };
                current_id = candidate;
                answer = Value::Null;
                continue;
            }
        }

        // Routing-only blocks (nothing to show, own conditional routing) are
        // invisible to the respondent.
        if next_block.block_type == BlockType::DynamicMessage
            && next_block.has_empty_content()
            && next_block.conditional_next.is_some()
        {
            debug!(block = %candidate, "auto-advancing through routing block");
            state.current = CurrentBlock::At {
                block_id: candidate.clone(),
            };
            current_id = candidate;
            answer = Value::String("acknowledged".to_string());
            continue;
        }

        state.current = CurrentBlock::At {
            block_id: candidate.clone(),
        };
        return Some(ResolvedBlock::Real(next_block.clone()));
    }

    warn!(start = %block_id, "navigation exceeded hop limit, terminating");
    None
}

fn next_candidate(
    catalog: &SurveyCatalog,
    state: &mut SessionState,
    current_id: &str,
    answer: &Value,
) -> Candidate {
    // A pending acknowledgement carries its deferred transition in state;
    // consume it and go there directly.
    if let CurrentBlock::AwaitingAck {
        original_id, next, ..
    } = state.current.clone()
    {
        debug!(original = %original_id, "consuming deferred empty-answer transition");
        state.current = CurrentBlock::At {
            block_id: original_id,
        };
        return match next {
            Some(target) => Candidate::Target(target),
            None => Candidate::DeadEnd,
        };
    }

    let Some(block) = catalog.get(current_id) else {
        warn!(block = %current_id, "current block missing from catalog");
        return Candidate::DeadEnd;
    };

    // Empty answer: either defer behind an acknowledgement, or take the
    // onEmpty route directly.
    if answer.as_str() == Some("") {
        if let Some(on_empty) = &block.on_empty {
            let deferred = on_empty.next.clone().or_else(|| block.next.clone());
            if let Some(message) = &on_empty.message {
                debug!(block = %block.id, "empty answer, deferring behind acknowledgement");
                state.current = CurrentBlock::AwaitingAck {
                    original_id: block.id.clone(),
                    message: message.clone(),
                    next: deferred.clone(),
                };
                return Candidate::Ack(ResolvedBlock::Ack {
                    original_id: block.id.clone(),
                    message: message.clone(),
                    next: deferred,
                });
            }
            return match deferred {
                Some(target) => Candidate::Target(target),
                None => Candidate::DeadEnd,
            };
        }
    }

    // A matched option's `next` overrides the block-level `next`; the
    // block-level `conditionalNext` is only consulted when neither produced
    // a candidate.
    let mut candidate = matched_option(block, answer).and_then(|option| option.next.clone());
    if candidate.is_none() {
        candidate = block.next.clone();
    }
    if candidate.is_none() {
        if let Some(tree) = &block.conditional_next {
            candidate = resolve_conditional(tree, &state.variables, 0);
        }
    }

    match candidate {
        Some(target) => Candidate::Target(target),
        None => {
            debug!(block = %current_id, "no next block");
            Candidate::DeadEnd
        }
    }
}

/// Finds the option matching the answer by value or id, coercing between
/// booleans and the strings "true"/"false".
pub fn matched_option<'a>(block: &'a Block, answer: &Value) -> Option<&'a BlockOption> {
    block
        .options
        .as_deref()?
        .iter()
        .find(|option| option_matches(option, answer))
}

fn option_matches(option: &BlockOption, answer: &Value) -> bool {
    if &option.value == answer {
        return true;
    }
    if answer.as_str() == Some(option.id.as_str()) {
        return true;
    }
    match (&option.value, answer) {
        (Value::Bool(b), Value::String(s)) => *b == (s == "true"),
        (Value::String(s), Value::Bool(b)) => (s == "true") == *b,
        _ => false,
    }
}

fn resolve_conditional(
    tree: &ConditionalNext,
    variables: &VariableMap,
    depth: usize,
) -> Option<String> {
    if depth > MAX_CHAIN {
        warn!(depth, "conditionalNext chain exceeds depth bound");
        return None;
    }
    if evaluate(&tree.condition, variables) {
        return Some(tree.then.clone());
    }
    match &tree.otherwise {
        Some(ElseBranch::Nested(inner)) => resolve_conditional(inner, variables, depth + 1),
        Some(ElseBranch::Target(target)) => Some(target.clone()),
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use surveyflow_core::catalog::SurveyCatalog;
    use surveyflow_core::types::SessionState;

    fn catalog(blocks: serde_json::Value) -> SurveyCatalog {
        let ids: Vec<String> = blocks
            .as_object()
            .expect("blocks object")
            .keys()
            .cloned()
            .collect();
        let document = json!({
            "survey": {"id": "s1", "name": "test", "start": ids[0], "sections": [{"blocks": ids}]},
            "blocks": blocks
        });
        SurveyCatalog::from_str(&document.to_string()).expect("valid catalog")
    }

    fn state_at(block_id: &str) -> SessionState {
        SessionState::new("s1", "r1", block_id, None)
    }

    #[test]
    fn test_plain_next() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "b2"},
            "b2": {"id": "b2", "type": "final-message", "content": "bye"}
        }));
        let mut state = state_at("b1");
        let resolved = resolve_next(&catalog, &mut state, "b1", &json!("hello"));
        match resolved {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "b2"),
            other => panic!("expected real block, got {other:?}"),
        }
        assert_eq!(state.current, CurrentBlock::At { block_id: "b2".into() });
    }

    #[test]
    fn test_option_next_overrides_block_next() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "single-choice", "content": "q", "next": "x",
                   "options": [
                       {"id": "a", "value": "a", "label": "A", "next": "y"},
                       {"id": "b", "value": "b", "label": "B"}
                   ]},
            "x": {"id": "x", "type": "final-message", "content": "x"},
            "y": {"id": "y", "type": "final-message", "content": "y"}
        }));

        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("a")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "y"),
            other => panic!("expected y, got {other:?}"),
        }

        // An option without its own next falls back to the block-level next.
        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("b")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "x"),
            other => panic!("expected x, got {other:?}"),
        }
    }

    #[test]
    fn test_boolean_string_option_coercion() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "yes-no", "content": "q",
                   "options": [
                       {"id": "yes", "value": true, "label": "Yes", "next": "y"},
                       {"id": "no", "value": false, "label": "No", "next": "n"}
                   ]},
            "y": {"id": "y", "type": "final-message", "content": "y"},
            "n": {"id": "n", "type": "final-message", "content": "n"}
        }));

        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("true")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "y"),
            other => panic!("expected y, got {other:?}"),
        }
        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("false")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "n"),
            other => panic!("expected n, got {other:?}"),
        }
    }

    #[test]
    fn test_conditional_next_all_four_paths() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "dynamic-message", "content": "q",
                   "conditionalNext": {
                       "if": {"variable": "a", "equals": true},
                       "then": "ta",
                       "else": {
                           "if": {"variable": "b", "equals": true},
                           "then": "tb",
                           "else": {
                               "if": {"variable": "c", "equals": true},
                               "then": "tc",
                               "else": "td"
                           }
                       }
                   }},
            "ta": {"id": "ta", "type": "final-message", "content": "a"},
            "tb": {"id": "tb", "type": "final-message", "content": "b"},
            "tc": {"id": "tc", "type": "final-message", "content": "c"},
            "td": {"id": "td", "type": "final-message", "content": "d"}
        }));

        let cases = [
            (vec![("a", true)], "ta"),
            (vec![("b", true)], "tb"),
            (vec![("c", true)], "tc"),
            (vec![], "td"),
        ];
        for (flags, expected) in cases {
            let mut state = state_at("b1");
            for (name, value) in flags {
                state.variables.insert(name.to_string(), json!(value));
            }
            match resolve_next(&catalog, &mut state, "b1", &json!("ok")) {
                Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, expected),
                other => panic!("expected {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_option_match_beats_conditional_next() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "single-choice", "content": "q",
                   "options": [{"id": "a", "value": "a", "label": "A", "next": "y"}],
                   "conditionalNext": {"if": {"variable": "a", "equals": 1},
                                       "then": "x", "else": "x"}},
            "x": {"id": "x", "type": "final-message", "content": "x"},
            "y": {"id": "y", "type": "final-message", "content": "y"}
        }));
        let mut state = state_at("b1");
        state.variables.insert("a".into(), json!(1));
        match resolve_next(&catalog, &mut state, "b1", &json!("a")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "y"),
            other => panic!("expected y, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_answer_defers_behind_ack() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "b2",
                   "onEmpty": {"message": "No worries!", "next": "b3"}},
            "b2": {"id": "b2", "type": "final-message", "content": "2"},
            "b3": {"id": "b3", "type": "final-message", "content": "3"}
        }));

        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("")) {
            Some(ResolvedBlock::Ack {
                original_id,
                message,
                next,
            }) => {
                assert_eq!(original_id, "b1");
                assert_eq!(message, "No worries!");
                assert_eq!(next.as_deref(), Some("b3"));
            }
            other => panic!("expected ack, got {other:?}"),
        }
        assert!(matches!(state.current, CurrentBlock::AwaitingAck { .. }));

        // Second call consumes the pending ack and lands on the real target
        // exactly once — no double advance.
        match resolve_next(&catalog, &mut state, "b1", &json!("acknowledged")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "b3"),
            other => panic!("expected b3, got {other:?}"),
        }
        assert_eq!(state.current, CurrentBlock::At { block_id: "b3".into() });
    }

    #[test]
    fn test_empty_answer_without_message_routes_directly() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "b2",
                   "onEmpty": {"next": "b3"}},
            "b2": {"id": "b2", "type": "final-message", "content": "2"},
            "b3": {"id": "b3", "type": "final-message", "content": "3"}
        }));
        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "b3"),
            other => panic!("expected b3, got {other:?}"),
        }
    }

    #[test]
    fn test_display_guard_skip_chain() {
        // h1..h3 all hidden; navigation must traverse them in one call.
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "h1"},
            "h1": {"id": "h1", "type": "dynamic-message", "content": "hidden", "next": "h2",
                   "showIf": {"variable": "show", "equals": true}},
            "h2": {"id": "h2", "type": "dynamic-message", "content": "hidden", "next": "h3",
                   "showIf": {"variable": "show", "equals": true}},
            "h3": {"id": "h3", "type": "dynamic-message", "content": "hidden", "next": "end",
                   "showIf": {"variable": "show", "equals": true}},
            "end": {"id": "end", "type": "final-message", "content": "done"}
        }));

        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("x")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "end"),
            other => panic!("expected end, got {other:?}"),
        }
    }

    #[test]
    fn test_display_guard_chain_to_dead_end() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "h1"},
            "h1": {"id": "h1", "type": "dynamic-message", "content": "hidden",
                   "showIf": {"variable": "show", "equals": true}}
        }));
        let mut state = state_at("b1");
        assert!(resolve_next(&catalog, &mut state, "b1", &json!("x")).is_none());
    }

    #[test]
    fn test_auto_advance_through_routing_block() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "route"},
            "route": {"id": "route", "type": "dynamic-message", "content": "",
                      "conditionalNext": {"if": {"variable": "tier", "equals": "gold"},
                                          "then": "vip", "else": "std"}},
            "vip": {"id": "vip", "type": "final-message", "content": "vip"},
            "std": {"id": "std", "type": "final-message", "content": "std"}
        }));

        let mut state = state_at("b1");
        state.variables.insert("tier".into(), json!("gold"));
        match resolve_next(&catalog, &mut state, "b1", &json!("x")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "vip"),
            other => panic!("expected vip, got {other:?}"),
        }

        let mut state = state_at("b1");
        match resolve_next(&catalog, &mut state, "b1", &json!("x")) {
            Some(ResolvedBlock::Real(block)) => assert_eq!(block.id, "std"),
            other => panic!("expected std, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_current_block_terminates() {
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "final-message", "content": "x"}
        }));
        let mut state = state_at("ghost");
        assert!(resolve_next(&catalog, &mut state, "ghost", &json!("x")).is_none());
    }

    #[test]
    fn test_cycle_terminates_at_hop_limit() {
        // Two hidden blocks referencing each other.
        let catalog = catalog(json!({
            "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "h1"},
            "h1": {"id": "h1", "type": "dynamic-message", "content": "x", "next": "h2",
                   "showIf": {"variable": "show", "equals": true}},
            "h2": {"id": "h2", "type": "dynamic-message", "content": "x", "next": "h1",
                   "showIf": {"variable": "show", "equals": true}}
        }));
        let mut state = state_at("b1");
        assert!(resolve_next(&catalog, &mut state, "b1", &json!("x")).is_none());
    }
}
