use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use surveyflow_conditions::{Condition, VariableMap};

/// The kind of question or message a block presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    TextInput,
    SingleChoice,
    MultiChoice,
    YesNo,
    QuickReply,
    Scale,
    Ranking,
    SemanticDifferential,
    MixedMedia,
    #[serde(rename = "videoask")]
    VideoAsk,
    VideoAutoplay,
    DynamicMessage,
    FinalMessage,
    MessageButton,
    DemographicsGroup,
}

/// Block text: either a single template string or a map of keyed variants
/// (selected via `contentVariable` or `contentCondition`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Text(String),
    Variants(HashMap<String, String>),
}

/// One selectable answer on a choice-like block. An option may override the
/// block-level `next` and merge extra variables into session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockOption {
    pub id: String,
    pub value: Value,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_variables: Option<VariableMap>,
}

/// Behavior when the submitted answer is the empty string. A `message` defers
/// the real transition behind an acknowledgement block.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnEmpty {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

/// Conditional routing tree: `else` either terminates in a block ID or
/// recurses into another condition.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalNext {
    #[serde(rename = "if")]
    pub condition: Condition,
    pub then: String,
    #[serde(rename = "else", default)]
    pub otherwise: Option<ElseBranch>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElseBranch {
    Nested(Box<ConditionalNext>),
    Target(String),
}

/// Selects one of two content-variant keys based on a condition.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentCondition {
    #[serde(rename = "if")]
    pub condition: Condition,
    pub then: String,
    #[serde(rename = "else")]
    pub otherwise: String,
}

/// One entry of a `conditionalContent` list; first matching entry wins and
/// the literal tag `"default"` always matches.
#[derive(Debug, Clone, Deserialize)]
pub struct ConditionalContentItem {
    pub condition: ContentRule,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentRule {
    When(Condition),
    Tag(String),
}

/// A node in the survey graph.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub content: Option<BlockContent>,
    /// Variable whose current value selects a content variant.
    #[serde(default)]
    pub content_variable: Option<String>,
    #[serde(default)]
    pub content_condition: Option<ContentCondition>,
    #[serde(default)]
    pub conditional_content: Option<Vec<ConditionalContentItem>>,
    #[serde(default)]
    pub options: Option<Vec<BlockOption>>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub video_ask_form_id: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub conditional_next: Option<ConditionalNext>,
    #[serde(default)]
    pub on_empty: Option<OnEmpty>,
    #[serde(default)]
    pub show_if: Option<Condition>,
    /// Variable name receiving this block's raw answer verbatim.
    #[serde(default)]
    pub variable: Option<String>,
}

impl Block {
    /// True when the block has nothing to display (routing-only blocks).
    pub fn has_empty_content(&self) -> bool {
        match &self.content {
            None => true,
            Some(BlockContent::Text(text)) => text.is_empty(),
            Some(BlockContent::Variants(_)) => false,
        }
    }
}

/// Where a session currently stands. `AwaitingAck` is the explicit form of a
/// synthetic acknowledgement block: the deferred transition lives in state
/// instead of being re-derived from an ID suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CurrentBlock {
    At {
        block_id: String,
    },
    AwaitingAck {
        original_id: String,
        message: String,
        next: Option<String>,
    },
}

/// One respondent's in-progress conversation. Owned by the session store;
/// the engine mutates a copy and persists it in a single write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub survey_id: String,
    /// Opaque correlation key into the external response-record store.
    pub response_id: String,
    pub current: CurrentBlock,
    #[serde(default)]
    pub variables: VariableMap,
    /// Append-only visit log; may contain duplicates on revisits.
    #[serde(default)]
    pub completed_blocks: Vec<String>,
    /// Last submitted raw answer per block.
    #[serde(default)]
    pub answers: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(
        survey_id: impl Into<String>,
        response_id: impl Into<String>,
        start_block_id: impl Into<String>,
        respondent_name: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        let mut variables = VariableMap::new();
        variables.insert(
            "user_name".to_string(),
            Value::String(respondent_name.unwrap_or_default().to_string()),
        );
        Self {
            survey_id: survey_id.into(),
            response_id: response_id.into(),
            current: CurrentBlock::At {
                block_id: start_block_id.into(),
            },
            variables,
            completed_blocks: Vec::new(),
            answers: HashMap::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// The block ID the respondent is looking at (the original block while an
    /// acknowledgement is pending).
    pub fn current_block_id(&self) -> &str {
        match &self.current {
            CurrentBlock::At { block_id } => block_id,
            CurrentBlock::AwaitingAck { original_id, .. } => original_id,
        }
    }
}
