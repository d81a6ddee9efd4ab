//! The immutable block catalog, loaded once from a survey document.
//!
//! Loading is the only place that can fail: malformed JSON, unknown condition
//! shapes, and dangling block references are all fatal here, so the resolver
//! never meets an invalid graph at request time.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{SurveyError, SurveyResult};
use crate::types::{Block, ConditionalNext, ElseBranch};

/// On-disk document shape.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyDocument {
    pub survey: SurveyMeta,
    pub blocks: HashMap<String, Block>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyMeta {
    pub id: String,
    pub name: String,
    /// First block presented to the respondent. Defaults to the first block
    /// of the first section.
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Sections give the canonical question ordering, used for progress path
/// construction and by export collaborators for column ordering.
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: Option<String>,
    pub blocks: Vec<String>,
}

/// Immutable ID-to-block mapping plus the document's canonical ordering.
/// Safe for unsynchronized concurrent reads after construction.
#[derive(Debug, Clone)]
pub struct SurveyCatalog {
    meta: SurveyMeta,
    blocks: HashMap<String, Block>,
    start_id: String,
    main_path: Vec<String>,
}

impl SurveyCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> SurveyResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_str(&raw)?;
        info!(
            survey = %catalog.survey_id(),
            blocks = catalog.blocks.len(),
            path = %path.as_ref().display(),
            "survey catalog loaded"
        );
        Ok(catalog)
    }

    pub fn from_str(raw: &str) -> SurveyResult<Self> {
        let document: SurveyDocument = serde_json::from_str(raw)
            .map_err(|e| SurveyError::Config(format!("invalid survey document: {e}")))?;
        Self::from_document(document)
    }

    pub fn from_document(document: SurveyDocument) -> SurveyResult<Self> {
        let SurveyDocument { survey, blocks } = document;

        for (key, block) in &blocks {
            if key != &block.id {
                return Err(SurveyError::Config(format!(
                    "block key '{key}' does not match embedded id '{}'",
                    block.id
                )));
            }
        }

        let dangling = dangling_references(&blocks);
        if !dangling.is_empty() {
            return Err(SurveyError::Config(format!(
                "dangling block references: {}",
                dangling.join(", ")
            )));
        }

        let main_path: Vec<String> = survey
            .sections
            .iter()
            .flat_map(|section| section.blocks.iter().cloned())
            .collect();
        for id in &main_path {
            if !blocks.contains_key(id) {
                return Err(SurveyError::Config(format!(
                    "section references unknown block '{id}'"
                )));
            }
        }

        let start_id = survey
            .start
            .clone()
            .or_else(|| main_path.first().cloned())
            .ok_or_else(|| {
                SurveyError::Config("survey declares no start block and no sections".to_string())
            })?;
        if !blocks.contains_key(&start_id) {
            return Err(SurveyError::Config(format!(
                "start block '{start_id}' not found in catalog"
            )));
        }

        Ok(Self {
            meta: survey,
            blocks,
            start_id,
            main_path,
        })
    }

    pub fn get(&self, block_id: &str) -> Option<&Block> {
        self.blocks.get(block_id)
    }

    pub fn start_block(&self) -> &Block {
        // Validated at construction.
        &self.blocks[&self.start_id]
    }

    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    /// The canonical respondent journey, in section order.
    pub fn main_path(&self) -> &[String] {
        &self.main_path
    }

    pub fn survey_id(&self) -> &str {
        &self.meta.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Collects `from -> to` descriptions for every navigation target that does
/// not exist in the catalog.
fn dangling_references(blocks: &HashMap<String, Block>) -> Vec<String> {
    let mut dangling = Vec::new();
    let mut check = |from: &str, target: &Option<String>| {
        if let Some(to) = target {
            if !blocks.contains_key(to) {
                dangling.push(format!("{from} -> {to}"));
            }
        }
    };

    for (id, block) in blocks {
        check(id, &block.next);
        if let Some(on_empty) = &block.on_empty {
            check(id, &on_empty.next);
        }
        if let Some(options) = &block.options {
            for option in options {
                check(id, &option.next);
            }
        }
        if let Some(tree) = &block.conditional_next {
            for target in conditional_targets(tree) {
                check(id, &Some(target));
            }
        }
    }

    dangling.sort();
    dangling
}

fn conditional_targets(tree: &ConditionalNext) -> Vec<String> {
    let mut targets = vec![tree.then.clone()];
    match &tree.otherwise {
        Some(ElseBranch::Target(id)) => targets.push(id.clone()),
        Some(ElseBranch::Nested(inner)) => targets.extend(conditional_targets(inner)),
        None => {}
    }
    targets
}
