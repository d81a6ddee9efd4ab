//! Orchestrator tying the catalog, session store, resolver, and renderer
//! together. One public operation maps to one store read and at most one
//! store write, so a crash mid-operation never leaves a half-advanced
//! session behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use surveyflow_core::types::{CurrentBlock, SessionState};
use surveyflow_core::SurveyCatalog;
use surveyflow_session::SessionStore;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::progress::calculate_progress;
use crate::render::{format_ack, format_block, FormattedBlock};
use crate::resolver::{resolve_next, ResolvedBlock};
use crate::variables::derive_variables;

/// Result of starting a new conversation.
#[derive(Debug)]
pub struct StartOutcome {
    pub session_id: String,
    pub first_question: FormattedBlock,
    pub progress: u8,
}

/// Result of submitting an answer. `next_question` is `None` when the
/// conversation has reached a dead end (normally the final block).
#[derive(Debug)]
pub struct AnswerOutcome {
    pub next_question: Option<FormattedBlock>,
    pub progress: u8,
}

/// The survey conversation engine. Stateless between calls; every operation
/// loads session state from the injected store and persists the updated
/// state in a single write.
pub struct SurveyEngine {
    catalog: Arc<SurveyCatalog>,
    store: Arc<dyn SessionStore>,
    session_ttl: Duration,
}

impl SurveyEngine {
    pub fn new(
        catalog: Arc<SurveyCatalog>,
        store: Arc<dyn SessionStore>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            catalog,
            store,
            session_ttl,
        }
    }

    /// Creates a session at the catalog's start block and returns the
    /// rendered first question. The engine serves exactly one survey; a
    /// mismatched `survey_id` is the caller addressing the wrong instance.
    pub async fn start(
        &self,
        survey_id: &str,
        respondent_name: Option<&str>,
    ) -> Result<StartOutcome, EngineError> {
        if survey_id != self.catalog.survey_id() {
            return Err(EngineError::UnknownSurvey(survey_id.to_string()));
        }

        let session_id = Uuid::new_v4().to_string();
        let response_id = Uuid::new_v4().to_string();
        let state = SessionState::new(
            self.catalog.survey_id(),
            &response_id,
            self.catalog.start_id(),
            respondent_name,
        );

        self.store
            .set(&session_id, &state, self.session_ttl)
            .await?;
        info!(
            session = %session_id,
            survey = %self.catalog.survey_id(),
            start = %self.catalog.start_id(),
            "session started"
        );

        Ok(StartOutcome {
            session_id,
            first_question: format_block(self.catalog.start_block(), &state.variables),
            progress: calculate_progress(self.catalog.main_path(), &state),
        })
    }

    /// Records an answer for `block_id`, advances navigation, and returns the
    /// next rendered question.
    pub async fn answer(
        &self,
        session_id: &str,
        block_id: &str,
        answer: &Value,
    ) -> Result<AnswerOutcome, EngineError> {
        let mut state = self.load(session_id).await?;

        state.answers.insert(block_id.to_string(), answer.clone());
        state.completed_blocks.push(block_id.to_string());

        // Synthetic acknowledgement IDs are not catalog blocks and derive
        // nothing.
        if let Some(block) = self.catalog.get(block_id) {
            let deltas = derive_variables(block, answer);
            state.variables.extend(deltas);
        }

        let resolved = resolve_next(&self.catalog, &mut state, block_id, answer);
        state.updated_at = Utc::now();

        self.store
            .set(session_id, &state, self.session_ttl)
            .await?;

        let progress = calculate_progress(self.catalog.main_path(), &state);
        let next_question = resolved.map(|block| self.format_resolved(block, &state));

        if next_question.is_none() {
            info!(session = %session_id, block = %block_id, "conversation reached terminal block");
        }

        Ok(AnswerOutcome {
            next_question,
            progress,
        })
    }

    /// Re-renders whatever the session is currently looking at, without
    /// advancing. Used on reconnect.
    pub async fn current_question(
        &self,
        session_id: &str,
    ) -> Result<Option<FormattedBlock>, EngineError> {
        let state = self.load(session_id).await?;
        let formatted = match &state.current {
            CurrentBlock::At { block_id } => match self.catalog.get(block_id) {
                Some(block) => Some(format_block(block, &state.variables)),
                None => {
                    warn!(session = %session_id, block = %block_id, "current block missing from catalog");
                    None
                }
            },
            CurrentBlock::AwaitingAck {
                original_id,
                message,
                next,
            } => Some(format_ack(
                original_id,
                message,
                next.clone(),
                &state.variables,
            )),
        };
        Ok(formatted)
    }

    pub async fn progress(&self, session_id: &str) -> Result<u8, EngineError> {
        let state = self.load(session_id).await?;
        Ok(calculate_progress(self.catalog.main_path(), &state))
    }

    /// Drops the session. Idempotent.
    pub async fn clear(&self, session_id: &str) -> Result<(), EngineError> {
        self.store.delete(session_id).await?;
        info!(session = %session_id, "session cleared");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionState, EngineError> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn format_resolved(&self, resolved: ResolvedBlock, state: &SessionState) -> FormattedBlock {
        match resolved {
            ResolvedBlock::Real(block) => format_block(&block, &state.variables),
            ResolvedBlock::Ack {
                original_id,
                message,
                next,
            } => format_ack(&original_id, &message, next, &state.variables),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use surveyflow_session::MemorySessionStore;

    fn engine(document: serde_json::Value) -> SurveyEngine {
        let catalog = SurveyCatalog::from_str(&document.to_string()).expect("valid catalog");
        SurveyEngine::new(
            Arc::new(catalog),
            Arc::new(MemorySessionStore::new()),
            Duration::from_secs(60),
        )
    }

    fn two_block_survey() -> serde_json::Value {
        json!({
            "survey": {"id": "s1", "name": "test",
                       "sections": [{"blocks": ["b1", "b2"]}]},
            "blocks": {
                "b1": {"id": "b1", "type": "text-input",
                       "content": "What's your name?", "next": "b2",
                       "variable": "user_name"},
                "b2": {"id": "b2", "type": "final-message",
                       "content": "Bye, {{user_name}}!"}
            }
        })
    }

    #[tokio::test]
    async fn test_start_creates_session_at_first_block() {
        let engine = engine(two_block_survey());
        let outcome = engine.start("s1", Some("Ada")).await.unwrap();
        assert_eq!(outcome.first_question.id, "b1");
        assert_eq!(outcome.progress, 0);

        let current = engine
            .current_question(&outcome.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.id, "b1");
    }

    #[tokio::test]
    async fn test_answer_advances_and_renders_with_new_variables() {
        let engine = engine(two_block_survey());
        let started = engine.start("s1", None).await.unwrap();

        let outcome = engine
            .answer(&started.session_id, "b1", &json!("Ada"))
            .await
            .unwrap();
        let next = outcome.next_question.unwrap();
        assert_eq!(next.id, "b2");
        assert_eq!(next.content, "Bye, Ada!");
    }

    #[tokio::test]
    async fn test_terminal_block_yields_none_and_full_progress() {
        let engine = engine(two_block_survey());
        let started = engine.start("s1", None).await.unwrap();

        engine
            .answer(&started.session_id, "b1", &json!("Ada"))
            .await
            .unwrap();
        let outcome = engine
            .answer(&started.session_id, "b2", &json!("acknowledged"))
            .await
            .unwrap();
        assert!(outcome.next_question.is_none());
        // b1, b2 done; b20 is appended to the expected path but absent from
        // this document, so progress stays below 100 until it completes.
        assert_eq!(outcome.progress, 67);
    }

    #[tokio::test]
    async fn test_start_rejects_mismatched_survey_id() {
        let engine = engine(two_block_survey());
        let err = engine.start("some-other-survey", None).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownSurvey(_)));
    }

    #[tokio::test]
    async fn test_unknown_session_is_an_error() {
        let engine = engine(two_block_survey());
        let err = engine
            .answer("missing", "b1", &json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound(_)));
        assert!(engine.current_question("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_answer_shows_ack_then_consumes_it() {
        let engine = engine(json!({
            "survey": {"id": "s1", "name": "test",
                       "sections": [{"blocks": ["b1", "b2"]}]},
            "blocks": {
                "b1": {"id": "b1", "type": "text-input", "content": "q", "next": "b2",
                       "onEmpty": {"message": "No worries, {{user_name}}!"}},
                "b2": {"id": "b2", "type": "final-message", "content": "bye"}
            }
        }));
        let started = engine.start("s1", Some("Ada")).await.unwrap();

        let outcome = engine
            .answer(&started.session_id, "b1", &json!(""))
            .await
            .unwrap();
        let ack = outcome.next_question.unwrap();
        assert_eq!(ack.id, "b1-ack");
        assert_eq!(ack.content, "No worries, Ada!");

        // Reconnect while the ack is pending re-renders the same ack.
        let current = engine
            .current_question(&started.session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.id, "b1-ack");

        let outcome = engine
            .answer(&started.session_id, &ack.id, &json!("acknowledged"))
            .await
            .unwrap();
        assert_eq!(outcome.next_question.unwrap().id, "b2");
    }

    #[tokio::test]
    async fn test_clear_forgets_the_session() {
        let engine = engine(two_block_survey());
        let started = engine.start("s1", None).await.unwrap();
        engine.clear(&started.session_id).await.unwrap();
        assert!(engine.progress(&started.session_id).await.is_err());
    }
}
