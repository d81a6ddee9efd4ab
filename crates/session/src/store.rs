use std::time::Duration;

use async_trait::async_trait;
use surveyflow_core::types::SessionState;
use thiserror::Error;

/// Store failures. An absent session is NOT an error — `get` returns
/// `Ok(None)` so callers can tell "unknown session" apart from backend I/O
/// failure and retry the latter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session store backend error: {0}")]
    Backend(String),

    #[error("session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Key-value persistence for conversation state, keyed by session ID.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>, StoreError>;

    async fn set(
        &self,
        session_id: &str,
        state: &SessionState,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}
