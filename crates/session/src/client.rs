//! Redis-backed session store for multi-process deployments.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use surveyflow_core::types::SessionState;
use tracing::{debug, info};

use crate::store::{SessionStore, StoreError};

/// Sessions live under `survey:<session_id>` with a per-write TTL (`SET EX`),
/// so expiry is enforced by Redis, not the engine.
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    /// Connect and verify connectivity with a PING.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        info!(url = %url, "Connecting to Redis session store");
        let client = redis::Client::open(url)?;

        let mut conn = client.get_multiplexed_async_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(response = %pong, "Redis connection established");

        Ok(Self { client })
    }

    fn key(session_id: &str) -> String {
        format!("survey:{session_id}")
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let data: Option<String> = conn.get(Self::key(session_id)).await?;

        match data {
            Some(json) => {
                metrics::counter!("session.store.hit").increment(1);
                let state: SessionState = serde_json::from_str(&json)?;
                Ok(Some(state))
            }
            None => {
                metrics::counter!("session.store.miss").increment(1);
                debug!(session = %session_id, "session not found in Redis");
                Ok(None)
            }
        }
    }

    async fn set(
        &self,
        session_id: &str,
        state: &SessionState,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(Self::key(session_id), &json, ttl.as_secs())
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::key(session_id)).await?;
        Ok(())
    }
}
