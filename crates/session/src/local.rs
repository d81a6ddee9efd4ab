//! In-process session store backed by DashMap for lock-free concurrent
//! access. Same TTL semantics as the Redis backend, degraded durability.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use surveyflow_core::types::SessionState;

use crate::store::{SessionStore, StoreError};

struct Entry {
    state: SessionState,
    deadline: Instant,
}

/// Process-local session store for single-node deployments and tests.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, Entry>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Remove expired entries. Reads already drop expired sessions lazily;
    /// this sweep reclaims memory for sessions nobody asks about again.
    pub fn evict_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.deadline > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionState>, StoreError> {
        match self.entries.get(session_id) {
            Some(entry) if entry.deadline > Instant::now() => {
                metrics::counter!("session.store.hit").increment(1);
                Ok(Some(entry.state.clone()))
            }
            Some(entry) => {
                drop(entry);
                self.entries.remove(session_id);
                metrics::counter!("session.store.miss").increment(1);
                Ok(None)
            }
            None => {
                metrics::counter!("session.store.miss").increment(1);
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
        self.entries.insert(
            session_id.to_string(),
            Entry {
                state: state.clone(),
                deadline: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.entries.remove(session_id);
        Ok(())
    }
}
