//! DashMap-backed session store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use casitas_core::result::AppResult;
use casitas_core::traits::session::{SessionRecord, SessionStore, SessionUpdate};

/// Session store keeping every session in a sharded concurrent map.
///
/// Updates to one key hold only that key's shard lock, so chunk requests for
/// different uploads proceed in parallel.
#[derive(Debug, Clone)]
pub struct MemorySessionStore<S: SessionRecord> {
    sessions: Arc<DashMap<String, S>>,
}

impl<S: SessionRecord> MemorySessionStore<S> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Whether a session is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }
}

impl<S: SessionRecord> Default for MemorySessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired<S: SessionRecord>(session: &S, cutoff: DateTime<Utc>) -> bool {
    session.created_at() < cutoff && !session.is_busy()
}

#[async_trait]
impl<S: SessionRecord + std::fmt::Debug> SessionStore<S> for MemorySessionStore<S> {
    async fn get(&self, key: &str) -> AppResult<Option<S>> {
        Ok(self.sessions.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, session: S) -> AppResult<Option<S>> {
        Ok(self.sessions.insert(session.key().to_string(), session))
    }

    async fn delete(&self, key: &str) -> AppResult<Option<S>> {
        Ok(self.sessions.remove(key).map(|(_, session)| session))
    }

    async fn update(&self, key: &str, update: SessionUpdate<S>) -> AppResult<Option<S>> {
        let Some(mut entry) = self.sessions.get_mut(key) else {
            return Ok(None);
        };
        let mut draft = entry.value().clone();
        update(&mut draft)?;
        *entry.value_mut() = draft.clone();
        Ok(Some(draft))
    }

    async fn sweep(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<S>> {
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| is_expired(entry.value(), cutoff))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for key in expired {
            // Re-check under the removal lock in case the session changed.
            if let Some((_, session)) = self
                .sessions
                .remove_if(&key, |_, s| is_expired(s, cutoff))
            {
                removed.push(session);
            }
        }

        debug!(removed = removed.len(), "Swept expired sessions");
        Ok(removed)
    }

    async fn keys(&self) -> AppResult<Vec<String>> {
        Ok(self.sessions.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn len(&self) -> AppResult<usize> {
        Ok(self.sessions.len())
    }
}
