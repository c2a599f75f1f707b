//! Session store contract for in-flight upload sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::result::AppResult;

/// A value that can be kept in a [`SessionStore`].
pub trait SessionRecord: Clone + Send + Sync + 'static {
    /// Key the record is stored under.
    fn key(&self) -> &str;

    /// Creation time, used by [`SessionStore::sweep`].
    fn created_at(&self) -> DateTime<Utc>;

    /// Whether the record is in use and must survive a sweep.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Mutation applied atomically to a stored session.
pub type SessionUpdate<S> = Box<dyn FnOnce(&mut S) -> AppResult<()> + Send>;

/// Concurrency-safe keyed store for upload sessions.
///
/// Defined generically so the store can be swapped for an external cache
/// without touching the endpoints that use it.
#[async_trait]
pub trait SessionStore<S: SessionRecord>: Send + Sync + std::fmt::Debug + 'static {
    /// Get a snapshot of the session stored under `key`.
    async fn get(&self, key: &str) -> AppResult<Option<S>>;

    /// Store `session`, returning the session it replaced, if any.
    async fn set(&self, session: S) -> AppResult<Option<S>>;

    /// Remove the session stored under `key`.
    async fn delete(&self, key: &str) -> AppResult<Option<S>>;

    /// Apply `update` to the session under `key` while holding its entry lock.
    ///
    /// Returns the updated snapshot, `None` if no such session exists, or
    /// the error raised by `update` (in which case the session is left as it
    /// was before the call).
    async fn update(&self, key: &str, update: SessionUpdate<S>) -> AppResult<Option<S>>;

    /// Remove every session created before `cutoff` that is not busy, and
    /// return them.
    async fn sweep(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<S>>;

    /// Keys of every stored session.
    async fn keys(&self) -> AppResult<Vec<String>>;

    /// Number of sessions currently stored.
    async fn len(&self) -> AppResult<usize>;
}
