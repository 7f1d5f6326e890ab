//! SessionStore trait and the in-memory implementation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::domain::{ChatId, Session};

/// Shared, individually locked session record
///
/// Holding the lock gives exclusive control over one chat's queue, pointer and
/// reminder handle. Events for the same chat therefore run one at a time.
pub type SessionRef = Arc<Mutex<Session>>;

/// Owner of all sessions, injected into the controller and reminder scheduler
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Look up an existing session
    async fn get(&self, chat_id: ChatId) -> Option<SessionRef>;

    /// Look up a session, creating an empty one on first contact
    async fn get_or_create(&self, chat_id: ChatId) -> SessionRef;

    /// All known chat identities, in ascending order
    async fn chat_ids(&self) -> Vec<ChatId>;

    /// Number of known sessions
    async fn len(&self) -> usize {
        self.chat_ids().await.len()
    }
}

/// Process-lifetime session store backed by a map
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<ChatId, SessionRef>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        debug!("MemorySessionStore::new: called");
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, chat_id: ChatId) -> Option<SessionRef> {
        debug!(%chat_id, "MemorySessionStore::get: called");
        self.sessions.read().await.get(&chat_id).cloned()
    }

    async fn get_or_create(&self, chat_id: ChatId) -> SessionRef {
        debug!(%chat_id, "MemorySessionStore::get_or_create: called");
        if let Some(existing) = self.sessions.read().await.get(&chat_id) {
            return existing.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(chat_id)
            .or_insert_with(|| {
                debug!(%chat_id, "MemorySessionStore::get_or_create: creating session");
                Arc::new(Mutex::new(Session::new(chat_id)))
            })
            .clone()
    }

    async fn chat_ids(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemorySessionStore::new();
        assert!(store.get(7).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_get_or_create_is_lazy_and_stable() {
        let store = MemorySessionStore::new();

        let first = store.get_or_create(7).await;
        let second = store.get_or_create(7).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.lock().await.chat_id(), 7);

        let fetched = store.get(7).await.unwrap();
        assert!(Arc::ptr_eq(&first, &fetched));
    }

    #[tokio::test]
    async fn test_chat_ids_sorted() {
        let store = MemorySessionStore::new();
        store.get_or_create(30).await;
        store.get_or_create(-5).await;
        store.get_or_create(12).await;

        assert_eq!(store.chat_ids().await, vec![-5, 12, 30]);
        assert_eq!(store.len().await, 3);
    }
}
