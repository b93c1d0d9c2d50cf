//! Three-tier session and message store: cache (Redis) for fast reads, the
//! row store (SQLite) as the authority for session metadata, and the search
//! index as the authority for message content.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::adapters::{CacheStore, RowStore, TextIndex};
use crate::error::DatabaseError;
use crate::model::{Role, Session, StoredMessage};

/// Session and message operations exposed to the HTTP layer.
pub struct SessionStore {
    cache: Arc<dyn CacheStore>,
    rows: Arc<dyn RowStore>,
    messages: Arc<dyn TextIndex>,
    order_counter: AtomicI64,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn CacheStore>, rows: Arc<dyn RowStore>, messages: Arc<dyn TextIndex>) -> Self {
        Self { cache, rows, messages, order_counter: AtomicI64::new(0) }
    }

    fn next_order(&self) -> i64 {
        self.order_counter.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn create_session(&self, user_id: &str, name: &str) -> Result<Session, DatabaseError> {
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            active: true,
        };
        self.rows.create_session(&session).await?;

        if let Err(e) = self.cache.set_session_field(user_id, &session.session_id, &session.name).await {
            warn!(error = %e, "cache write failed after session create, continuing with row store as source of truth");
        }
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, DatabaseError> {
        Ok(self.rows.list_sessions(user_id).await?)
    }

    pub async fn rename_session(&self, user_id: &str, session_id: &str, new_name: &str) -> Result<bool, DatabaseError> {
        let renamed = self.rows.rename_session(user_id, session_id, new_name).await?;
        if renamed {
            if let Err(e) = self.cache.set_session_field(user_id, session_id, new_name).await {
                warn!(error = %e, "cache write failed after session rename");
            }
        }
        Ok(renamed)
    }

    pub async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool, DatabaseError> {
        let deleted = self.rows.delete_session(user_id, session_id).await?;
        if deleted {
            if let Err(e) = self.cache.delete_session_hash(user_id).await {
                warn!(error = %e, "cache eviction failed after session delete");
            }
        }
        Ok(deleted)
    }

    /// Appends a message. The cache is the fast-path source for subsequent
    /// reads, so a cache write failure is fatal; the search index is the
    /// durable authority for content but a failure there only degrades
    /// future read-through, so it is logged and swallowed.
    pub async fn append_message(
        &self,
        user_id: &str,
        session_id: &str,
        role: Role,
        content: &str,
    ) -> Result<StoredMessage, DatabaseError> {
        let message = StoredMessage {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            timestamp: chrono::Utc::now().timestamp(),
            order: self.next_order(),
        };

        let json = serde_json::to_string(&message).unwrap_or_default();
        self.cache.push_message(user_id, session_id, &json).await?;

        if let Err(e) = self.messages.index_message(&message).await {
            warn!(error = %e, "search index write failed after message append, continuing");
        }
        Ok(message)
    }

    /// Read-through: tries the cache list first; on miss (empty list), falls
    /// back to the search index and repopulates the cache.
    pub async fn get_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<StoredMessage>, DatabaseError> {
        match self.cache.list_messages(user_id, session_id).await {
            Ok(raw) if !raw.is_empty() => {
                let parsed: Option<Vec<StoredMessage>> =
                    raw.iter().map(|s| serde_json::from_str(s).ok()).collect();
                if let Some(messages) = parsed {
                    return Ok(messages);
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cache read failed, falling back to search index"),
        }

        let messages = self.messages.query_messages(session_id).await?;
        for message in &messages {
            if let Ok(json) = serde_json::to_string(message) {
                let _ = self.cache.push_message(user_id, session_id, &json).await;
            }
        }
        Ok(messages)
    }

    pub async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<u64, DatabaseError> {
        let deleted = self.messages.delete_messages(session_id).await?;
        if let Err(e) = self.cache.clear_messages(user_id, session_id).await {
            warn!(error = %e, "cache eviction failed after clearing messages");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SqliteRowStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCache {
        fields: Mutex<HashMap<String, String>>,
        lists: Mutex<HashMap<String, Vec<String>>>,
    }

    impl FakeCache {
        fn new() -> Self {
            Self { fields: Mutex::new(HashMap::new()), lists: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl CacheStore for FakeCache {
        async fn get_session_field(&self, user_id: &str, field: &str) -> Result<Option<String>, crate::error::CacheError> {
            Ok(self.fields.lock().unwrap().get(&format!("{user_id}:{field}")).cloned())
        }
        async fn set_session_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), crate::error::CacheError> {
            self.fields.lock().unwrap().insert(format!("{user_id}:{field}"), value.to_string());
            Ok(())
        }
        async fn delete_session_hash(&self, user_id: &str) -> Result<(), crate::error::CacheError> {
            self.fields.lock().unwrap().retain(|k, _| !k.starts_with(&format!("{user_id}:")));
            Ok(())
        }
        async fn push_message(&self, user_id: &str, session_id: &str, message_json: &str) -> Result<(), crate::error::CacheError> {
            self.lists
                .lock()
                .unwrap()
                .entry(format!("{user_id}:{session_id}"))
                .or_default()
                .push(message_json.to_string());
            Ok(())
        }
        async fn list_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<String>, crate::error::CacheError> {
            Ok(self.lists.lock().unwrap().get(&format!("{user_id}:{session_id}")).cloned().unwrap_or_default())
        }
        async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<(), crate::error::CacheError> {
            self.lists.lock().unwrap().remove(&format!("{user_id}:{session_id}"));
            Ok(())
        }
        async fn ping(&self) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
    }

    struct FakeTextIndex {
        messages: Mutex<HashMap<String, Vec<StoredMessage>>>,
    }

    impl FakeTextIndex {
        fn new() -> Self {
            Self { messages: Mutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl TextIndex for FakeTextIndex {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<crate::model::KnowledgeHit>, crate::error::TextIndexError> {
            Ok(Vec::new())
        }
        async fn knn(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<crate::model::KnowledgeHit>, crate::error::TextIndexError> {
            Ok(Vec::new())
        }
        async fn index_doc(&self, _doc: &crate::adapters::IndexDocument) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn delete_doc(&self, _id: &str) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn delete_by_query(&self, _query: &str) -> Result<u64, crate::error::TextIndexError> {
            Ok(0)
        }
        async fn ping(&self) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn index_message(&self, message: &StoredMessage) -> Result<(), crate::error::TextIndexError> {
            self.messages.lock().unwrap().entry(message.session_id.clone()).or_default().push(message.clone());
            Ok(())
        }
        async fn query_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, crate::error::TextIndexError> {
            let mut messages = self.messages.lock().unwrap().get(session_id).cloned().unwrap_or_default();
            messages.sort_by_key(|m| m.order);
            Ok(messages)
        }
        async fn delete_messages(&self, session_id: &str) -> Result<u64, crate::error::TextIndexError> {
            Ok(self.messages.lock().unwrap().remove(session_id).map(|m| m.len() as u64).unwrap_or(0))
        }
    }

    async fn test_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let rows = Arc::new(SqliteRowStore::new(dir.path().join("s.db")).unwrap());
        let cache = Arc::new(FakeCache::new());
        let messages = Arc::new(FakeTextIndex::new());
        (SessionStore::new(cache, rows, messages), dir)
    }

    #[tokio::test]
    async fn create_list_and_delete_session() {
        let (store, _dir) = test_store().await;
        let session = store.create_session("u1", "First chat").await.unwrap();
        assert_eq!(store.list_sessions("u1").await.unwrap().len(), 1);

        store.delete_session("u1", &session.session_id).await.unwrap();
        assert!(store.list_sessions("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rename_session_updates_name() {
        let (store, _dir) = test_store().await;
        let session = store.create_session("u1", "First chat").await.unwrap();
        let renamed = store.rename_session("u1", &session.session_id, "Renamed").await.unwrap();
        assert!(renamed);
        assert_eq!(store.list_sessions("u1").await.unwrap()[0].name, "Renamed");
    }

    #[tokio::test]
    async fn append_and_read_through_messages_from_cache() {
        let (store, _dir) = test_store().await;
        let session = store.create_session("u1", "Chat").await.unwrap();
        store.append_message("u1", &session.session_id, Role::User, "hello").await.unwrap();
        store.append_message("u1", &session.session_id, Role::Assistant, "hi there").await.unwrap();

        let messages = store.get_messages("u1", &session.session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn clear_messages_empties_both_tiers() {
        let (store, _dir) = test_store().await;
        let session = store.create_session("u1", "Chat").await.unwrap();
        store.append_message("u1", &session.session_id, Role::User, "hello").await.unwrap();

        let deleted = store.clear_messages("u1", &session.session_id).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.get_messages("u1", &session.session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_messages_refills_from_search_index_on_cache_miss() {
        let dir = tempfile::tempdir().unwrap();
        let rows = Arc::new(SqliteRowStore::new(dir.path().join("s.db")).unwrap());
        let cache = Arc::new(FakeCache::new());
        let messages = Arc::new(FakeTextIndex::new());
        let store = SessionStore::new(cache.clone(), rows, messages.clone());

        let session = store.create_session("u1", "Chat").await.unwrap();
        store.append_message("u1", &session.session_id, Role::User, "hello").await.unwrap();

        // Simulate a cold cache: the message was indexed but never cached.
        cache.clear_messages("u1", &session.session_id).await.unwrap();

        let refilled = store.get_messages("u1", &session.session_id).await.unwrap();
        assert_eq!(refilled.len(), 1);
        assert_eq!(refilled[0].content, "hello");
    }

    struct FailingCache;

    #[async_trait]
    impl CacheStore for FailingCache {
        async fn get_session_field(&self, _user_id: &str, _field: &str) -> Result<Option<String>, crate::error::CacheError> {
            Ok(None)
        }
        async fn set_session_field(&self, _user_id: &str, _field: &str, _value: &str) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn delete_session_hash(&self, _user_id: &str) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn push_message(&self, _user_id: &str, _session_id: &str, _message_json: &str) -> Result<(), crate::error::CacheError> {
            Err(crate::error::CacheError::Connection("down".into()))
        }
        async fn list_messages(&self, _user_id: &str, _session_id: &str) -> Result<Vec<String>, crate::error::CacheError> {
            Ok(Vec::new())
        }
        async fn clear_messages(&self, _user_id: &str, _session_id: &str) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
        async fn ping(&self) -> Result<(), crate::error::CacheError> {
            Ok(())
        }
    }

    struct FailingTextIndex;

    #[async_trait]
    impl TextIndex for FailingTextIndex {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<crate::model::KnowledgeHit>, crate::error::TextIndexError> {
            Ok(Vec::new())
        }
        async fn knn(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<crate::model::KnowledgeHit>, crate::error::TextIndexError> {
            Ok(Vec::new())
        }
        async fn index_doc(&self, _doc: &crate::adapters::IndexDocument) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn delete_doc(&self, _id: &str) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn delete_by_query(&self, _query: &str) -> Result<u64, crate::error::TextIndexError> {
            Ok(0)
        }
        async fn ping(&self) -> Result<(), crate::error::TextIndexError> {
            Ok(())
        }
        async fn index_message(&self, _message: &StoredMessage) -> Result<(), crate::error::TextIndexError> {
            Err(crate::error::TextIndexError::Timeout)
        }
        async fn query_messages(&self, _session_id: &str) -> Result<Vec<StoredMessage>, crate::error::TextIndexError> {
            Ok(Vec::new())
        }
        async fn delete_messages(&self, _session_id: &str) -> Result<u64, crate::error::TextIndexError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn append_message_is_fatal_on_cache_failure() {
        let dir = tempfile::tempdir().unwrap();
        let rows = Arc::new(SqliteRowStore::new(dir.path().join("s.db")).unwrap());
        let store = SessionStore::new(Arc::new(FailingCache), rows, Arc::new(FakeTextIndex::new()));

        let err = store.append_message("u1", "s1", Role::User, "hello").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Cache(_)));
    }

    #[tokio::test]
    async fn append_message_tolerates_search_index_failure() {
        let dir = tempfile::tempdir().unwrap();
        let rows = Arc::new(SqliteRowStore::new(dir.path().join("s.db")).unwrap());
        let cache = Arc::new(FakeCache::new());
        let store = SessionStore::new(cache, rows, Arc::new(FailingTextIndex));

        let message = store.append_message("u1", "s1", Role::User, "hello").await.unwrap();
        assert_eq!(message.content, "hello");
    }
}
