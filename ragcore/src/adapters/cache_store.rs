//! Redis-backed cache tier: the fast read-through/write-through layer in front
//! of the row store. Holds `sessions:{user_id}` as a hash and
//! `messages:{user_id}:{session_id}` as a list, mirroring the row store's
//! shape so a cache miss can be repopulated verbatim from a row store read.
//!
//! Not grounded in the teacher (no pack repo depends on a Redis client);
//! `redis` is the standard async Rust client for this role.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::error::CacheError;

/// Cache-tier operations the session store needs: session hash lookups and
/// per-session message lists.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_session_field(&self, user_id: &str, field: &str) -> Result<Option<String>, CacheError>;
    async fn set_session_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), CacheError>;
    async fn delete_session_hash(&self, user_id: &str) -> Result<(), CacheError>;

    async fn push_message(&self, user_id: &str, session_id: &str, message_json: &str) -> Result<(), CacheError>;
    async fn list_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<String>, CacheError>;
    async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

fn session_key(user_id: &str) -> String {
    format!("sessions:{user_id}")
}

fn messages_key(user_id: &str, session_id: &str) -> String {
    format!("messages:{user_id}:{session_id}")
}

/// `CacheStore` over a single Redis connection multiplexer, cheap to clone
/// and safe to share across tasks.
pub struct RedisCacheStore {
    client: redis::Client,
}

impl RedisCacheStore {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get_session_field(&self, user_id: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn().await?;
        conn.hget(session_key(user_id), field)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn set_session_field(&self, user_id: &str, field: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.hset(session_key(user_id), field, value)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn delete_session_hash(&self, user_id: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.del(session_key(user_id)).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn push_message(&self, user_id: &str, session_id: &str, message_json: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.rpush(messages_key(user_id, session_id), message_json)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn list_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn().await?;
        conn.lrange(messages_key(user_id, session_id), 0, -1)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        conn.del(messages_key(user_id, session_id)).await.map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| CacheError::Backend(e.to_string()))
    }
}
