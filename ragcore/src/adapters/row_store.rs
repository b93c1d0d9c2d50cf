//! SQLite-backed row store: the durable tier of session/message persistence.
//!
//! Every call opens its own short-lived `rusqlite::Connection` inside
//! `spawn_blocking`, the way the teacher's `SqliteStore` does — rusqlite is
//! not `Send` across `.await` points, so the connection never crosses one.

use async_trait::async_trait;
use rusqlite::params;

use crate::error::RowStoreError;
use crate::model::{Role, Session, StoredMessage};

/// Durable storage for sessions and messages.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<(), RowStoreError>;
    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>, RowStoreError>;
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, RowStoreError>;
    async fn rename_session(&self, user_id: &str, session_id: &str, new_name: &str) -> Result<bool, RowStoreError>;
    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool, RowStoreError>;

    async fn append_message(&self, message: &StoredMessage) -> Result<(), RowStoreError>;
    async fn get_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<StoredMessage>, RowStoreError>;
    async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<u64, RowStoreError>;

    async fn ping(&self) -> Result<(), RowStoreError>;
}

/// `RowStore` over a SQLite file.
pub struct SqliteRowStore {
    db_path: std::path::PathBuf,
}

impl SqliteRowStore {
    pub fn new(path: impl AsRef<std::path::Path>) -> Result<Self, RowStoreError> {
        let db_path = path.as_ref().to_path_buf();
        let conn = rusqlite::Connection::open(&db_path)
            .map_err(|e| RowStoreError::Connection(e.to_string()))?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                PRIMARY KEY (user_id, session_id)
            );
            CREATE TABLE IF NOT EXISTS messages (
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                ord INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS messages_session_idx ON messages (user_id, session_id, ord);
            "#,
        )
        .map_err(|e| RowStoreError::Query(e.to_string()))?;
        Ok(Self { db_path })
    }

    fn open(&self) -> Result<rusqlite::Connection, RowStoreError> {
        rusqlite::Connection::open(&self.db_path).map_err(|e| RowStoreError::Connection(e.to_string()))
    }
}

fn role_to_str(role: Role) -> &'static str {
    role.as_str()
}

fn role_from_str(s: &str) -> Role {
    match s {
        "assistant" => Role::Assistant,
        _ => Role::User,
    }
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn create_session(&self, session: &Session) -> Result<(), RowStoreError> {
        let db_path = self.db_path.clone();
        let session = session.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            conn.execute(
                "INSERT INTO sessions (session_id, user_id, name, created_at, active) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![session.session_id, session.user_id, session.name, session.created_at, session.active as i64],
            )
            .map_err(|e| RowStoreError::Query(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn get_session(&self, user_id: &str, session_id: &str) -> Result<Option<Session>, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT session_id, user_id, name, created_at, active FROM sessions WHERE user_id = ?1 AND session_id = ?2")
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            let mut rows = stmt
                .query(params![user_id, session_id])
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            match rows.next().map_err(|e| RowStoreError::Query(e.to_string()))? {
                Some(row) => Ok(Some(Session {
                    session_id: row.get(0).map_err(|e| RowStoreError::Query(e.to_string()))?,
                    user_id: row.get(1).map_err(|e| RowStoreError::Query(e.to_string()))?,
                    name: row.get(2).map_err(|e| RowStoreError::Query(e.to_string()))?,
                    created_at: row.get(3).map_err(|e| RowStoreError::Query(e.to_string()))?,
                    active: row.get::<_, i64>(4).map_err(|e| RowStoreError::Query(e.to_string()))? != 0,
                })),
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let mut stmt = conn
                .prepare("SELECT session_id, user_id, name, created_at, active FROM sessions WHERE user_id = ?1 AND active = 1 ORDER BY created_at DESC")
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id], |row| {
                    Ok(Session {
                        session_id: row.get(0)?,
                        user_id: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                        active: row.get::<_, i64>(4)? != 0,
                    })
                })
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| RowStoreError::Query(e.to_string()))
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn rename_session(&self, user_id: &str, session_id: &str, new_name: &str) -> Result<bool, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        let new_name = new_name.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let updated = conn
                .execute(
                    "UPDATE sessions SET name = ?1 WHERE user_id = ?2 AND session_id = ?3",
                    params![new_name, user_id, session_id],
                )
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            Ok(updated > 0)
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn delete_session(&self, user_id: &str, session_id: &str) -> Result<bool, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let updated = conn
                .execute(
                    "UPDATE sessions SET active = 0 WHERE user_id = ?1 AND session_id = ?2",
                    params![user_id, session_id],
                )
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            Ok(updated > 0)
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn append_message(&self, message: &StoredMessage) -> Result<(), RowStoreError> {
        let db_path = self.db_path.clone();
        let message = message.clone();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            conn.execute(
                "INSERT INTO messages (session_id, user_id, role, content, timestamp, ord) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    message.session_id,
                    message.user_id,
                    role_to_str(message.role),
                    message.content,
                    message.timestamp,
                    message.order,
                ],
            )
            .map_err(|e| RowStoreError::Query(e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn get_messages(&self, user_id: &str, session_id: &str) -> Result<Vec<StoredMessage>, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let mut stmt = conn
                .prepare(
                    "SELECT session_id, user_id, role, content, timestamp, ord FROM messages \
                     WHERE user_id = ?1 AND session_id = ?2 ORDER BY ord ASC",
                )
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            let rows = stmt
                .query_map(params![user_id, session_id], |row| {
                    let role_str: String = row.get(2)?;
                    Ok(StoredMessage {
                        session_id: row.get(0)?,
                        user_id: row.get(1)?,
                        role: role_from_str(&role_str),
                        content: row.get(3)?,
                        timestamp: row.get(4)?,
                        order: row.get(5)?,
                    })
                })
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(|e| RowStoreError::Query(e.to_string()))
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn clear_messages(&self, user_id: &str, session_id: &str) -> Result<u64, RowStoreError> {
        let db_path = self.db_path.clone();
        let user_id = user_id.to_string();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = rusqlite::Connection::open(&db_path)
                .map_err(|e| RowStoreError::Connection(e.to_string()))?;
            let deleted = conn
                .execute(
                    "DELETE FROM messages WHERE user_id = ?1 AND session_id = ?2",
                    params![user_id, session_id],
                )
                .map_err(|e| RowStoreError::Query(e.to_string()))?;
            Ok(deleted as u64)
        })
        .await
        .map_err(|e| RowStoreError::Query(e.to_string()))?
    }

    async fn ping(&self) -> Result<(), RowStoreError> {
        let conn = self.open()?;
        conn.execute_batch("SELECT 1").map_err(|e| RowStoreError::Query(e.to_string()))
    }
}
