//! External-service adapters: one trait plus one concrete implementation per
//! backend. All four are constructed once at startup and shared behind `Arc`.

pub mod cache_store;
pub mod graph_engine;
pub mod row_store;
pub mod text_index;

pub use cache_store::{CacheStore, RedisCacheStore};
pub use graph_engine::{GraphEngine, Neo4jGraphEngine};
pub use row_store::{RowStore, SqliteRowStore};
pub use text_index::{EsTextIndex, IndexDocument, TextIndex};
