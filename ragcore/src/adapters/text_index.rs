//! Elasticsearch-style text index adapter: lexical search, k-nearest-neighbor
//! vector search, and document indexing.
//!
//! Grounded on the trait-plus-injectable-reqwest-client shape the teacher
//! uses for `ModelsDevResolver`/`HttpClient`, generalized from a bare `get`
//! to the handful of HTTP verbs a search index needs.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::TextIndexError;
use crate::model::{KnowledgeHit, StoredMessage};

#[derive(Clone, Debug, Serialize)]
pub struct IndexDocument {
    pub id: String,
    pub title: String,
    pub content: String,
    pub embedding: Option<Vec<f32>>,
}

/// Text-index operations used by the lexical/vector retriever, and — on an
/// instance pointed at the conversation index — by the session message store.
#[async_trait]
pub trait TextIndex: Send + Sync {
    /// BM25-style lexical search over `title`/`content`.
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError>;

    /// Dense k-nearest-neighbor search over the `embedding` field.
    async fn knn(&self, vector: &[f32], top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError>;

    async fn index_doc(&self, doc: &IndexDocument) -> Result<(), TextIndexError>;
    async fn delete_doc(&self, id: &str) -> Result<(), TextIndexError>;
    async fn delete_by_query(&self, query: &str) -> Result<u64, TextIndexError>;

    async fn ping(&self) -> Result<(), TextIndexError>;

    /// Indexes one message, keyed by `{session_id}:{order}` so repeated
    /// appends never collide.
    async fn index_message(&self, message: &StoredMessage) -> Result<(), TextIndexError>;

    /// Returns every message for `session_id`, ordered by `order` ascending.
    async fn query_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, TextIndexError>;

    /// Deletes every message for `session_id`. Returns the number removed.
    async fn delete_messages(&self, session_id: &str) -> Result<u64, TextIndexError>;
}

fn hit_from_es_source(id: String, score: f32, source: &Value) -> KnowledgeHit {
    KnowledgeHit {
        id,
        title: source.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
        content: source.get("content").and_then(Value::as_str).unwrap_or_default().to_string(),
        score,
        source: crate::model::KnowledgeSource::Text,
        metadata: Default::default(),
    }
}

/// `TextIndex` over an Elasticsearch-compatible REST API.
pub struct EsTextIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
}

impl EsTextIndex {
    pub fn new(base_url: impl Into<String>, index: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), index: index.into() }
    }

    async fn post_search(&self, body: Value) -> Result<Vec<(String, f32, Value)>, TextIndexError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?;

        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .filter_map(|h| {
                let id = h.get("_id")?.as_str()?.to_string();
                let score = h.get("_score").and_then(Value::as_f64).unwrap_or(0.0) as f32;
                let source = h.get("_source")?.clone();
                Some((id, score, source))
            })
            .collect())
    }
}

#[async_trait]
impl TextIndex for EsTextIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
        let body = json!({
            "size": top_k,
            "query": { "multi_match": { "query": query, "fields": ["title^2", "content"] } }
        });
        let raw = self.post_search(body).await?;
        Ok(raw.into_iter().map(|(id, score, source)| hit_from_es_source(id, score, &source)).collect())
    }

    async fn knn(&self, vector: &[f32], top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
        let body = json!({
            "size": top_k,
            "knn": {
                "field": "embedding",
                "query_vector": vector,
                "k": top_k,
                "num_candidates": (top_k * 10).max(50),
            }
        });
        let raw = self.post_search(body).await?;
        Ok(raw.into_iter().map(|(id, score, source)| hit_from_es_source(id, score, &source)).collect())
    }

    async fn index_doc(&self, doc: &IndexDocument) -> Result<(), TextIndexError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, doc.id);
        self.client
            .put(&url)
            .json(&json!({ "title": doc.title, "content": doc.content, "embedding": doc.embedding }))
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(&self, id: &str) -> Result<(), TextIndexError> {
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, id);
        self.client
            .delete(&url)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_query(&self, query: &str) -> Result<u64, TextIndexError> {
        let url = format!("{}/{}/_delete_by_query", self.base_url, self.index);
        let body = json!({ "query": { "query_string": { "query": query } } });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(response.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<(), TextIndexError> {
        self.client
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(())
    }

    async fn index_message(&self, message: &StoredMessage) -> Result<(), TextIndexError> {
        let doc_id = format!("{}:{}", message.session_id, message.order);
        let url = format!("{}/{}/_doc/{}", self.base_url, self.index, doc_id);
        self.client
            .put(&url)
            .json(message)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(())
    }

    async fn query_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>, TextIndexError> {
        let url = format!("{}/{}/_search", self.base_url, self.index);
        let body = json!({
            "size": 10_000,
            "sort": [{ "order": "asc" }],
            "query": { "term": { "session_id": session_id } },
        });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?;

        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(hits
            .into_iter()
            .filter_map(|h| serde_json::from_value::<StoredMessage>(h.get("_source")?.clone()).ok())
            .collect())
    }

    async fn delete_messages(&self, session_id: &str) -> Result<u64, TextIndexError> {
        let url = format!("{}/{}/_delete_by_query", self.base_url, self.index);
        let body = json!({ "query": { "term": { "session_id": session_id } } });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| TextIndexError::Request(e.to_string()))?
            .json::<Value>()
            .await
            .map_err(|e| TextIndexError::Request(e.to_string()))?;
        Ok(response.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_from_es_source_defaults_missing_fields_to_empty_strings() {
        let hit = hit_from_es_source("doc1".to_string(), 1.5, &json!({}));
        assert_eq!(hit.title, "");
        assert_eq!(hit.content, "");
        assert_eq!(hit.score, 1.5);
    }

    #[test]
    fn hit_from_es_source_reads_title_and_content() {
        let hit = hit_from_es_source("doc1".to_string(), 2.0, &json!({"title": "GDPR", "content": "body text"}));
        assert_eq!(hit.title, "GDPR");
        assert_eq!(hit.content, "body text");
    }

    #[tokio::test]
    async fn ping_against_unreachable_host_is_a_request_error() {
        let index = EsTextIndex::new("http://127.0.0.1:1", "docs");
        let err = index.ping().await.unwrap_err();
        assert!(matches!(err, TextIndexError::Request(_)));
    }
}
