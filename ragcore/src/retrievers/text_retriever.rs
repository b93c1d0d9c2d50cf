//! Lexical + dense-vector hybrid search over the text index.
//!
//! Runs BM25-style lexical search and kNN vector search concurrently, min-max
//! normalizes each score list independently, then fuses them with
//! [`FusionWeights`] before deduping by document id and truncating to `top_k`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::adapters::TextIndex;
use crate::embedding::Embedder;
use crate::model::KnowledgeHit;

/// Lexical/vector score fusion weights. Defaults match the balance the
/// retrieval pipeline was tuned against: vector search carries more signal
/// for this corpus's long-form regulatory text than exact-term matching.
#[derive(Clone, Copy, Debug)]
pub struct FusionWeights {
    pub lexical: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self { lexical: 0.4, vector: 0.6 }
    }
}

fn min_max_normalize(hits: &[KnowledgeHit]) -> HashMap<String, f32> {
    if hits.is_empty() {
        return HashMap::new();
    }
    let min = hits.iter().map(|h| h.score).fold(f32::INFINITY, f32::min);
    let max = hits.iter().map(|h| h.score).fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    hits.iter()
        .map(|h| {
            let normalized = if range > f32::EPSILON { (h.score - min) / range } else { 1.0 };
            (h.id.clone(), normalized)
        })
        .collect()
}

pub struct TextRetriever {
    index: Arc<dyn TextIndex>,
    embedder: Arc<dyn Embedder>,
    weights: FusionWeights,
}

impl TextRetriever {
    pub fn new(index: Arc<dyn TextIndex>, embedder: Arc<dyn Embedder>, weights: FusionWeights) -> Self {
        Self { index, embedder, weights }
    }

    /// Retrieves up to `top_k` fused hits. Never returns an error: a failure
    /// in either leg degrades that leg to an empty result set and is logged.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Vec<KnowledgeHit> {
        let lexical_fut = self.lexical_search(question, top_k);
        let vector_fut = self.vector_search(question, top_k);
        let (lexical, vector) = tokio::join!(lexical_fut, vector_fut);

        self.fuse(lexical, vector, top_k)
    }

    async fn lexical_search(&self, question: &str, top_k: usize) -> Vec<KnowledgeHit> {
        match self.index.search(question, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "lexical search failed, continuing with vector results only");
                Vec::new()
            }
        }
    }

    async fn vector_search(&self, question: &str, top_k: usize) -> Vec<KnowledgeHit> {
        let embedding = match self.embedder.embed(&[question]).await {
            Ok(mut vectors) if !vectors.is_empty() => vectors.remove(0),
            Ok(_) => {
                warn!("embedder returned no vectors for the question, skipping vector search");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "embedding the question failed, continuing with lexical results only");
                return Vec::new();
            }
        };

        match self.index.knn(&embedding, top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "vector search failed, continuing with lexical results only");
                Vec::new()
            }
        }
    }

    fn fuse(&self, lexical: Vec<KnowledgeHit>, vector: Vec<KnowledgeHit>, top_k: usize) -> Vec<KnowledgeHit> {
        let lexical_scores = min_max_normalize(&lexical);
        let vector_scores = min_max_normalize(&vector);

        let mut by_id: HashMap<String, KnowledgeHit> = HashMap::new();
        for hit in lexical.into_iter().chain(vector.into_iter()) {
            by_id.entry(hit.id.clone()).or_insert(hit);
        }

        let mut fused: Vec<KnowledgeHit> = by_id
            .into_values()
            .map(|mut hit| {
                let lex = lexical_scores.get(&hit.id).copied().unwrap_or(0.0);
                let vec_score = vector_scores.get(&hit.id).copied().unwrap_or(0.0);
                hit.score = self.weights.lexical * lex + self.weights.vector * vec_score;
                hit
            })
            .collect();

        fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);
        fused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TextIndexError;
    use crate::model::KnowledgeSource;
    use async_trait::async_trait;

    fn hit(id: &str, score: f32) -> KnowledgeHit {
        KnowledgeHit {
            id: id.to_string(),
            title: id.to_string(),
            content: String::new(),
            score,
            source: KnowledgeSource::Text,
            metadata: Default::default(),
        }
    }

    struct StubIndex {
        lexical: Vec<KnowledgeHit>,
        vector: Vec<KnowledgeHit>,
    }

    #[async_trait]
    impl TextIndex for StubIndex {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
            Ok(self.lexical.clone())
        }
        async fn knn(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
            Ok(self.vector.clone())
        }
        async fn index_doc(&self, _doc: &crate::adapters::IndexDocument) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn delete_doc(&self, _id: &str) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn delete_by_query(&self, _query: &str) -> Result<u64, TextIndexError> {
            Ok(0)
        }
        async fn ping(&self) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn index_message(&self, _message: &crate::model::StoredMessage) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn query_messages(&self, _session_id: &str) -> Result<Vec<crate::model::StoredMessage>, TextIndexError> {
            Ok(Vec::new())
        }
        async fn delete_messages(&self, _session_id: &str) -> Result<u64, TextIndexError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn fuses_and_dedups_overlapping_hits_by_id() {
        let index = Arc::new(StubIndex {
            lexical: vec![hit("a", 10.0), hit("b", 5.0)],
            vector: vec![hit("a", 0.9), hit("c", 0.2)],
        });
        let embedder = Arc::new(crate::embedding::mock::MockEmbedder::new(4));
        let retriever = TextRetriever::new(index, embedder, FusionWeights::default());

        let fused = retriever.retrieve("question", 10).await;
        let ids: Vec<&str> = fused.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"a"));
        assert_eq!(fused[0].id, "a");
    }

    #[tokio::test]
    async fn truncates_to_top_k() {
        let index = Arc::new(StubIndex {
            lexical: vec![hit("a", 1.0), hit("b", 2.0), hit("c", 3.0)],
            vector: vec![],
        });
        let embedder = Arc::new(crate::embedding::mock::MockEmbedder::new(4));
        let retriever = TextRetriever::new(index, embedder, FusionWeights::default());

        let fused = retriever.retrieve("question", 2).await;
        assert_eq!(fused.len(), 2);
    }

    struct FailingIndex;

    #[async_trait]
    impl TextIndex for FailingIndex {
        async fn search(&self, _query: &str, _top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
            Err(TextIndexError::Timeout)
        }
        async fn knn(&self, _vector: &[f32], _top_k: usize) -> Result<Vec<KnowledgeHit>, TextIndexError> {
            Err(TextIndexError::Timeout)
        }
        async fn index_doc(&self, _doc: &crate::adapters::IndexDocument) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn delete_doc(&self, _id: &str) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn delete_by_query(&self, _query: &str) -> Result<u64, TextIndexError> {
            Ok(0)
        }
        async fn ping(&self) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn index_message(&self, _message: &crate::model::StoredMessage) -> Result<(), TextIndexError> {
            Ok(())
        }
        async fn query_messages(&self, _session_id: &str) -> Result<Vec<crate::model::StoredMessage>, TextIndexError> {
            Ok(Vec::new())
        }
        async fn delete_messages(&self, _session_id: &str) -> Result<u64, TextIndexError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn degrades_to_empty_result_when_both_legs_fail() {
        let index = Arc::new(FailingIndex);
        let embedder = Arc::new(crate::embedding::mock::MockEmbedder::new(4));
        let retriever = TextRetriever::new(index, embedder, FusionWeights::default());
        assert!(retriever.retrieve("question", 5).await.is_empty());
    }
}
