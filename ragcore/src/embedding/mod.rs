//! Embedding trait for dense-vector retrieval. Used by the text retriever to
//! embed both the question and the corpus it searches over.

mod openai;

pub use openai::OpenAiEmbedder;

use crate::error::LlmError;
use async_trait::async_trait;

/// Produces fixed-size float vectors from text. Implementations must be
/// `Send + Sync` for use from concurrently-running retrievers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds each text into a vector of dimension [`Embedder::dimension`].
    /// Returns one vector per input text, in the same order.
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Vector dimension returned by [`Embedder::embed`].
    fn dimension(&self) -> usize;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Deterministic embedder for tests: every vector is `[len(text) as f32, 0.0, ...]`
    /// padded to `dimension`, so cosine similarity reflects text length only.
    pub struct MockEmbedder {
        dimension: usize,
    }

    impl MockEmbedder {
        pub fn new(dimension: usize) -> Self {
            Self { dimension }
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; self.dimension];
                    v[0] = t.len() as f32;
                    v
                })
                .collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockEmbedder;
    use super::*;

    #[tokio::test]
    async fn mock_embedder_returns_one_vector_per_input_in_order() {
        let embedder = MockEmbedder::new(4);
        let vectors = embedder.embed(&["a", "bb", "ccc"]).await.unwrap();
        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0].len(), 4);
        assert_eq!(vectors[0][0], 1.0);
        assert_eq!(vectors[1][0], 2.0);
        assert_eq!(vectors[2][0], 3.0);
    }
}
