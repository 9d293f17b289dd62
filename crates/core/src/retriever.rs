use crate::error::IndexError;
use crate::index::VectorIndex;
use crate::models::{RetrievedChunk, ScoredChunk};
use std::sync::Arc;

pub struct Retriever {
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(index: Arc<VectorIndex>) -> Self {
        Self { index }
    }

    /// Embeds the query, takes the `top_k` nearest chunks and drops those under `min_score`.
    ///
    /// An empty result means nothing in the corpus is relevant enough; it is not an error.
    pub async fn retrieve(
        &self,
        query_text: &str,
        top_k: usize,
        min_score: f32,
    ) -> Result<Vec<RetrievedChunk>, IndexError> {
        if query_text.trim().is_empty() {
            return Err(IndexError::InvalidArgument("query is empty".to_string()));
        }

        let query_vector = self.index.embed_text(query_text).await?;
        let hits = self.index.search(&query_vector, top_k).await?;
        Ok(apply_score_floor(hits, min_score))
    }
}

/// Keeps hits scoring at least `min_score`, in descending-score order.
pub fn apply_score_floor(mut hits: Vec<ScoredChunk>, min_score: f32) -> Vec<RetrievedChunk> {
    hits.retain(|hit| hit.score >= min_score);
    hits.sort_by(|left, right| right.score.total_cmp(&left.score));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderOptions;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::{DocumentSummary, IndexEntry, PdfChunk};
    use crate::traits::VectorStore;
    use async_trait::async_trait;

    /// Store that answers every search with fixed scores.
    struct FixedScores(Vec<f32>);

    #[async_trait]
    impl VectorStore for FixedScores {
        fn backend(&self) -> &'static str {
            "fixed"
        }

        async fn insert(&self, _entries: Vec<IndexEntry>) -> Result<(), IndexError> {
            Ok(())
        }

        async fn replace_document(&self, _name: &str, _entries: Vec<IndexEntry>) -> Result<usize, IndexError> {
            Ok(0)
        }

        async fn remove_document(&self, _name: &str) -> Result<usize, IndexError> {
            Ok(0)
        }

        async fn search(&self, _query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
            Ok(self
                .0
                .iter()
                .take(k)
                .enumerate()
                .map(|(ordinal, score)| ScoredChunk {
                    chunk: PdfChunk {
                        chunk_id: format!("c{ordinal}"),
                        document_name: "fixed.pdf".to_string(),
                        page: 1,
                        ordinal: ordinal as u64,
                        text: format!("passage {ordinal}"),
                    },
                    score: *score,
                })
                .collect())
        }

        async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
            Ok(Vec::new())
        }

        async fn len(&self) -> Result<usize, IndexError> {
            Ok(self.0.len())
        }
    }

    fn retriever(scores: Vec<f32>) -> Retriever {
        Retriever::new(Arc::new(VectorIndex::new(
            Arc::new(FixedScores(scores)),
            Arc::new(CharacterNgramEmbedder::default()),
            ProviderOptions::default(),
        )))
    }

    #[tokio::test]
    async fn results_below_the_floor_are_dropped() -> Result<(), IndexError> {
        let retrieved = retriever(vec![0.9, 0.4, 0.1])
            .retrieve("engine fire", 3, 0.5)
            .await?;

        assert_eq!(retrieved.len(), 1);
        assert_eq!(retrieved[0].chunk.chunk_id, "c0");
        Ok(())
    }

    #[tokio::test]
    async fn nothing_relevant_is_an_empty_result() -> Result<(), IndexError> {
        let retrieved = retriever(vec![0.2, 0.1]).retrieve("engine fire", 2, 0.5).await?;
        assert!(retrieved.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn blank_queries_are_rejected() {
        let result = retriever(vec![0.9]).retrieve("   ", 1, 0.0).await;
        assert!(matches!(result, Err(IndexError::InvalidArgument(_))));
    }
}
