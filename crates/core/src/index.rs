use crate::config::ProviderOptions;
use crate::embeddings::{ensure_dimensions, EmbeddingProvider};
use crate::error::{EmbeddingError, IndexError};
use crate::models::{DocumentSummary, IndexEntry, PdfChunk, ScoredChunk};
use crate::retry::{with_retry, with_timeout};
use crate::traits::VectorStore;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Chunk index: embeds chunks, stores them, and answers k-NN queries.
///
/// Mutations are serialized through one writer lock. Searches never take it and
/// observe the store either before or after a mutation.
pub struct VectorIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: ProviderOptions,
    writer: Mutex<()>,
}

impl VectorIndex {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: ProviderOptions,
    ) -> Self {
        Self {
            store,
            embedder,
            options,
            writer: Mutex::new(()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }

    /// Embeds one text with the configured deadline and retry policy.
    pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = with_retry(&self.options.retry, || {
            with_timeout(
                self.options.timeout,
                self.embedder.embed(text),
                EmbeddingError::Timeout,
            )
        })
        .await?;
        ensure_dimensions(&vector, self.dimensions())?;
        Ok(vector)
    }

    async fn embed_chunks(&self, chunks: Vec<PdfChunk>) -> Result<Vec<IndexEntry>, EmbeddingError> {
        stream::iter(chunks)
            .map(|chunk| async move {
                let embedding = self.embed_text(&chunk.text).await?;
                Ok::<_, EmbeddingError>(IndexEntry { chunk, embedding })
            })
            .buffered(self.options.embed_concurrency.max(1))
            .try_collect()
            .await
    }

    /// Adds every chunk or, when any embedding fails, none of them.
    pub async fn add(&self, chunks: Vec<PdfChunk>) -> Result<usize, IndexError> {
        let entries = self.embed_chunks(chunks).await?;
        let added = entries.len();
        if added == 0 {
            return Ok(0);
        }

        let _guard = self.writer.lock().await;
        self.store.insert(entries).await?;
        Ok(added)
    }

    /// Embeds the new chunks first, then swaps them in for the document's old ones.
    ///
    /// Returns `(added, removed)`. A failed embedding leaves the old version in place.
    pub async fn replace_document(
        &self,
        document_name: &str,
        chunks: Vec<PdfChunk>,
    ) -> Result<(usize, usize), IndexError> {
        if let Some(foreign) = chunks.iter().find(|chunk| chunk.document_name != document_name) {
            return Err(IndexError::InvalidArgument(format!(
                "chunk {} belongs to {}, not {}",
                foreign.chunk_id, foreign.document_name, document_name
            )));
        }

        let entries = self.embed_chunks(chunks).await?;
        let added = entries.len();

        let _guard = self.writer.lock().await;
        let removed = self.store.replace_document(document_name, entries).await?;
        Ok((added, removed))
    }

    pub async fn remove_document(&self, document_name: &str) -> Result<usize, IndexError> {
        let _guard = self.writer.lock().await;
        self.store.remove_document(document_name).await
    }

    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if k == 0 {
            return Err(IndexError::InvalidArgument(
                "k must be greater than zero".to_string(),
            ));
        }
        if query_vector.len() != self.dimensions() {
            return Err(IndexError::InvalidArgument(format!(
                "query vector has {} dimensions, index expects {}",
                query_vector.len(),
                self.dimensions()
            )));
        }

        self.store.search(query_vector, k).await
    }

    pub async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        self.store.documents().await
    }

    pub async fn len(&self) -> Result<usize, IndexError> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool, IndexError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::retry::RetryPolicy;
    use crate::stores::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn chunk(document: &str, ordinal: u64, text: &str) -> PdfChunk {
        PdfChunk {
            chunk_id: format!("{document}#{ordinal}"),
            document_name: document.to_string(),
            page: 1,
            ordinal,
            text: text.to_string(),
        }
    }

    fn index_with(embedder: Arc<dyn EmbeddingProvider>) -> VectorIndex {
        VectorIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            embedder,
            ProviderOptions {
                timeout: Duration::from_secs(5),
                retry: RetryPolicy::none(),
                embed_concurrency: 3,
            },
        )
    }

    struct WrongDimensions;

    #[async_trait]
    impl EmbeddingProvider for WrongDimensions {
        fn dimensions(&self) -> usize {
            4
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vec![1.0; 3])
        }
    }

    struct FlakyOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyOnce {
        fn dimensions(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(EmbeddingError::Transient("429".to_string()))
            } else {
                Ok(vec![1.0, 0.0])
            }
        }
    }

    #[tokio::test]
    async fn zero_k_is_rejected() {
        let index = index_with(Arc::new(CharacterNgramEmbedder::default()));
        let query = vec![0.0; index.dimensions()];
        assert!(matches!(
            index.search(&query, 0).await,
            Err(IndexError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn empty_index_returns_no_hits() -> Result<(), IndexError> {
        let index = index_with(Arc::new(CharacterNgramEmbedder::default()));
        assert!(index.is_empty().await?);
        let query = index.embed_text("flaps").await?;
        assert!(index.search(&query, 5).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn exact_match_scores_one_and_ranks_first() -> Result<(), IndexError> {
        let index = index_with(Arc::new(CharacterNgramEmbedder::default()));
        index
            .add(vec![
                chunk("a.pdf", 0, "Landing gear extension procedure"),
                chunk("a.pdf", 1, "Fuel crossfeed valve operation"),
            ])
            .await?;

        let query = index.embed_text("Fuel crossfeed valve operation").await?;
        let hits = index.search(&query, 2).await?;

        assert_eq!(hits[0].chunk.ordinal, 1);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_dimension_vectors_commit_nothing() -> Result<(), IndexError> {
        let index = index_with(Arc::new(WrongDimensions));
        let result = index.add(vec![chunk("a.pdf", 0, "text")]).await;

        assert!(matches!(
            result,
            Err(IndexError::Embedding(EmbeddingError::DimensionMismatch {
                expected: 4,
                actual: 3
            }))
        ));
        assert_eq!(index.len().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn transient_embedding_failures_are_retried() -> Result<(), IndexError> {
        let index = VectorIndex::new(
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(FlakyOnce {
                calls: AtomicUsize::new(0),
            }),
            ProviderOptions {
                retry: RetryPolicy {
                    max_attempts: 2,
                    initial_delay: Duration::from_millis(1),
                    max_delay: Duration::from_millis(1),
                    multiplier: 1.0,
                },
                ..ProviderOptions::default()
            },
        );

        assert_eq!(index.add(vec![chunk("a.pdf", 0, "text")]).await?, 1);
        assert!(!index.is_empty().await?);
        Ok(())
    }

    #[tokio::test]
    async fn removal_is_idempotent() -> Result<(), IndexError> {
        let index = index_with(Arc::new(CharacterNgramEmbedder::default()));
        index
            .add(vec![
                chunk("x.pdf", 0, "Oxygen mask deployment"),
                chunk("x.pdf", 1, "Cabin altitude warning"),
                chunk("y.pdf", 0, "Cabin altitude warning horn"),
            ])
            .await?;

        assert_eq!(index.remove_document("x.pdf").await?, 2);
        assert_eq!(index.remove_document("x.pdf").await?, 0);
        assert_eq!(index.remove_document("never-added.pdf").await?, 0);

        let query = index.embed_text("Cabin altitude warning").await?;
        let hits = index.search(&query, 10).await?;
        assert_eq!(hits.len(), 1);
        assert!(hits.iter().all(|hit| hit.chunk.document_name == "y.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn replace_rejects_chunks_of_other_documents() {
        let index = index_with(Arc::new(CharacterNgramEmbedder::default()));
        let result = index
            .replace_document("a.pdf", vec![chunk("b.pdf", 0, "text")])
            .await;
        assert!(matches!(result, Err(IndexError::InvalidArgument(_))));
    }
}
