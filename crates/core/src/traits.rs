use crate::error::{GenerationError, IndexError};
use crate::models::{DocumentSummary, IndexEntry, ScoredChunk};
use async_trait::async_trait;

/// Storage and nearest-neighbour search over chunk embeddings.
///
/// Implementations are exact or approximate; callers only rely on the k-NN
/// contract: at most `k` hits, descending cosine similarity.
#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Commits every entry or none of them.
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError>;

    /// Drops the document's current entries and inserts `entries` in their place.
    async fn replace_document(
        &self,
        document_name: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, IndexError>;

    /// Returns how many entries were deleted; unknown documents delete nothing.
    async fn remove_document(&self, document_name: &str) -> Result<usize, IndexError>;

    /// `k` is validated by the caller to be positive.
    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError>;

    async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError>;

    async fn len(&self) -> Result<usize, IndexError>;
}

/// Text generation capability used to compose grounded answers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}
