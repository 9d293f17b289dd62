pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod providers;
pub mod retriever;
pub mod retry;
pub mod stores;
pub mod synthesizer;
pub mod traits;

pub use chunking::{build_chunks, normalize_text, split_passages, ChunkingConfig, PdfChunker};
pub use config::{AnswerOptions, ProviderOptions, RagConfig, RetrievalOptions, NO_ANSWER_TEXT};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingProvider, DEFAULT_EMBEDDING_DIMENSIONS};
pub use engine::{QueryState, RagEngine, RagEngineBuilder};
pub use error::{AskError, ConfigError, EmbeddingError, GenerationError, IndexError, IngestError};
pub use extractor::{FormFeedTextExtractor, LopdfExtractor, PageText, PdfExtractor};
pub use index::VectorIndex;
pub use ingest::{discover_pdf_files, document_name, ingest_path};
pub use models::{
    Answer, AnswerOutcome, Citation, DocumentIngestReport, DocumentSummary, IndexEntry,
    IngestOutcome, IngestSummary, IngestionOptions, PdfChunk, RetrievedChunk, ScoredChunk,
};
pub use providers::{EndpointConfig, OpenAiChatProvider, OpenAiEmbeddingProvider};
pub use retriever::Retriever;
pub use retry::{with_retry, with_timeout, RetryPolicy, Retryable};
pub use stores::{cosine_similarity, InMemoryVectorStore, IndexSnapshot, QdrantStore};
pub use synthesizer::{build_grounding_prompt, AnswerSynthesizer};
pub use traits::{GenerationProvider, VectorStore};
