use crate::chunking::PdfChunker;
use crate::config::RagConfig;
use crate::embeddings::EmbeddingProvider;
use crate::error::{AskError, ConfigError, IndexError, IngestError};
use crate::extractor::PdfExtractor;
use crate::index::VectorIndex;
use crate::models::{
    Answer, DocumentIngestReport, DocumentSummary, IngestOutcome, IngestSummary, RetrievedChunk,
};
use crate::retriever::Retriever;
use crate::synthesizer::AnswerSynthesizer;
use crate::traits::{GenerationProvider, VectorStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Embedding,
    Retrieving,
    NoContext,
    Retrieved,
    Generating,
    Answered,
    GenerationFailed,
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Embedding => "embedding",
            Self::Retrieving => "retrieving",
            Self::NoContext => "no_context",
            Self::Retrieved => "retrieved",
            Self::Generating => "generating",
            Self::Answered => "answered",
            Self::GenerationFailed => "generation_failed",
        };
        f.write_str(name)
    }
}

/// Session handle holding the corpus index and the providers.
///
/// Built once at startup and passed to whatever serves ingest, remove and ask
/// requests; dropping it tears the session down.
pub struct RagEngine {
    config: RagConfig,
    chunker: PdfChunker,
    index: Arc<VectorIndex>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl RagEngine {
    pub fn builder() -> RagEngineBuilder {
        RagEngineBuilder::default()
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Chunks and indexes one PDF. A document with the same name is replaced.
    pub async fn ingest(&self, document_bytes: &[u8], document_name: &str) -> Result<IngestSummary, IngestError> {
        let chunks = self.chunker.process(document_bytes, document_name)?;
        let chunk_count = chunks.len();
        let (chunks_added, chunks_replaced) = self.index.replace_document(document_name, chunks).await?;

        info!(
            document = document_name,
            bytes = document_bytes.len(),
            chunk_count,
            chunks_replaced,
            "ingested document"
        );
        Ok(IngestSummary {
            chunks_added,
            chunks_replaced,
        })
    }

    /// Ingests each document independently; one failure never stops the rest.
    pub async fn ingest_batch<I, N, B>(&self, documents: I) -> Vec<DocumentIngestReport>
    where
        I: IntoIterator<Item = (N, B)>,
        N: Into<String>,
        B: AsRef<[u8]>,
    {
        let mut reports = Vec::new();
        for (name, bytes) in documents {
            let document_name = name.into();
            let outcome = match self.ingest(bytes.as_ref(), &document_name).await {
                Ok(summary) => IngestOutcome::Ingested(summary),
                Err(error) => {
                    warn!(document = %document_name, %error, extraction = error.is_extraction_failure(), "document not ingested");
                    IngestOutcome::Failed {
                        reason: error.to_string(),
                    }
                }
            };
            reports.push(DocumentIngestReport {
                document_name,
                outcome,
            });
        }
        reports
    }

    /// Purges every chunk of the document. Unknown names remove nothing.
    pub async fn remove(&self, document_name: &str) -> Result<usize, IndexError> {
        let chunks_removed = self.index.remove_document(document_name).await?;
        info!(document = document_name, chunks_removed, "removed document");
        Ok(chunks_removed)
    }

    pub async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        self.index.documents().await
    }

    /// Retrieval only, using the configured `top_k` and relevance floor.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>, IndexError> {
        let retrieval = &self.config.retrieval;
        self.retriever
            .retrieve(question, retrieval.top_k, retrieval.min_score)
            .await
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        debug!(state = %QueryState::Embedding, "query started");
        let retrieved = self.retrieve(question).await?;

        let state = if retrieved.is_empty() {
            QueryState::NoContext
        } else {
            QueryState::Retrieved
        };
        debug!(%state, result_count = retrieved.len(), "retrieval finished");

        if state == QueryState::Retrieved {
            debug!(state = %QueryState::Generating, "generating answer");
        }
        let answer = match self.synthesizer.answer(question, &retrieved).await {
            Ok(answer) => answer,
            Err(error) => {
                warn!(state = %QueryState::GenerationFailed, %error, "answer generation failed");
                return Err(error.into());
            }
        };

        let state = if answer.is_answered() {
            QueryState::Answered
        } else {
            QueryState::NoContext
        };
        info!(%state, result_count = answer.sources.len(), "query completed");
        Ok(answer)
    }
}

#[derive(Default)]
pub struct RagEngineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn PdfExtractor>>,
    store: Option<Arc<dyn VectorStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn GenerationProvider>>,
}

impl RagEngineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the default lopdf extractor.
    pub fn extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<RagEngine, ConfigError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = self
            .store
            .ok_or_else(|| ConfigError("a vector store is required".to_string()))?;
        let embedder = self
            .embedder
            .ok_or_else(|| ConfigError("an embedding provider is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| ConfigError("a generation provider is required".to_string()))?;

        let chunker = match self.extractor {
            Some(extractor) => PdfChunker::with_extractor(extractor, &config.ingestion),
            None => PdfChunker::new(&config.ingestion),
        }
        .map_err(|error| ConfigError(error.to_string()))?;

        let index = Arc::new(VectorIndex::new(store, embedder, config.providers.clone()));
        let retriever = Retriever::new(index.clone());
        let synthesizer =
            AnswerSynthesizer::new(generator, config.answer.clone(), config.providers.clone());

        Ok(RagEngine {
            config,
            chunker,
            index,
            retriever,
            synthesizer,
        })
    }
}
