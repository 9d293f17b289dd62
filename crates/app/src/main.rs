use aviation_rag_core::{
    ingest_path, CharacterNgramEmbedder, EmbeddingProvider, EndpointConfig, InMemoryVectorStore,
    IngestOutcome, OpenAiChatProvider, OpenAiEmbeddingProvider, QdrantStore, RagConfig, RagEngine,
    VectorStore, DEFAULT_EMBEDDING_DIMENSIONS,
};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "aviation-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSON snapshot holding the in-memory index between runs
    #[arg(long, env = "RAG_INDEX_PATH", default_value = "aviation-index.json")]
    index_path: PathBuf,

    /// Qdrant base URL; when set, chunks live in Qdrant instead of the snapshot
    #[arg(long, env = "RAG_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Qdrant collection
    #[arg(long, env = "RAG_QDRANT_COLLECTION", default_value = "aviation_chunks")]
    qdrant_collection: String,

    /// Embedding backend
    #[arg(long, value_enum, env = "RAG_EMBEDDER", default_value_t = EmbedderKind::Ngram)]
    embedder: EmbedderKind,

    /// OpenAI-compatible base URL for embeddings
    #[arg(long, env = "RAG_EMBEDDING_URL", default_value = "http://localhost:11434/v1")]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "RAG_EMBEDDING_MODEL", default_value = "nomic-embed-text")]
    embedding_model: String,

    /// Dimension of the embedding model's vectors
    #[arg(long, env = "RAG_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// OpenAI-compatible base URL for answer generation
    #[arg(long, env = "RAG_LLM_URL", default_value = "http://localhost:11434/v1")]
    llm_url: String,

    /// Generation model name
    #[arg(long, env = "RAG_LLM_MODEL", default_value = "llama3.1")]
    llm_model: String,

    /// Bearer token sent to both HTTP providers
    #[arg(long, env = "RAG_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1_000)]
    chunk_max_chars: usize,

    /// Fraction of a chunk repeated at the start of the next one
    #[arg(long, default_value_t = 0.15)]
    chunk_overlap_ratio: f64,

    /// Number of chunks retrieved per question
    #[arg(long, default_value_t = 4)]
    top_k: usize,

    /// Minimum cosine similarity for a chunk to count as relevant
    #[arg(long, default_value_t = 0.25)]
    min_score: f32,

    /// Seconds before an embedding or generation call is abandoned
    #[arg(long, default_value_t = 30)]
    provider_timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed character trigrams
    Ngram,
    /// OpenAI-compatible /embeddings endpoint
    Http,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a PDF file, or every PDF below a folder.
    Ingest {
        #[arg(long)]
        path: PathBuf,
    },
    /// Remove a document and all of its chunks.
    Remove {
        #[arg(long)]
        name: String,
    },
    /// Ask a question and print a cited answer.
    Ask {
        #[arg(long)]
        question: String,
    },
    /// Show the chunks a question would retrieve, without generating.
    Search {
        #[arg(long)]
        query: String,
    },
    /// List indexed documents.
    List,
}

impl Cli {
    fn config(&self) -> RagConfig {
        let mut config = RagConfig::default();
        config.ingestion.chunk_max_chars = self.chunk_max_chars;
        config.ingestion.chunk_overlap_ratio = self.chunk_overlap_ratio;
        config.retrieval.top_k = self.top_k;
        config.retrieval.min_score = self.min_score;
        config.providers.timeout = Duration::from_secs(self.provider_timeout_secs);
        config
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let embedder: Arc<dyn EmbeddingProvider> = match self.embedder {
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder {
                dimensions: self.embedding_dimensions,
            }),
            EmbedderKind::Http => Arc::new(OpenAiEmbeddingProvider::new(
                EndpointConfig::new(&self.embedding_url, &self.embedding_model, self.api_key.clone())?,
                self.embedding_dimensions,
            )),
        };
        Ok(embedder)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "aviation-rag boot"
    );

    let embedder = cli.embedder()?;
    let dimensions = embedder.dimensions();

    // the snapshot is only kept when the index lives in memory
    let mut snapshot: Option<Arc<InMemoryVectorStore>> = None;
    let store: Arc<dyn VectorStore> = match &cli.qdrant_url {
        Some(url) => {
            let qdrant = QdrantStore::new(url, &cli.qdrant_collection, dimensions);
            qdrant.ensure_collection().await?;
            Arc::new(qdrant)
        }
        None => {
            let memory = Arc::new(InMemoryVectorStore::load_or_default(&cli.index_path, dimensions).await?);
            snapshot = Some(memory.clone());
            memory
        }
    };

    let generator = Arc::new(OpenAiChatProvider::new(EndpointConfig::new(
        &cli.llm_url,
        &cli.llm_model,
        cli.api_key.clone(),
    )?));

    let engine = RagEngine::builder()
        .config(cli.config())
        .store(store)
        .embedder(embedder)
        .generator(generator)
        .build()?;

    let mutated = match &cli.command {
        Command::Ingest { path } => {
            let reports = ingest_path(&engine, path).await?;
            let mut total = 0;
            for report in &reports {
                match &report.outcome {
                    IngestOutcome::Ingested(summary) => {
                        total += summary.chunks_added;
                        println!(
                            "{}: {} chunks added ({} replaced)",
                            report.document_name, summary.chunks_added, summary.chunks_replaced
                        );
                    }
                    IngestOutcome::Failed { reason } => {
                        warn!(document = %report.document_name, %reason, "skipped pdf");
                        println!("{}: 0 chunks added ({reason})", report.document_name);
                    }
                }
            }
            println!("{total} chunks ingested at {}", Utc::now().to_rfc3339());
            true
        }
        Command::Remove { name } => {
            let removed = engine.remove(name).await?;
            println!("{name}: {removed} chunks removed");
            removed > 0
        }
        Command::Ask { question } => {
            let answer = engine.ask(question).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!("\nsources:");
            }
            for (position, source) in answer.sources.iter().enumerate() {
                println!(
                    "[{}] {} page {} score={:.4}\n    {}",
                    position + 1,
                    source.document,
                    source.page,
                    source.score,
                    source.excerpt
                );
            }
            false
        }
        Command::Search { query } => {
            let hits = engine.retrieve(query).await?;
            if hits.is_empty() {
                println!("no chunk scored above {}", engine.config().retrieval.min_score);
            }
            for hit in hits {
                println!(
                    "score={:.4} document={} page={} chunk={}",
                    hit.score, hit.chunk.document_name, hit.chunk.page, hit.chunk.chunk_id
                );
                println!("  chunk_text:\n{}", hit.chunk.text);
            }
            false
        }
        Command::List => {
            for document in engine.documents().await? {
                println!("{}\t{} chunks", document.document_name, document.chunk_count);
            }
            false
        }
    };

    if let Some(memory) = snapshot.filter(|_| mutated) {
        memory.save(&cli.index_path, dimensions).await?;
        info!(path = %cli.index_path.display(), "index snapshot saved");
    }

    Ok(())
}
