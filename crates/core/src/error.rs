use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("no extractable text in {0}")]
    NoExtractableText(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("indexing failed: {0}")]
    Index(#[from] IndexError),
}

impl IngestError {
    /// Extraction failures are reported as a zero-chunk result, not a crash.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(self, Self::PdfParse(_) | Self::NoExtractableText(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EmbeddingError {
    #[error("embedding provider unavailable: {0}")]
    Transient(String),

    #[error("embedding request rejected: {0}")]
    Permanent(String),

    #[error("embedding call timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding dimension {actual} != expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("generation provider unavailable: {0}")]
    Transient(String),

    #[error("generation request rejected: {0}")]
    Permanent(String),

    #[error("generation call timed out after {0:?}")]
    Timeout(Duration),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot io error: {0}")]
    Snapshot(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AskError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] IndexError),

    #[error("answer generation failed: {0}")]
    Generation(#[from] GenerationError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);
