use crate::chunking::ChunkingConfig;
use crate::error::ConfigError;
use crate::models::IngestionOptions;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const NO_ANSWER_TEXT: &str =
    "No relevant information was found in the indexed documents for this question.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalOptions {
    pub top_k: usize,
    /// Results scoring below this cosine similarity are dropped.
    pub min_score: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: 0.25,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderOptions {
    /// Deadline for a single embedding or generation call.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    /// Embedding calls kept in flight while adding a batch of chunks.
    pub embed_concurrency: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            embed_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOptions {
    pub max_excerpt_chars: usize,
    pub no_answer_text: String,
}

impl Default for AnswerOptions {
    fn default() -> Self {
        Self {
            max_excerpt_chars: 300,
            no_answer_text: NO_ANSWER_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    pub ingestion: IngestionOptions,
    pub retrieval: RetrievalOptions,
    pub providers: ProviderOptions,
    pub answer: AnswerOptions,
}

impl RagConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        ChunkingConfig::try_from(&self.ingestion).map_err(|error| ConfigError(error.to_string()))?;

        if self.retrieval.top_k == 0 {
            return Err(ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(ConfigError(format!(
                "min_score {} is outside the cosine range [-1, 1]",
                self.retrieval.min_score
            )));
        }
        if self.providers.timeout.is_zero() {
            return Err(ConfigError("provider timeout must be non-zero".to_string()));
        }
        if self.providers.embed_concurrency == 0 {
            return Err(ConfigError(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.answer.max_excerpt_chars == 0 {
            return Err(ConfigError(
                "max_excerpt_chars must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
