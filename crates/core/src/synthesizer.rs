use crate::config::{AnswerOptions, ProviderOptions};
use crate::error::GenerationError;
use crate::models::{Answer, AnswerOutcome, Citation, RetrievedChunk};
use crate::retry::{with_retry, with_timeout};
use crate::traits::GenerationProvider;
use std::fmt::Write;
use std::sync::Arc;

const INSTRUCTIONS: &str = "You are an assistant for aviation documentation. Answer the question using only the numbered sources below. Cite every fact with its source number in square brackets, e.g. [1]. If the sources do not contain the answer, say that the documents do not cover it.";

pub struct AnswerSynthesizer {
    generator: Arc<dyn GenerationProvider>,
    options: AnswerOptions,
    provider: ProviderOptions,
}

impl AnswerSynthesizer {
    pub fn new(
        generator: Arc<dyn GenerationProvider>,
        options: AnswerOptions,
        provider: ProviderOptions,
    ) -> Self {
        Self {
            generator,
            options,
            provider,
        }
    }

    /// Composes a cited answer; with no retrieved chunks the generator is never called.
    pub async fn answer(
        &self,
        query_text: &str,
        retrieved_chunks: &[RetrievedChunk],
    ) -> Result<Answer, GenerationError> {
        if retrieved_chunks.is_empty() {
            return Ok(Answer {
                text: self.options.no_answer_text.clone(),
                sources: Vec::new(),
                outcome: AnswerOutcome::NoContext,
            });
        }

        let prompt = build_grounding_prompt(query_text, retrieved_chunks);
        let completion = with_retry(&self.provider.retry, || {
            with_timeout(
                self.provider.timeout,
                self.generator.generate(&prompt),
                GenerationError::Timeout,
            )
        })
        .await?;

        let text = completion.trim();
        if text.is_empty() {
            return Err(GenerationError::Permanent(
                "generator returned an empty completion".to_string(),
            ));
        }

        Ok(Answer {
            text: text.to_string(),
            sources: citations(retrieved_chunks, self.options.max_excerpt_chars),
            outcome: AnswerOutcome::Answered,
        })
    }
}

/// Numbered sources in retrieval order, each tagged with document and page, then the question.
pub fn build_grounding_prompt(query_text: &str, retrieved_chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::with_capacity(
        INSTRUCTIONS.len()
            + query_text.len()
            + retrieved_chunks
                .iter()
                .map(|hit| hit.chunk.text.len() + 64)
                .sum::<usize>(),
    );

    prompt.push_str(INSTRUCTIONS);
    prompt.push_str("\n\nSources:\n");
    for (position, hit) in retrieved_chunks.iter().enumerate() {
        let _ = write!(
            prompt,
            "\n[{}] {}, page {}\n{}\n",
            position + 1,
            hit.chunk.document_name,
            hit.chunk.page,
            hit.chunk.text
        );
    }
    let _ = write!(prompt, "\nQuestion: {}\nAnswer:", query_text.trim());
    prompt
}

pub fn citations(retrieved_chunks: &[RetrievedChunk], max_excerpt_chars: usize) -> Vec<Citation> {
    retrieved_chunks
        .iter()
        .map(|hit| Citation {
            document: hit.chunk.document_name.clone(),
            page: hit.chunk.page,
            excerpt: excerpt(&hit.chunk.text, max_excerpt_chars),
            score: hit.score,
        })
        .collect()
}

const ELLIPSIS: &str = "...";

/// Shortens `text` to at most `max_chars` characters, ellipsis included.
fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let budget = max_chars.saturating_sub(ELLIPSIS.len());
    if budget == 0 {
        return text.chars().take(max_chars).collect();
    }

    let mut cut: String = text.chars().take(budget).collect();
    let ends_on_word = text.chars().nth(budget).map_or(true, char::is_whitespace);
    if !ends_on_word {
        if let Some(space) = cut.rfind(' ') {
            cut.truncate(space);
        }
    }
    cut.truncate(cut.trim_end().len());
    cut.push_str(ELLIPSIS);
    cut
}
