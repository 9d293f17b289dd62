use serde::{Deserialize, Serialize};

/// A bounded passage of extracted text with document/page provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdfChunk {
    pub chunk_id: String,
    pub document_name: String,
    /// 1-based page the passage was cut from.
    pub page: u32,
    /// Position of the chunk within its document, starting at 0.
    pub ordinal: u64,
    pub text: String,
}

/// A chunk paired with its embedding, as stored by a vector index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: PdfChunk,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: PdfChunk,
    pub score: f32,
}

pub type RetrievedChunk = ScoredChunk;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub document: String,
    pub page: u32,
    pub excerpt: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerOutcome {
    Answered,
    NoContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<Citation>,
    pub outcome: AnswerOutcome,
}

impl Answer {
    pub fn is_answered(&self) -> bool {
        self.outcome == AnswerOutcome::Answered
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentSummary {
    pub document_name: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestSummary {
    pub chunks_added: usize,
    /// Chunks of an earlier version of the same document that were dropped.
    pub chunks_replaced: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested(IngestSummary),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIngestReport {
    pub document_name: String,
    pub outcome: IngestOutcome,
}

impl DocumentIngestReport {
    pub fn chunks_added(&self) -> usize {
        match self.outcome {
            IngestOutcome::Ingested(summary) => summary.chunks_added,
            IngestOutcome::Failed { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestionOptions {
    pub chunk_max_chars: usize,
    /// Fraction of `chunk_max_chars` repeated at the start of the next chunk.
    pub chunk_overlap_ratio: f64,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_max_chars: 1_000,
            chunk_overlap_ratio: 0.15,
        }
    }
}

impl IngestionOptions {
    pub fn overlap_chars(&self) -> usize {
        (self.chunk_max_chars as f64 * self.chunk_overlap_ratio).round() as usize
    }
}
