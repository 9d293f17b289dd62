use crate::error::IndexError;
use crate::models::{DocumentSummary, IndexEntry, ScoredChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;

/// Cosine similarity; a zero-norm vector scores 0 against anything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub dimensions: usize,
    pub saved_at: DateTime<Utc>,
    /// Insertion order, oldest first.
    pub entries: Vec<IndexEntry>,
}

/// Brute-force store; entries are kept in insertion order so ties rank oldest first.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: IndexSnapshot, expected_dimensions: usize) -> Result<Self, IndexError> {
        if snapshot.dimensions != expected_dimensions {
            return Err(IndexError::InvalidArgument(format!(
                "snapshot holds {}-dimension embeddings but the embedder produces {}",
                snapshot.dimensions, expected_dimensions
            )));
        }
        if let Some(entry) = snapshot
            .entries
            .iter()
            .find(|entry| entry.embedding.len() != expected_dimensions)
        {
            return Err(IndexError::InvalidArgument(format!(
                "snapshot entry {} has {} dimensions",
                entry.chunk.chunk_id,
                entry.embedding.len()
            )));
        }

        Ok(Self {
            entries: RwLock::new(snapshot.entries),
        })
    }

    pub async fn snapshot(&self, dimensions: usize) -> IndexSnapshot {
        IndexSnapshot {
            dimensions,
            saved_at: Utc::now(),
            entries: self.entries.read().await.clone(),
        }
    }

    /// Loads a snapshot file, or starts empty when the file does not exist yet.
    pub async fn load_or_default(path: &Path, expected_dimensions: usize) -> Result<Self, IndexError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(error) => return Err(error.into()),
        };
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(path = %path.display(), entries = snapshot.entries.len(), saved_at = %snapshot.saved_at, "loaded index snapshot");
        Self::from_snapshot(snapshot, expected_dimensions)
    }

    /// Writes the snapshot next to `path` and renames it into place.
    pub async fn save(&self, path: &Path, dimensions: usize) -> Result<(), IndexError> {
        let snapshot = self.snapshot(dimensions).await;
        let payload = serde_json::to_vec(&snapshot)?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, payload).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        self.entries.write().await.extend(entries);
        Ok(())
    }

    async fn replace_document(
        &self,
        document_name: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, IndexError> {
        let mut stored = self.entries.write().await;
        let before = stored.len();
        stored.retain(|entry| entry.chunk.document_name != document_name);
        let removed = before - stored.len();
        stored.extend(entries);
        Ok(removed)
    }

    async fn remove_document(&self, document_name: &str) -> Result<usize, IndexError> {
        let mut stored = self.entries.write().await;
        let before = stored.len();
        stored.retain(|entry| entry.chunk.document_name != document_name);
        Ok(before - stored.len())
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let stored = self.entries.read().await;

        let mut scored: Vec<(usize, f32)> = stored
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query_vector, &entry.embedding)))
            .collect();

        // stable sort: equal scores keep insertion order
        scored.sort_by(|left, right| right.1.total_cmp(&left.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                chunk: stored[position].chunk.clone(),
                score,
            })
            .collect())
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        let stored = self.entries.read().await;
        let mut summaries: Vec<DocumentSummary> = Vec::new();

        for entry in stored.iter() {
            match summaries
                .iter_mut()
                .find(|summary| summary.document_name == entry.chunk.document_name)
            {
                Some(summary) => summary.chunk_count += 1,
                None => summaries.push(DocumentSummary {
                    document_name: entry.chunk.document_name.clone(),
                    chunk_count: 1,
                }),
            }
        }

        Ok(summaries)
    }

    async fn len(&self) -> Result<usize, IndexError> {
        Ok(self.entries.read().await.len())
    }
}
