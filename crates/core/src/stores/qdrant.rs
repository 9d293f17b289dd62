use crate::error::IndexError;
use crate::models::{DocumentSummary, IndexEntry, PdfChunk, ScoredChunk};
use crate::traits::VectorStore;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use uuid::Uuid;

const BACKEND: &str = "qdrant";
const SCROLL_PAGE: usize = 256;
// extra hits fetched so score ties at the k boundary resolve by insertion order
const TIE_MARGIN: usize = 16;

/// Qdrant collection with cosine distance, spoken to over its REST API.
///
/// Replacement is delete-then-upsert and is not atomic across the two requests.
/// Ties are ordered by insertion only among the `k + 16` best hits Qdrant returns,
/// so a longer run of identical scores may still surface a later entry.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>, vector_size: usize) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.endpoint, self.collection)
    }

    pub async fn ensure_collection(&self) -> Result<(), IndexError> {
        let response = self.client.get(self.collection_url()).send().await?;
        if response.status().is_success() {
            let parsed: Value = response.json().await?;
            let size = parsed
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64)
                .unwrap_or_default() as usize;
            if size != self.vector_size {
                return Err(IndexError::InvalidArgument(format!(
                    "collection {} has vector size {} but {} is configured",
                    self.collection, size, self.vector_size
                )));
            }
            return Ok(());
        }
        if response.status() != StatusCode::NOT_FOUND {
            return Err(backend_error(response.status()));
        }

        let response = self
            .client
            .put(self.collection_url())
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" }
            }))
            .send()
            .await?;
        ensure_success(response.status())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        if entries.is_empty() {
            return Ok(());
        }

        let batch_started = Utc::now().timestamp_micros();
        let points = entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                if entry.embedding.len() != self.vector_size {
                    return Err(IndexError::InvalidArgument(format!(
                        "embedding dimension {} != {}",
                        entry.embedding.len(),
                        self.vector_size
                    )));
                }

                Ok(json!({
                    "id": point_id(&entry.chunk.chunk_id),
                    "vector": entry.embedding,
                    "payload": {
                        "chunk_id": entry.chunk.chunk_id,
                        "document_name": entry.chunk.document_name,
                        "page": entry.chunk.page,
                        "ordinal": entry.chunk.ordinal,
                        "text": entry.chunk.text,
                        "sequence": [batch_started, position],
                    },
                }))
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        let response = self
            .client
            .put(format!("{}/points?wait=true", self.collection_url()))
            .json(&json!({ "points": points }))
            .send()
            .await?;
        ensure_success(response.status())
    }

    async fn count(&self, filter: Option<Value>) -> Result<usize, IndexError> {
        let mut body = json!({ "exact": true });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .client
            .post(format!("{}/points/count", self.collection_url()))
            .json(&body)
            .send()
            .await?;
        ensure_success(response.status())?;

        let parsed: Value = response.json().await?;
        Ok(parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or_default() as usize)
    }
}

fn document_filter(document_name: &str) -> Value {
    json!({
        "must": [{ "key": "document_name", "match": { "value": document_name } }]
    })
}

fn point_id(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes()).to_string()
}

fn backend_error(status: StatusCode) -> IndexError {
    IndexError::BackendResponse {
        backend: BACKEND.to_string(),
        details: status.to_string(),
    }
}

fn ensure_success(status: StatusCode) -> Result<(), IndexError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(backend_error(status))
    }
}

/// Rebuilds a scored chunk from a search hit; returns `None` when the payload is incomplete.
fn hit_to_scored_chunk(hit: &Value) -> Option<(ScoredChunk, (i64, u64))> {
    let payload = hit.pointer("/payload")?;
    let chunk = PdfChunk {
        chunk_id: payload.pointer("/chunk_id")?.as_str()?.to_string(),
        document_name: payload.pointer("/document_name")?.as_str()?.to_string(),
        page: u32::try_from(payload.pointer("/page")?.as_u64()?).ok()?,
        ordinal: payload.pointer("/ordinal")?.as_u64()?,
        text: payload.pointer("/text")?.as_str()?.to_string(),
    };
    let sequence = (
        payload.pointer("/sequence/0").and_then(Value::as_i64).unwrap_or_default(),
        payload.pointer("/sequence/1").and_then(Value::as_u64).unwrap_or_default(),
    );
    let score = hit.pointer("/score").and_then(Value::as_f64)? as f32;
    Some((ScoredChunk { chunk, score }, sequence))
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<(), IndexError> {
        self.upsert(entries).await
    }

    async fn replace_document(
        &self,
        document_name: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<usize, IndexError> {
        let removed = self.remove_document(document_name).await?;
        self.upsert(entries).await?;
        Ok(removed)
    }

    async fn remove_document(&self, document_name: &str) -> Result<usize, IndexError> {
        let removed = self.count(Some(document_filter(document_name))).await?;
        if removed == 0 {
            return Ok(0);
        }

        let response = self
            .client
            .post(format!("{}/points/delete?wait=true", self.collection_url()))
            .json(&json!({ "filter": document_filter(document_name) }))
            .send()
            .await?;
        ensure_success(response.status())?;
        Ok(removed)
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        let response = self
            .client
            .post(format!("{}/points/search", self.collection_url()))
            .json(&json!({
                "vector": query_vector,
                "limit": k.saturating_add(TIE_MARGIN),
                "with_payload": true,
            }))
            .send()
            .await?;
        ensure_success(response.status())?;

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut scored = hits
            .iter()
            .map(|hit| {
                hit_to_scored_chunk(hit).ok_or_else(|| IndexError::BackendResponse {
                    backend: BACKEND.to_string(),
                    details: format!("search hit without chunk payload: {hit}"),
                })
            })
            .collect::<Result<Vec<_>, IndexError>>()?;

        scored.sort_by(|left, right| {
            right
                .0
                .score
                .total_cmp(&left.0.score)
                .then_with(|| left.1.cmp(&right.1))
        });
        Ok(scored.into_iter().take(k).map(|(hit, _)| hit).collect())
    }

    async fn documents(&self) -> Result<Vec<DocumentSummary>, IndexError> {
        let mut summaries: Vec<DocumentSummary> = Vec::new();
        let mut offset = Value::Null;

        loop {
            let mut body = json!({
                "limit": SCROLL_PAGE,
                "with_payload": ["document_name"],
                "with_vector": false,
            });
            if !offset.is_null() {
                body["offset"] = offset.clone();
            }

            let response = self
                .client
                .post(format!("{}/points/scroll", self.collection_url()))
                .json(&body)
                .send()
                .await?;
            ensure_success(response.status())?;
            let parsed: Value = response.json().await?;

            let points = parsed
                .pointer("/result/points")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for point in &points {
                let Some(name) = point.pointer("/payload/document_name").and_then(Value::as_str) else {
                    continue;
                };
                match summaries.iter_mut().find(|summary| summary.document_name == name) {
                    Some(summary) => summary.chunk_count += 1,
                    None => summaries.push(DocumentSummary {
                        document_name: name.to_string(),
                        chunk_count: 1,
                    }),
                }
            }

            offset = parsed
                .pointer("/result/next_page_offset")
                .cloned()
                .unwrap_or(Value::Null);
            if offset.is_null() || points.is_empty() {
                break;
            }
        }

        Ok(summaries)
    }

    async fn len(&self) -> Result<usize, IndexError> {
        self.count(None).await
    }
}
