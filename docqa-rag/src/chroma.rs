//! Chroma vector store backend.
//!
//! Provides [`ChromaVectorStore`] which implements [`VectorStore`] against
//! the Chroma v2 REST API. A store is addressed by `(url, tenant, database)`
//! and an optional `x-chroma-token` credential; collections are created with
//! cosine distance and looked up by name on every call.
//!
//! This module is only available when the `chroma` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::chroma::ChromaVectorStore;
//!
//! let store = ChromaVectorStore::new("https://api.trychroma.com", "my-tenant", "dev")?
//!     .with_token("ck-...");
//! store.ensure_collection("docs", 1536).await?;
//! store.upsert("docs", &chunks).await?;
//! let results = store.search("docs", &query_embedding, 4).await?;
//! ```

use async_trait::async_trait;
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::document::{Chunk, Metadata, SOURCE_FILE_KEY, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "chroma";

/// Default Chroma Cloud endpoint.
pub const DEFAULT_CHROMA_URL: &str = "https://api.trychroma.com";

/// A [`VectorStore`] backed by a [Chroma](https://www.trychroma.com/) server.
pub struct ChromaVectorStore {
    client: reqwest::Client,
    base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<&'a str>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<Metadata>,
}

#[derive(Deserialize)]
struct GetResponse {
    ids: Vec<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl ChromaVectorStore {
    /// Create a store for the given server URL, tenant and database.
    pub fn new(
        url: impl AsRef<str>,
        tenant: impl AsRef<str>,
        database: impl AsRef<str>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Self::backend_err(format!("failed to build HTTP client: {e}")))?;
        let base = format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            url.as_ref().trim_end_matches('/'),
            tenant.as_ref(),
            database.as_ref()
        );
        Ok(Self { client, base, token: None })
    }

    /// Set the `x-chroma-token` credential sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn backend_err(message: String) -> RagError {
        RagError::IndexError { backend: BACKEND.to_string(), message }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("x-chroma-token", token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Self::backend_err(format!("request failed: {e}")))?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Self::backend_err(format!("server returned {status}: {body}")))
    }

    /// Resolve a collection name to its ID. `None` if it does not exist.
    async fn collection_id(&self, name: &str) -> Result<Option<String>> {
        let request = self.authorize(self.client.get(format!("{}/{name}", self.base)));
        let response =
            request.send().await.map_err(|e| Self::backend_err(format!("request failed: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // Older servers answer a missing collection with 400/500 "does not exist".
            if body.contains("does not exist") || body.contains("NotFound") {
                return Ok(None);
            }
            return Err(Self::backend_err(format!("server returned {status}: {body}")));
        }

        let info: CollectionInfo = response
            .json()
            .await
            .map_err(|e| Self::backend_err(format!("failed to parse collection: {e}")))?;
        Ok(Some(info.id))
    }

    async fn require_collection(&self, name: &str) -> Result<String> {
        self.collection_id(name)
            .await?
            .ok_or_else(|| Self::backend_err(format!("collection '{name}' does not exist")))
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let body = json!({
            "name": name,
            "get_or_create": true,
            "metadata": { "hnsw:space": "cosine" },
        });
        self.send(self.client.post(&self.base).json(&body)).await?;
        debug!(collection = name, dimensions, "ensured chroma collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.collection_id(name).await?.is_none() {
            return Ok(());
        }
        self.send(self.client.delete(format!("{}/{name}", self.base))).await?;
        debug!(collection = name, "deleted chroma collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        if let Some(chunk) = chunks.iter().find(|c| c.embedding.is_empty()) {
            return Err(Self::backend_err(format!("chunk '{}' has no embedding", chunk.id)));
        }

        let id = self.require_collection(collection).await?;
        let body = AddRequest {
            ids: chunks.iter().map(|c| c.id.as_str()).collect(),
            embeddings: chunks.iter().map(|c| c.embedding.as_slice()).collect(),
            documents: chunks.iter().map(|c| c.text.as_str()).collect(),
            metadatas: chunks.iter().map(|c| c.metadata.clone()).collect(),
        };
        self.send(self.client.post(format!("{}/{id}/add", self.base)).json(&body)).await?;

        debug!(collection, count = chunks.len(), "added chunks to chroma");
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source_file: &str) -> Result<()> {
        let Some(id) = self.collection_id(collection).await? else {
            return Ok(());
        };
        let mut filter = Metadata::new();
        filter.insert(SOURCE_FILE_KEY.to_string(), Value::from(source_file));
        let body = json!({ "where": filter });
        self.send(self.client.post(format!("{}/{id}/delete", self.base)).json(&body)).await?;
        debug!(collection, source_file, "deleted chroma records for source");
        Ok(())
    }

    async fn delete_by_source_except(
        &self,
        collection: &str,
        source_file: &str,
        keep: &[String],
    ) -> Result<()> {
        let Some(id) = self.collection_id(collection).await? else {
            return Ok(());
        };
        let mut filter = Metadata::new();
        filter.insert(SOURCE_FILE_KEY.to_string(), Value::from(source_file));
        let body = json!({ "where": filter, "include": [] });
        let existing: GetResponse = self
            .send(self.client.post(format!("{}/{id}/get", self.base)).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| Self::backend_err(format!("failed to parse get response: {e}")))?;

        let stale: Vec<String> =
            existing.ids.into_iter().filter(|record| !keep.contains(record)).collect();
        if stale.is_empty() {
            return Ok(());
        }
        let removed = stale.len();
        let body = json!({ "ids": stale });
        self.send(self.client.post(format!("{}/{id}/delete", self.base)).json(&body)).await?;
        debug!(collection, source_file, removed, "deleted stale chroma records");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let Some(id) = self.collection_id(collection).await? else {
            return Ok(Vec::new());
        };

        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });
        let response: QueryResponse = self
            .send(self.client.post(format!("{}/{id}/query", self.base)).json(&body))
            .await?
            .json()
            .await
            .map_err(|e| Self::backend_err(format!("failed to parse query response: {e}")))?;

        let ids = response.ids.into_iter().next().unwrap_or_default();
        let documents = response.documents.and_then(|d| d.into_iter().next()).unwrap_or_default();
        let metadatas = response.metadatas.and_then(|m| m.into_iter().next()).unwrap_or_default();
        let distances = response.distances.and_then(|d| d.into_iter().next()).unwrap_or_default();

        let mut results: Vec<SearchResult> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let text = documents.get(i).cloned().flatten().unwrap_or_default();
                let metadata = metadatas.get(i).cloned().flatten().unwrap_or_default();
                let distance = distances.get(i).copied().flatten().unwrap_or(1.0);
                let document_id =
                    id.rsplit_once('_').map(|(doc, _)| doc.to_string()).unwrap_or_default();
                SearchResult {
                    chunk: Chunk { id, text, embedding: Vec::new(), metadata, document_id },
                    score: 1.0 - distance,
                }
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let Some(id) = self.collection_id(collection).await? else {
            return Ok(0);
        };
        let value: Value = self
            .send(self.client.get(format!("{}/{id}/count", self.base)))
            .await?
            .json()
            .await
            .map_err(|e| Self::backend_err(format!("failed to parse count: {e}")))?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Self::backend_err(format!("unexpected count response: {value}")))
    }
}
