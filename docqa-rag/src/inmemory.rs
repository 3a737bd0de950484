//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by
//! per-collection `Vec`s protected by a `tokio::sync::RwLock`. It is suitable
//! for development, testing, and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

#[derive(Debug, Default)]
struct Collection {
    /// Fixed by `ensure_collection`, or by the first upsert when created with 0.
    dimensions: usize,
    records: Vec<Chunk>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Records keep insertion order, so ties in score resolve to the earlier record.
/// All operations are async-safe via `tokio::sync::RwLock`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("docs", 1536).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }
}

fn index_error(message: String) -> RagError {
    RagError::IndexError { backend: BACKEND.to_string(), message }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() { similarity } else { 0.0 }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, records: Vec::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections
            .get_mut(collection)
            .ok_or_else(|| index_error(format!("collection '{collection}' does not exist")))?;

        let mut dimensions = store.dimensions;
        for chunk in chunks {
            if chunk.embedding.is_empty() {
                return Err(index_error(format!("chunk '{}' has no embedding", chunk.id)));
            }
            if dimensions == 0 {
                dimensions = chunk.embedding.len();
            }
            if chunk.embedding.len() != dimensions {
                return Err(index_error(format!(
                    "chunk '{}' has dimension {}, collection '{collection}' expects {dimensions}",
                    chunk.id,
                    chunk.embedding.len()
                )));
            }
        }

        store.dimensions = dimensions;
        store.records.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn delete_by_source(&self, collection: &str, source_file: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(store) = collections.get_mut(collection) {
            store.records.retain(|chunk| chunk.source_file() != Some(source_file));
        }
        Ok(())
    }

    async fn delete_by_source_except(
        &self,
        collection: &str,
        source_file: &str,
        keep: &[String],
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(store) = collections.get_mut(collection) {
            store.records.retain(|chunk| {
                chunk.source_file() != Some(source_file) || keep.contains(&chunk.id)
            });
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let Some(store) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        if store.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if embedding.len() != store.dimensions {
            return Err(index_error(format!(
                "query has dimension {}, collection '{collection}' stores {}",
                embedding.len(),
                store.dimensions
            )));
        }

        let mut scored: Vec<SearchResult> = store
            .records
            .iter()
            .map(|chunk| {
                let score = cosine_similarity(&chunk.embedding, embedding);
                SearchResult { chunk: chunk.clone(), score }
            })
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |store| store.records.len()))
    }
}
