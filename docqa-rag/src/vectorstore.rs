//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s. The backend is
/// responsible for its own concurrent-write safety; callers add no locking.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.ensure_collection("docs", 1536).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Add chunks to a collection. Chunks must have embeddings set.
    ///
    /// Records are not deduplicated by content; inserting the same text twice
    /// stores it twice.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Delete every record whose `source_file` metadata equals `source_file`.
    async fn delete_by_source(&self, collection: &str, source_file: &str) -> Result<()>;

    /// Delete records of `source_file` whose ids are not listed in `keep`.
    ///
    /// Used after a re-indexed file's new records are stored, so the old
    /// records only go away once their replacements are in place.
    async fn delete_by_source_except(
        &self,
        collection: &str,
        source_file: &str,
        keep: &[String],
    ) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score. An empty or
    /// absent collection yields an empty result, not an error.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Number of records in a collection (zero if absent).
    async fn count(&self, collection: &str) -> Result<usize>;
}
