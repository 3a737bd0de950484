//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The same provider embeds chunks at index time and questions at
/// query time, so every vector it returns has [`dimensions`](Self::dimensions)
/// entries. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// Providers apply no retry policy. Failures surface as
/// [`RagError::EmbeddingError`] carrying the backend's own error text.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::EmbeddingProvider;
///
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in input order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name identifying the provider in logs and errors.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Embed `texts` in batches of at most `batch_size`, checking that the
/// provider returns exactly one vector per input.
pub(crate) async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut embeddings = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = provider.embed_batch(batch).await?;
        if vectors.len() != batch.len() {
            return Err(RagError::EmbeddingError {
                provider: provider.name().to_string(),
                message: format!("expected {} embeddings, received {}", batch.len(), vectors.len()),
            });
        }
        embeddings.extend(vectors);
    }
    Ok(embeddings)
}
