//! Indexing pipeline: load → chunk → embed → store.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{IndexingPipeline, InMemoryVectorStore, MultiFormatLoader, RecursiveChunker};
//!
//! let pipeline = IndexingPipeline::builder()
//!     .collection("docs")
//!     .loader(Arc::new(MultiFormatLoader::new()))
//!     .chunker(Arc::new(RecursiveChunker::new(1000, 200)?))
//!     .embedding_provider(embedder)
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! let report = pipeline.index_file("uploads/report.pdf").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::config::{DEFAULT_EMBEDDING_BATCH_SIZE, DuplicatePolicy};
use crate::embedding::{EmbeddingProvider, embed_in_batches};
use crate::error::{RagError, Result};
use crate::loader::DocumentLoader;
use crate::vectorstore::VectorStore;

/// What happened when one file was indexed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexReport {
    /// The file that was indexed, as given.
    pub source_file: String,
    /// Number of documents (pages) the loader produced.
    pub document_count: usize,
    /// Number of chunks written to the index. Zero means nothing was indexed.
    pub chunk_count: usize,
    /// When indexing finished.
    pub indexed_at: DateTime<Utc>,
}

impl IndexReport {
    /// True when the file produced no chunks and nothing was written.
    pub fn is_empty(&self) -> bool {
        self.chunk_count == 0
    }
}

/// How a batch reacts to a file that fails to index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Record the failure and keep indexing the remaining files.
    #[default]
    ContinueOnError,
    /// Stop at the first failure; the failure is the last outcome recorded.
    AbortOnError,
}

/// The outcome for one file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    /// The file, as given.
    pub path: PathBuf,
    /// The report, or the error that aborted this file.
    pub result: Result<IndexReport>,
}

/// Per-file outcomes of [`IndexingPipeline::index_files`], in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per processed file.
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    /// Total number of chunks indexed across successful files.
    pub fn indexed_chunks(&self) -> usize {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).map(|r| r.chunk_count).sum()
    }

    /// The outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// True when every processed file succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Orchestrates Loader → Chunker → Embedding Provider → Vector Index for files.
///
/// Construct one via [`IndexingPipeline::builder()`].
pub struct IndexingPipeline {
    collection: String,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    duplicate_policy: DuplicatePolicy,
    batch_size: usize,
}

impl IndexingPipeline {
    /// Create a new [`IndexingPipelineBuilder`].
    pub fn builder() -> IndexingPipelineBuilder {
        IndexingPipelineBuilder::default()
    }

    /// The target collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Index a single file.
    ///
    /// Returns an [`IndexReport`]. A report with `chunk_count == 0` means the
    /// file yielded no chunks and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Indexing`] naming the file and wrapping the stage
    /// error (load, embedding, or index).
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<IndexReport> {
        let path = path.as_ref();
        let file = path.display().to_string();
        self.run(path, &file).await.map_err(|e| {
            error!(file = %file, collection = %self.collection, error = %e, "indexing failed");
            RagError::indexing(file.clone(), e)
        })
    }

    /// Index several files sequentially under the given [`BatchPolicy`].
    pub async fn index_files<P: AsRef<Path>>(&self, paths: &[P], policy: BatchPolicy) -> BatchReport {
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            let result = self.index_file(path).await;
            let failed = result.is_err();
            report.outcomes.push(FileOutcome { path: path.to_path_buf(), result });
            if failed && policy == BatchPolicy::AbortOnError {
                warn!(file = %path.display(), "aborting batch after failure");
                break;
            }
        }
        info!(
            files = report.outcomes.len(),
            chunks = report.indexed_chunks(),
            failures = report.failures().count(),
            "batch indexing finished"
        );
        report
    }

    async fn run(&self, path: &Path, file: &str) -> Result<IndexReport> {
        // 1. Load on the blocking pool
        let loader = Arc::clone(&self.loader);
        let owned = path.to_path_buf();
        let documents = tokio::task::spawn_blocking(move || loader.load(&owned))
            .await
            .map_err(|e| RagError::LoadError {
                path: file.to_string(),
                message: format!("loader task failed: {e}"),
            })??;

        // 2. Chunk
        let mut chunks = self.chunker.split_documents(&documents);
        if chunks.is_empty() {
            warn!(file, document_count = documents.len(), "file produced no chunks; nothing indexed");
            return Ok(IndexReport {
                source_file: file.to_string(),
                document_count: documents.len(),
                chunk_count: 0,
                indexed_at: Utc::now(),
            });
        }

        // 3. Embed all chunks
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            embed_in_batches(self.embedding_provider.as_ref(), &texts, self.batch_size).await?;
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        // 4. Ensure the collection exists, sized by what the provider actually returned
        let dimensions = chunks[0].embedding.len();
        self.vector_store.ensure_collection(&self.collection, dimensions).await?;

        // 5. Store, then drop the file's previous records under Replace.
        // A failed upsert leaves the old records untouched.
        self.vector_store.upsert(&self.collection, &chunks).await?;
        if self.duplicate_policy == DuplicatePolicy::Replace {
            let keep: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
            self.vector_store.delete_by_source_except(&self.collection, file, &keep).await?;
        }

        let chunk_count = chunks.len();
        info!(file, collection = %self.collection, document_count = documents.len(), chunk_count, "indexed file");

        Ok(IndexReport {
            source_file: file.to_string(),
            document_count: documents.len(),
            chunk_count,
            indexed_at: Utc::now(),
        })
    }
}

/// Builder for constructing an [`IndexingPipeline`].
///
/// `collection`, `loader`, `chunker`, `embedding_provider` and `vector_store`
/// are required.
#[derive(Default)]
pub struct IndexingPipelineBuilder {
    collection: Option<String>,
    loader: Option<Arc<dyn DocumentLoader>>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    duplicate_policy: DuplicatePolicy,
    batch_size: Option<usize>,
}

impl IndexingPipelineBuilder {
    /// Set the target collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the re-indexing policy (default [`DuplicatePolicy::Replace`]).
    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Build the [`IndexingPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<IndexingPipeline> {
        let collection = self
            .collection
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RagError::ConfigError("collection is required".to_string()))?;
        let loader =
            self.loader.ok_or_else(|| RagError::ConfigError("loader is required".to_string()))?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::ConfigError("chunker is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        Ok(IndexingPipeline {
            collection,
            loader,
            chunker,
            embedding_provider,
            vector_store,
            duplicate_policy: self.duplicate_policy,
            batch_size: self.batch_size.unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE),
        })
    }
}
