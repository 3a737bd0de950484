//! The document QA service: configuration-aware entry points for indexing
//! and answering.
//!
//! [`RagService`] owns the shared pieces (vector store, loader, config store)
//! and builds fresh pipelines for every call from an immutable configuration
//! snapshot. A reconfiguration mid-call never affects the call in flight.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{AzureProviderFactory, InMemoryVectorStore, ProviderSettings, RagService};
//!
//! let service = RagService::builder()
//!     .provider_factory(Arc::new(AzureProviderFactory))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//!
//! service.configure(&ProviderSettings::from_env())?;
//! service.index_file("uploads/report.pdf").await?;
//! let answer = service.ask("What does the report conclude?", None).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tracing::error;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::Answer;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::indexing::{BatchPolicy, BatchReport, IndexReport, IndexingPipeline};
use crate::llm::LanguageModel;
use crate::loader::{DocumentLoader, MultiFormatLoader};
use crate::qa::QaPipeline;
use crate::runtime::{ConfigStore, ProviderConfig, ProviderSettings};
use crate::vectorstore::VectorStore;

/// Builds the remote providers for one invocation from its configuration snapshot.
pub trait ProviderFactory: Send + Sync {
    /// The embedding provider used for both chunks and questions.
    fn embedding_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>>;

    /// The language model used for answer synthesis.
    fn language_model(&self, config: &ProviderConfig) -> Result<Arc<dyn LanguageModel>>;
}

/// Configuration-aware facade over the indexing and QA pipelines.
///
/// Construct one via [`RagService::builder()`].
pub struct RagService {
    config: RagConfig,
    factory: Arc<dyn ProviderFactory>,
    vector_store: Arc<dyn VectorStore>,
    loader: Arc<dyn DocumentLoader>,
    chunker: Arc<dyn Chunker>,
    config_store: Arc<ConfigStore>,
}

impl RagService {
    /// Create a new [`RagServiceBuilder`].
    pub fn builder() -> RagServiceBuilder {
        RagServiceBuilder::default()
    }

    /// Validate and store provider settings. Last write wins.
    pub fn configure(&self, settings: &ProviderSettings) -> Result<Arc<ProviderConfig>> {
        self.config_store.set(settings)
    }

    /// The current provider configuration, if any.
    pub fn config(&self) -> Option<Arc<ProviderConfig>> {
        self.config_store.current()
    }

    /// The chunking and retrieval parameters.
    pub fn rag_config(&self) -> &RagConfig {
        &self.config
    }

    /// Index one file into the configured collection.
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<IndexReport> {
        let path = path.as_ref();
        let pipeline = self.indexing_pipeline().map_err(|e| {
            error!(file = %path.display(), error = %e, "cannot index without provider configuration");
            RagError::indexing(path.display().to_string(), e)
        })?;
        pipeline.index_file(path).await
    }

    /// Index several files with one configuration snapshot.
    ///
    /// # Errors
    ///
    /// Only a missing configuration fails the whole call; per-file failures
    /// are reported in the [`BatchReport`].
    pub async fn index_files<P: AsRef<Path>>(
        &self,
        paths: &[P],
        policy: BatchPolicy,
    ) -> Result<BatchReport> {
        let pipeline = self.indexing_pipeline()?;
        Ok(pipeline.index_files(paths, policy).await)
    }

    /// Answer a question from the indexed documents. `k` defaults to `top_k`.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }
        let snapshot = self.config_store.snapshot()?;
        let pipeline = QaPipeline::builder()
            .collection(snapshot.collection())
            .embedding_provider(self.factory.embedding_provider(&snapshot)?)
            .vector_store(Arc::clone(&self.vector_store))
            .llm(self.factory.language_model(&snapshot)?)
            .top_k(self.config.top_k)
            .build()?;
        pipeline.answer(question, k).await
    }

    fn indexing_pipeline(&self) -> Result<IndexingPipeline> {
        let snapshot = self.config_store.snapshot()?;
        IndexingPipeline::builder()
            .collection(snapshot.collection())
            .loader(Arc::clone(&self.loader))
            .chunker(Arc::clone(&self.chunker))
            .embedding_provider(self.factory.embedding_provider(&snapshot)?)
            .vector_store(Arc::clone(&self.vector_store))
            .duplicate_policy(self.config.duplicate_policy)
            .embedding_batch_size(self.config.embedding_batch_size)
            .build()
    }
}

/// Builder for constructing a [`RagService`].
///
/// `provider_factory` and `vector_store` are required. The loader defaults to
/// [`MultiFormatLoader`], the config store to an empty [`ConfigStore`].
#[derive(Default)]
pub struct RagServiceBuilder {
    config: Option<RagConfig>,
    factory: Option<Arc<dyn ProviderFactory>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    loader: Option<Arc<dyn DocumentLoader>>,
    config_store: Option<Arc<ConfigStore>>,
}

impl RagServiceBuilder {
    /// Set the chunking and retrieval parameters.
    pub fn rag_config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the factory that builds providers from configuration snapshots.
    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Set the vector store shared by every call.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document loader.
    pub fn loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Share an existing configuration store.
    pub fn config_store(mut self, store: Arc<ConfigStore>) -> Self {
        self.config_store = Some(store);
        self
    }

    /// Build the [`RagService`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the chunking parameters are invalid.
    pub fn build(self) -> Result<RagService> {
        let config = self.config.unwrap_or_default();
        let chunker: Arc<dyn Chunker> = Arc::new(RecursiveChunker::from_config(&config)?);
        let factory = self
            .factory
            .ok_or_else(|| RagError::ConfigError("provider_factory is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;

        Ok(RagService {
            config,
            factory,
            vector_store,
            loader: self.loader.unwrap_or_else(|| Arc::new(MultiFormatLoader::new())),
            chunker,
            config_store: self.config_store.unwrap_or_default(),
        })
    }
}
