//! Retrieval-QA pipeline: embed question → search → prompt → complete.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::DEFAULT_TOP_K;
use crate::document::{Answer, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::prompt::PromptBuilder;
use crate::vectorstore::VectorStore;

/// Answer text returned when the collection holds nothing relevant.
pub const NO_RESULTS_ANSWER: &str = "no relevant information found";

/// Answers questions against one collection.
///
/// Construct one via [`QaPipeline::builder()`].
pub struct QaPipeline {
    collection: String,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
    prompt: PromptBuilder,
    top_k: usize,
}

impl QaPipeline {
    /// Create a new [`QaPipelineBuilder`].
    pub fn builder() -> QaPipelineBuilder {
        QaPipelineBuilder::default()
    }

    /// The collection questions are answered from.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed the question and return the `k` most similar chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank question, otherwise
    /// whatever the embedding provider or vector store reports.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<SearchResult>> {
        let question = validate_question(question)?;
        let embedding = self.embedding_provider.embed(question).await?;
        let results = self.vector_store.search(&self.collection, &embedding, k).await?;
        debug!(collection = %self.collection, k, found = results.len(), "retrieved chunks");
        Ok(results)
    }

    /// Answer a question from the indexed documents.
    ///
    /// `k` defaults to the configured `top_k`. When nothing is retrieved the
    /// language model is not called and [`Answer::no_results`] is returned.
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let k = k.unwrap_or(self.top_k);
        let result = self.run(question, k).await;
        if let Err(e) = &result {
            if !matches!(e, RagError::InvalidInput(_)) {
                error!(collection = %self.collection, error = %e, "question answering failed");
            }
        }
        result
    }

    async fn run(&self, question: &str, k: usize) -> Result<Answer> {
        let results = self.retrieve(question, k).await?;
        if results.is_empty() {
            info!(collection = %self.collection, "no relevant chunks; skipping model call");
            return Ok(Answer::no_results());
        }

        let prompt = self.prompt.build(question, &results);
        let answer = self.llm.complete(&prompt).await?;

        let sources = results.into_iter().map(|r| r.chunk.metadata).collect::<Vec<_>>();
        info!(
            collection = %self.collection,
            model = self.llm.name(),
            sources = sources.len(),
            "answered question"
        );
        Ok(Answer { answer, sources })
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidInput("question must not be empty".to_string()));
    }
    Ok(trimmed)
}

/// Builder for constructing a [`QaPipeline`].
#[derive(Default)]
pub struct QaPipelineBuilder {
    collection: Option<String>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    llm: Option<Arc<dyn LanguageModel>>,
    prompt: Option<PromptBuilder>,
    top_k: Option<usize>,
}

impl QaPipelineBuilder {
    /// Set the collection to search.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    /// Set the embedding provider used for questions.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the language model used for answer synthesis.
    pub fn llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Override the prompt builder.
    pub fn prompt(mut self, prompt: PromptBuilder) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Set the default number of chunks to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Build the [`QaPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// `top_k` is zero.
    pub fn build(self) -> Result<QaPipeline> {
        let collection = self
            .collection
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RagError::ConfigError("collection is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let llm = self.llm.ok_or_else(|| RagError::ConfigError("llm is required".to_string()))?;
        let top_k = self.top_k.unwrap_or(DEFAULT_TOP_K);
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than 0".to_string()));
        }

        Ok(QaPipeline {
            collection,
            embedding_provider,
            vector_store,
            llm,
            prompt: self.prompt.unwrap_or_default(),
            top_k,
        })
    }
}
