//! Test doubles shared by the pipeline and service tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::{
    Chunk, EmbeddingProvider, InMemoryVectorStore, LanguageModel, ProviderConfig, ProviderFactory,
    ProviderSettings, RagError, Result, SearchResult, VectorStore,
};

/// Embeds text as keyword counts over a fixed vocabulary, plus a small bias
/// component so no vector is ever zero.
pub struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    pub calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl KeywordEmbedder {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> =
            lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).collect();
        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|term| words.iter().filter(|w| *w == term).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        // Deliberately wrong: pipelines must size collections from real vectors.
        self.vocabulary.len() + 100
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Fails every request with a provider error.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "failing".into(),
            message: "401 Unauthorized: invalid api key".into(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }
}

/// Records every prompt and returns a canned answer.
pub struct RecordingLlm {
    pub prompts: Mutex<Vec<String>>,
    reply: String,
}

impl RecordingLlm {
    pub fn new(reply: &str) -> Self {
        Self { prompts: Mutex::new(Vec::new()), reply: reply.to_string() }
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for RecordingLlm {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Delegates to an [`InMemoryVectorStore`] and records the dimensions every
/// `ensure_collection` call asked for and the size of every `upsert`.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryVectorStore,
    pub ensured: Mutex<Vec<(String, usize)>>,
    pub upserts: Mutex<Vec<usize>>,
    pub searches: AtomicUsize,
}

#[async_trait]
impl VectorStore for RecordingStore {
    async fn ensure_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.ensured.lock().unwrap().push((name.to_string(), dimensions));
        self.inner.ensure_collection(name, dimensions).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.upserts.lock().unwrap().push(chunks.len());
        self.inner.upsert(collection, chunks).await
    }

    async fn delete_by_source(&self, collection: &str, source_file: &str) -> Result<()> {
        self.inner.delete_by_source(collection, source_file).await
    }

    async fn delete_by_source_except(
        &self,
        collection: &str,
        source_file: &str,
        keep: &[String],
    ) -> Result<()> {
        self.inner.delete_by_source_except(collection, source_file, keep).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(collection, embedding, top_k).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }
}

/// Hands out shared test doubles and counts how often it was asked.
pub struct CountingFactory {
    pub embedder: Arc<KeywordEmbedder>,
    pub llm: Arc<RecordingLlm>,
    pub calls: AtomicUsize,
    pub collections: Mutex<Vec<String>>,
}

impl CountingFactory {
    pub fn new(vocabulary: &[&'static str], reply: &str) -> Self {
        Self {
            embedder: Arc::new(KeywordEmbedder::new(vocabulary)),
            llm: Arc::new(RecordingLlm::new(reply)),
            calls: AtomicUsize::new(0),
            collections: Mutex::new(Vec::new()),
        }
    }
}

impl ProviderFactory for CountingFactory {
    fn embedding_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.collections.lock().unwrap().push(config.collection().to_string());
        Ok(self.embedder.clone() as Arc<dyn EmbeddingProvider>)
    }

    fn language_model(&self, _config: &ProviderConfig) -> Result<Arc<dyn LanguageModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.llm.clone() as Arc<dyn LanguageModel>)
    }
}

/// Complete provider settings targeting `collection`.
pub fn settings(collection: &str) -> ProviderSettings {
    ProviderSettings {
        endpoint: Some("https://example.openai.azure.com/".into()),
        embedding_deployment: Some("text-embedding-3-small".into()),
        embedding_api_version: Some("2024-02-01".into()),
        chat_deployment: Some("gpt-4o-mini".into()),
        chat_api_version: Some("2024-08-01-preview".into()),
        api_key: Some("sk-test-0123456789".into()),
        collection: Some(collection.into()),
    }
}

pub const VOCABULARY: &[&str] = &["rust", "ownership", "borrow", "python", "garbage", "collector"];
