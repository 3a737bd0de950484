//! # docqa-rag
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! ## Overview
//!
//! Files are loaded into [`Document`]s, split into overlapping [`Chunk`]s,
//! embedded, and stored in a vector index. Questions are embedded the same
//! way, the nearest chunks are retrieved, and a language model answers from
//! those chunks alone, citing the files they came from.
//!
//! - [`IndexingPipeline`] - load → chunk → embed → store, per file
//! - [`QaPipeline`] - embed question → search → prompt → complete
//! - [`RagService`] - builds both pipelines per call from a [`ConfigStore`] snapshot
//!
//! ## Features
//!
//! | Feature | Provides |
//! |---------|----------|
//! | `azure` (default) | [`AzureOpenAIEmbeddingProvider`], [`AzureChatModel`], [`AzureProviderFactory`] |
//! | `chroma` (default) | [`ChromaVectorStore`] |
//! | `pdf` (default) | [`PdfLoader`] |
//!
//! [`InMemoryVectorStore`], [`TextLoader`] and [`RecursiveChunker`] are always
//! available.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{AzureProviderFactory, InMemoryVectorStore, ProviderSettings, RagService};
//!
//! let service = RagService::builder()
//!     .provider_factory(Arc::new(AzureProviderFactory))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .build()?;
//! service.configure(&ProviderSettings::from_env())?;
//!
//! service.index_file("uploads/handbook.pdf").await?;
//! let answer = service.ask("How many vacation days do I get?", None).await?;
//! println!("{}", answer.answer);
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod indexing;
pub mod inmemory;
pub mod llm;
pub mod loader;
pub mod prompt;
pub mod qa;
pub mod runtime;
pub mod service;
pub mod vectorstore;

#[cfg(feature = "azure")]
pub mod azure;
#[cfg(feature = "chroma")]
pub mod chroma;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, RecursiveChunker};
pub use config::{DuplicatePolicy, RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, Document, Metadata, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use indexing::{BatchPolicy, BatchReport, FileOutcome, IndexReport, IndexingPipeline};
pub use inmemory::InMemoryVectorStore;
pub use llm::LanguageModel;
#[cfg(feature = "pdf")]
pub use loader::PdfLoader;
pub use loader::{DocumentLoader, MultiFormatLoader, TextLoader};
pub use prompt::PromptBuilder;
pub use qa::{NO_RESULTS_ANSWER, QaPipeline};
pub use runtime::{ConfigStore, ProviderConfig, ProviderSettings};
pub use service::{ProviderFactory, RagService, RagServiceBuilder};
pub use vectorstore::VectorStore;

#[cfg(feature = "azure")]
pub use azure::{AzureChatModel, AzureOpenAIEmbeddingProvider, AzureProviderFactory};
#[cfg(feature = "chroma")]
pub use chroma::ChromaVectorStore;
