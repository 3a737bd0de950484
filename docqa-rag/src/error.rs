//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid configuration (provider settings or chunking parameters).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A source file could not be turned into documents.
    #[error("Load error ({path}): {message}")]
    LoadError {
        /// The file that failed to load.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure, including the provider's own error text.
        message: String,
    },

    /// An error occurred in the vector index backend.
    #[error("Index error ({backend}): {message}")]
    IndexError {
        /// The vector index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The language model invocation failed.
    #[error("Model error ({provider}): {message}")]
    ModelError {
        /// The model provider that produced the error.
        provider: String,
        /// A description of the failure, including the provider's own error text.
        message: String,
    },

    /// The caller supplied unusable input, such as a blank question.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indexing of a single file failed at some stage.
    #[error("Indexing failed for '{file}': {source}")]
    Indexing {
        /// The file whose indexing failed.
        file: String,
        /// The stage error.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Return the innermost error, looking through [`RagError::Indexing`] wrappers.
    pub fn root(&self) -> &RagError {
        match self {
            RagError::Indexing { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the error (or its root) is a configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self.root(), RagError::ConfigError(_))
    }

    /// True when the root cause is a remote provider or index backend failure.
    pub fn is_provider(&self) -> bool {
        matches!(
            self.root(),
            RagError::EmbeddingError { .. } | RagError::IndexError { .. } | RagError::ModelError { .. }
        )
    }

    pub(crate) fn indexing(file: impl Into<String>, source: RagError) -> Self {
        RagError::Indexing { file: file.into(), source: Box::new(source) }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
