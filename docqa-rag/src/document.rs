//! Data types for documents, chunks, search results, and answers.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata attached to documents and chunks.
///
/// Values are JSON strings or numbers. Chunks receive their own copy of the
/// parent document's map, so editing one chunk never affects another.
pub type Metadata = Map<String, Value>;

/// Metadata key holding the path of the file a document was loaded from.
pub const SOURCE_FILE_KEY: &str = "source_file";
/// Metadata key holding the file modification time (seconds since the Unix epoch).
pub const TIMESTAMP_KEY: &str = "timestamp";
/// Metadata key holding the 0-based page number of a PDF page.
pub const PAGE_KEY: &str = "page";
/// Metadata key holding the page count of the PDF a page came from.
pub const TOTAL_PAGES_KEY: &str = "total_pages";
/// Metadata key holding the position of a chunk within its document.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

/// A unit of loaded text (one page of a PDF, or one text file) plus metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document, fresh on every load.
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Metadata; always contains `source_file` and `timestamp` once loaded.
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with a fresh random ID.
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), text: text.into(), metadata }
    }

    /// The `source_file` metadata value, if present.
    pub fn source_file(&self) -> Option<&str> {
        self.metadata.get(SOURCE_FILE_KEY).and_then(Value::as_str)
    }
}

/// A segment of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk (`{document_id}_{chunk_index}`).
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The vector embedding for this chunk's text. Empty until the pipeline embeds it.
    pub embedding: Vec<f32>,
    /// Metadata copied from the parent document plus `chunk_index`.
    pub metadata: Metadata,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

impl Chunk {
    /// The `source_file` metadata value, if present.
    pub fn source_file(&self) -> Option<&str> {
        self.metadata.get(SOURCE_FILE_KEY).and_then(Value::as_str)
    }

    /// The file name portion of `source_file`, used when citing sources.
    pub fn source_name(&self) -> Option<&str> {
        self.source_file().map(|source| {
            Path::new(source).file_name().and_then(|name| name.to_str()).unwrap_or(source)
        })
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}

/// The outcome of a question: generated text plus the metadata of every chunk
/// used as context, in retrieval order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The generated answer text.
    pub answer: String,
    /// Metadata of the chunks used as context, one entry per chunk.
    pub sources: Vec<Metadata>,
}

impl Answer {
    /// The answer returned when retrieval finds nothing.
    pub fn no_results() -> Self {
        Self { answer: crate::qa::NO_RESULTS_ANSWER.to_string(), sources: Vec::new() }
    }

    /// True for the answer produced by an empty retrieval.
    pub fn is_no_results(&self) -> bool {
        self.sources.is_empty() && self.answer == crate::qa::NO_RESULTS_ANSWER
    }
}
