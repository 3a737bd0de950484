//! Document loaders for the supported file formats.
//!
//! Every loader attaches `source_file` (the path as given) and `timestamp`
//! (file modification time, seconds since the Unix epoch) to each document it
//! produces. Loading is blocking file I/O; the indexing pipeline runs it on
//! the blocking thread pool.

use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use serde_json::Value;

use crate::document::{Document, Metadata, SOURCE_FILE_KEY, TIMESTAMP_KEY};
use crate::error::{RagError, Result};

/// Trait for turning a file into an ordered sequence of documents.
pub trait DocumentLoader: Send + Sync {
    /// Check if this loader can handle the given file.
    fn supports(&self, path: &Path) -> bool;

    /// Load the file into documents (one per logical unit, e.g. page).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::LoadError`] if the file is unreadable, in an
    /// unsupported format, corrupt, or holds no extractable text.
    fn load(&self, path: &Path) -> Result<Vec<Document>>;
}

fn load_error(path: &Path, message: impl Into<String>) -> RagError {
    RagError::LoadError { path: path.display().to_string(), message: message.into() }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Metadata shared by every document loaded from `path`.
pub fn file_metadata(path: &Path) -> Result<Metadata> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| load_error(path, format!("failed to read file metadata: {e}")))?;
    let timestamp = modified.duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0);

    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_FILE_KEY.to_string(), Value::from(path.display().to_string()));
    metadata.insert(TIMESTAMP_KEY.to_string(), Value::from(timestamp));
    Ok(metadata)
}

fn ensure_text(path: &Path, documents: Vec<Document>) -> Result<Vec<Document>> {
    if documents.iter().all(|doc| doc.text.trim().is_empty()) {
        return Err(load_error(path, "file contains no extractable text"));
    }
    Ok(documents)
}

/// Plain text and markdown loader. Produces one document per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextLoader;

impl DocumentLoader for TextLoader {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["txt", "md", "markdown"])
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        let text = fs::read_to_string(path)
            .map_err(|e| load_error(path, format!("failed to read text file: {e}")))?;
        let metadata = file_metadata(path)?;
        ensure_text(path, vec![Document::new(text, metadata)])
    }
}

/// PDF loader. Produces one document per page with `page` (0-based) and
/// `total_pages` metadata.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

#[cfg(feature = "pdf")]
impl DocumentLoader for PdfLoader {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, &["pdf"])
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        use crate::document::{PAGE_KEY, TOTAL_PAGES_KEY};

        let bytes =
            fs::read(path).map_err(|e| load_error(path, format!("failed to read PDF: {e}")))?;

        // The extractor panics on some malformed files; report those as corrupt.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))
            .map_err(|_| load_error(path, "PDF is corrupt or uses unsupported features"))?
            .map_err(|e| load_error(path, format!("failed to extract text from PDF: {e}")))?;

        let base = file_metadata(path)?;
        let total_pages = pages.len();
        let documents = pages
            .into_iter()
            .enumerate()
            .map(|(page, text)| {
                let mut metadata = base.clone();
                metadata.insert(PAGE_KEY.to_string(), Value::from(page));
                metadata.insert(TOTAL_PAGES_KEY.to_string(), Value::from(total_pages));
                Document::new(text, metadata)
            })
            .collect();
        ensure_text(path, documents)
    }
}

/// Multi-format loader that delegates to the first loader supporting a file.
pub struct MultiFormatLoader {
    loaders: Vec<Box<dyn DocumentLoader>>,
}

impl MultiFormatLoader {
    /// Create a loader with every built-in format enabled.
    pub fn new() -> Self {
        let mut loaders: Vec<Box<dyn DocumentLoader>> = vec![Box::new(TextLoader)];
        #[cfg(feature = "pdf")]
        loaders.push(Box::new(PdfLoader));
        Self { loaders }
    }

    /// Add a loader; it is consulted after the existing ones.
    pub fn with_loader(mut self, loader: Box<dyn DocumentLoader>) -> Self {
        self.loaders.push(loader);
        self
    }
}

impl Default for MultiFormatLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for MultiFormatLoader {
    fn supports(&self, path: &Path) -> bool {
        self.loaders.iter().any(|loader| loader.supports(path))
    }

    fn load(&self, path: &Path) -> Result<Vec<Document>> {
        self.loaders
            .iter()
            .find(|loader| loader.supports(path))
            .ok_or_else(|| load_error(path, "unsupported file format"))?
            .load(path)
    }
}
