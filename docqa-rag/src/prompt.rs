//! Prompt construction for grounded answers.

use crate::document::SearchResult;

/// Delimiter placed between context blocks.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const DEFAULT_INSTRUCTIONS: &str = "Answer the question using only the context below. \
If the context does not contain the answer, say explicitly that you don't know \
based on the provided documents. Do not use outside knowledge.";

const CITATION_INSTRUCTIONS: &str =
    "Answer concisely and cite the sources you used by filename, e.g. [source: report.pdf].";

/// Builds the prompt sent to the language model from a question and the
/// retrieved chunks.
///
/// Each chunk becomes a block headed by `[source: <file name>]`; blocks are
/// joined in retrieval order by [`CONTEXT_DELIMITER`].
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self { instructions: DEFAULT_INSTRUCTIONS.to_string() }
    }
}

impl PromptBuilder {
    /// Create a builder with the default grounding instructions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the grounding instructions placed before the context.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Concatenate the retrieved chunks into a single context block.
    pub fn context(&self, results: &[SearchResult]) -> String {
        results
            .iter()
            .map(|result| {
                let source = result.chunk.source_name().unwrap_or("unknown");
                format!("[source: {source}]\n{}", result.chunk.text)
            })
            .collect::<Vec<_>>()
            .join(CONTEXT_DELIMITER)
    }

    /// Render the full prompt.
    pub fn build(&self, question: &str, results: &[SearchResult]) -> String {
        format!(
            "{}\n\nContext:\n{}\n\nQuestion:\n{}\n\n{CITATION_INSTRUCTIONS}",
            self.instructions,
            self.context(results),
            question.trim()
        )
    }
}
