//! Indexing and retrieval-QA pipeline tests against in-process test doubles.

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use common::{FailingEmbedder, KeywordEmbedder, RecordingLlm, RecordingStore, VOCABULARY};
use docqa_rag::document::{Metadata, SOURCE_FILE_KEY};
use docqa_rag::{
    BatchPolicy, Document, DocumentLoader, DuplicatePolicy, EmbeddingProvider, IndexingPipeline,
    MultiFormatLoader, NO_RESULTS_ANSWER, QaPipeline, RagError, RecursiveChunker, VectorStore,
};
use serde_json::Value;
use tempfile::TempDir;

const COLLECTION: &str = "docs";

const RUST_TEXT: &str = "Rust manages memory through ownership. The borrow checker enforces ownership rules at compile time.";
const PYTHON_TEXT: &str = "Python manages memory with a garbage collector. The collector frees unreachable objects.";

struct Fixture {
    dir: TempDir,
    embedder: Arc<KeywordEmbedder>,
    store: Arc<RecordingStore>,
    llm: Arc<RecordingLlm>,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            embedder: Arc::new(KeywordEmbedder::new(VOCABULARY)),
            store: Arc::new(RecordingStore::default()),
            llm: Arc::new(RecordingLlm::new("Rust uses ownership. [source: rust.txt]")),
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn indexer(&self, policy: DuplicatePolicy) -> IndexingPipeline {
        IndexingPipeline::builder()
            .collection(COLLECTION)
            .loader(Arc::new(MultiFormatLoader::new()))
            .chunker(Arc::new(RecursiveChunker::new(1000, 200).unwrap()))
            .embedding_provider(self.embedder.clone())
            .vector_store(self.store.clone())
            .duplicate_policy(policy)
            .build()
            .unwrap()
    }

    fn qa(&self) -> QaPipeline {
        QaPipeline::builder()
            .collection(COLLECTION)
            .embedding_provider(self.embedder.clone())
            .vector_store(self.store.clone())
            .llm(self.llm.clone())
            .build()
            .unwrap()
    }

    async fn count(&self) -> usize {
        self.store.count(COLLECTION).await.unwrap()
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[tokio::test]
async fn indexed_file_answers_questions_with_sources() {
    let fx = Fixture::new();
    let rust = fx.write("rust.txt", RUST_TEXT);
    let python = fx.write("python.txt", PYTHON_TEXT);
    let indexer = fx.indexer(DuplicatePolicy::Replace);

    let report = indexer.index_file(&rust).await.unwrap();
    indexer.index_file(&python).await.unwrap();

    assert_eq!(report.source_file, display(&rust));
    assert_eq!(report.document_count, 1);
    assert_eq!(report.chunk_count, 1);
    assert!(!report.is_empty());

    let answer = fx.qa().answer("How does Rust ownership work?", None).await.unwrap();

    assert_eq!(answer.answer, "Rust uses ownership. [source: rust.txt]");
    assert_eq!(answer.sources.len(), 2);
    assert_eq!(answer.sources[0][SOURCE_FILE_KEY], Value::from(display(&rust)));
    assert_eq!(answer.sources[1][SOURCE_FILE_KEY], Value::from(display(&python)));

    let prompts = fx.llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(&format!("[source: rust.txt]\n{RUST_TEXT}")));
    assert!(prompts[0].contains("How does Rust ownership work?"));
}

#[tokio::test]
async fn retrieve_honors_k() {
    let fx = Fixture::new();
    let indexer = fx.indexer(DuplicatePolicy::Replace);
    indexer.index_file(fx.write("rust.txt", RUST_TEXT)).await.unwrap();
    indexer.index_file(fx.write("python.txt", PYTHON_TEXT)).await.unwrap();

    let results = fx.qa().retrieve("garbage collector", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].chunk.text.contains("garbage collector"));

    let answer = fx.qa().answer("garbage collector", Some(1)).await.unwrap();
    assert_eq!(answer.sources.len(), 1);
}

#[tokio::test]
async fn empty_collection_yields_sentinel_without_model_call() {
    let fx = Fixture::new();

    let answer = fx.qa().answer("What is in the documents?", None).await.unwrap();

    assert_eq!(answer.answer, NO_RESULTS_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(answer.is_no_results());
    assert_eq!(fx.llm.call_count(), 0);
}

#[tokio::test]
async fn blank_question_is_rejected_before_any_call() {
    let fx = Fixture::new();

    let err = fx.qa().answer("   \n", None).await.unwrap_err();

    assert!(matches!(err, RagError::InvalidInput(_)));
    assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.store.searches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn replace_policy_overwrites_previous_records() {
    let fx = Fixture::new();
    let path = fx.write("rust.txt", &format!("{RUST_TEXT}\n\n{}", "ownership ".repeat(150)));
    let indexer = fx.indexer(DuplicatePolicy::Replace);

    let first = indexer.index_file(&path).await.unwrap();
    let before = fx.count().await;
    let second = indexer.index_file(&path).await.unwrap();

    assert_eq!(before, first.chunk_count);
    assert_eq!(fx.count().await, before);
    assert_eq!(second.chunk_count, first.chunk_count);
}

#[tokio::test]
async fn append_policy_keeps_duplicates() {
    let fx = Fixture::new();
    let path = fx.write("rust.txt", RUST_TEXT);
    let indexer = fx.indexer(DuplicatePolicy::Append);

    indexer.index_file(&path).await.unwrap();
    indexer.index_file(&path).await.unwrap();

    assert_eq!(fx.count().await, 2);
}

#[tokio::test]
async fn failed_reindex_keeps_the_previous_records() {
    let fx = Fixture::new();
    let path = fx.write("rust.txt", RUST_TEXT);
    fx.indexer(DuplicatePolicy::Replace).index_file(&path).await.unwrap();
    assert_eq!(fx.count().await, 1);

    // A provider with one more dimension no longer fits the collection.
    let wider: Vec<&'static str> = VOCABULARY.iter().copied().chain(["memory"]).collect();
    let reindexer = IndexingPipeline::builder()
        .collection(COLLECTION)
        .loader(Arc::new(MultiFormatLoader::new()))
        .chunker(Arc::new(RecursiveChunker::new(1000, 200).unwrap()))
        .embedding_provider(Arc::new(KeywordEmbedder::new(&wider)))
        .vector_store(fx.store.clone())
        .build()
        .unwrap();

    let err = reindexer.index_file(&path).await.unwrap_err();

    assert!(matches!(err.root(), RagError::IndexError { .. }));
    assert_eq!(fx.count().await, 1);
    let results = fx.qa().retrieve("rust ownership", 4).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.source_file(), Some(display(&path).as_str()));
}

#[tokio::test]
async fn short_file_is_stored_with_a_single_upsert_of_one_record() {
    let fx = Fixture::new();
    let text: String = "rust owns memory. ".repeat(28).chars().take(500).collect();
    let path = fx.write("short.txt", &text);

    let report = fx.indexer(DuplicatePolicy::Replace).index_file(&path).await.unwrap();

    assert_eq!(report.chunk_count, 1);
    assert_eq!(*fx.store.upserts.lock().unwrap(), vec![1]);
    let stored = fx.qa().retrieve("rust", 4).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].chunk.text, text.trim());
}

#[tokio::test]
async fn long_separator_free_file_is_stored_as_three_overlapping_records() {
    let fx = Fixture::new();
    let text: String = "abcdefghij".repeat(250);
    let path = fx.write("long.txt", &text);

    let report = fx.indexer(DuplicatePolicy::Replace).index_file(&path).await.unwrap();

    assert_eq!(report.chunk_count, 3);
    assert_eq!(*fx.store.upserts.lock().unwrap(), vec![3]);
    assert_eq!(fx.count().await, 3);
}

#[tokio::test]
async fn collection_is_sized_from_returned_embeddings() {
    let fx = Fixture::new();
    fx.indexer(DuplicatePolicy::Replace).index_file(fx.write("rust.txt", RUST_TEXT)).await.unwrap();

    let ensured = fx.store.ensured.lock().unwrap().clone();
    assert_eq!(ensured, vec![(COLLECTION.to_string(), VOCABULARY.len() + 1)]);
    assert_ne!(fx.embedder.dimensions(), VOCABULARY.len() + 1);
}

#[tokio::test]
async fn embeddings_are_requested_in_batches() {
    let fx = Fixture::new();
    let text = (0..10).map(|i| format!("paragraph {i} {}", "rust ".repeat(20))).collect::<Vec<_>>();
    let path = fx.write("long.txt", &text.join("\n\n"));
    let indexer = IndexingPipeline::builder()
        .collection(COLLECTION)
        .loader(Arc::new(MultiFormatLoader::new()))
        .chunker(Arc::new(RecursiveChunker::new(120, 0).unwrap()))
        .embedding_provider(fx.embedder.clone())
        .vector_store(fx.store.clone())
        .embedding_batch_size(3)
        .build()
        .unwrap();

    let report = indexer.index_file(&path).await.unwrap();

    assert_eq!(report.chunk_count, 10);
    assert_eq!(*fx.embedder.batch_sizes.lock().unwrap(), vec![3, 3, 3, 1]);
    assert_eq!(fx.count().await, 10);
}

#[tokio::test]
async fn blank_file_fails_with_load_error_naming_the_file() {
    let fx = Fixture::new();
    let path = fx.write("blank.txt", "  \n\n  ");

    let err = fx.indexer(DuplicatePolicy::Replace).index_file(&path).await.unwrap_err();

    match &err {
        RagError::Indexing { file, .. } => assert_eq!(file, &display(&path)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), RagError::LoadError { .. }));
    assert_eq!(fx.count().await, 0);
}

#[tokio::test]
async fn unsupported_file_fails_with_load_error() {
    let fx = Fixture::new();
    let path = fx.write("slides.pptx", "binary");

    let err = fx.indexer(DuplicatePolicy::Replace).index_file(&path).await.unwrap_err();

    assert!(matches!(err.root(), RagError::LoadError { .. }));
    assert!(err.to_string().contains("unsupported file format"));
}

/// Produces a document whose text has no content, bypassing loader validation.
struct BlankLoader;

impl DocumentLoader for BlankLoader {
    fn supports(&self, _path: &Path) -> bool {
        true
    }

    fn load(&self, path: &Path) -> docqa_rag::Result<Vec<Document>> {
        let mut metadata = Metadata::new();
        metadata.insert(SOURCE_FILE_KEY.to_string(), Value::from(display(path)));
        Ok(vec![Document::new(" \n ", metadata)])
    }
}

#[tokio::test]
async fn zero_chunks_is_reported_and_nothing_is_written() {
    let fx = Fixture::new();
    let indexer = IndexingPipeline::builder()
        .collection(COLLECTION)
        .loader(Arc::new(BlankLoader))
        .chunker(Arc::new(RecursiveChunker::default()))
        .embedding_provider(fx.embedder.clone())
        .vector_store(fx.store.clone())
        .build()
        .unwrap();

    let report = indexer.index_file("scanned.pdf").await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.document_count, 1);
    assert!(fx.store.ensured.lock().unwrap().is_empty());
    assert_eq!(fx.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn embedding_failure_aborts_the_file() {
    let fx = Fixture::new();
    let indexer = IndexingPipeline::builder()
        .collection(COLLECTION)
        .loader(Arc::new(MultiFormatLoader::new()))
        .chunker(Arc::new(RecursiveChunker::default()))
        .embedding_provider(Arc::new(FailingEmbedder))
        .vector_store(fx.store.clone())
        .build()
        .unwrap();

    let err = indexer.index_file(fx.write("rust.txt", RUST_TEXT)).await.unwrap_err();

    assert!(err.is_provider());
    assert!(err.to_string().contains("invalid api key"));
    assert_eq!(fx.count().await, 0);
}

#[tokio::test]
async fn embedding_failure_aborts_the_question() {
    let fx = Fixture::new();
    let qa = QaPipeline::builder()
        .collection(COLLECTION)
        .embedding_provider(Arc::new(FailingEmbedder))
        .vector_store(fx.store.clone())
        .llm(fx.llm.clone())
        .build()
        .unwrap();

    let err = qa.answer("anything?", None).await.unwrap_err();

    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(fx.llm.call_count(), 0);
}

#[tokio::test]
async fn continue_on_error_indexes_remaining_files() {
    let fx = Fixture::new();
    let files = vec![
        fx.write("rust.txt", RUST_TEXT),
        fx.dir.path().join("missing.txt"),
        fx.write("python.txt", PYTHON_TEXT),
    ];

    let report =
        fx.indexer(DuplicatePolicy::Replace).index_files(&files, BatchPolicy::ContinueOnError).await;

    assert_eq!(report.outcomes.len(), 3);
    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert_eq!(report.failures().next().unwrap().path, files[1]);
    assert_eq!(report.indexed_chunks(), 2);
    assert_eq!(fx.count().await, 2);
}

#[tokio::test]
async fn abort_on_error_stops_at_first_failure() {
    let fx = Fixture::new();
    let files = vec![
        fx.write("rust.txt", RUST_TEXT),
        fx.dir.path().join("missing.txt"),
        fx.write("python.txt", PYTHON_TEXT),
    ];

    let report =
        fx.indexer(DuplicatePolicy::Replace).index_files(&files, BatchPolicy::AbortOnError).await;

    assert_eq!(report.outcomes.len(), 2);
    assert!(report.outcomes[1].result.is_err());
    assert_eq!(fx.count().await, 1);
}

#[test]
fn builders_require_their_components() {
    assert!(matches!(IndexingPipeline::builder().build(), Err(RagError::ConfigError(_))));
    assert!(matches!(
        QaPipeline::builder().collection("docs").build(),
        Err(RagError::ConfigError(_))
    ));
}
