//! Chunking behavior and property tests for `RecursiveChunker`.

use docqa_rag::document::{CHUNK_INDEX_KEY, Metadata, SOURCE_FILE_KEY};
use docqa_rag::{Chunker, Document, RagError, RecursiveChunker};
use proptest::prelude::*;
use serde_json::Value;

fn document(text: &str) -> Document {
    let mut metadata = Metadata::new();
    metadata.insert(SOURCE_FILE_KEY.to_string(), Value::from("notes/a.txt"));
    Document::new(text, metadata)
}

fn tokens(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("x{i}y")).collect()
}

#[test]
fn separator_free_text_overlaps_by_exactly_the_configured_amount() {
    let text: String = "abcdefghij".repeat(250);
    let chunker = RecursiveChunker::new(1000, 200).unwrap();

    let chunks = chunker.split_text(&text);

    assert_eq!(chunks, vec![
        text[0..1000].to_string(),
        text[800..1800].to_string(),
        text[1600..2500].to_string(),
    ]);
}

#[test]
fn short_text_is_a_single_chunk() {
    let text = "First paragraph.\n\nSecond paragraph.";
    let chunks = RecursiveChunker::default().split_text(text);
    assert_eq!(chunks, vec![text.to_string()]);
}

#[test]
fn paragraphs_are_preferred_split_points() {
    let para_a = "alpha ".repeat(10);
    let para_b = "beta ".repeat(10);
    let text = format!("{}\n\n{}", para_a.trim(), para_b.trim());
    let chunker = RecursiveChunker::new(70, 0).unwrap();

    let chunks = chunker.split_text(&text);

    assert_eq!(chunks, vec![para_a.trim().to_string(), para_b.trim().to_string()]);
}

#[test]
fn whitespace_only_document_has_no_chunks() {
    let chunker = RecursiveChunker::default();
    assert!(chunker.chunk(&document("   \n\n\t  ")).is_empty());
    assert!(chunker.chunk(&document("")).is_empty());
}

#[test]
fn invalid_parameters_are_config_errors() {
    assert!(matches!(RecursiveChunker::new(0, 0), Err(RagError::ConfigError(_))));
    assert!(matches!(RecursiveChunker::new(100, 100), Err(RagError::ConfigError(_))));
    assert!(matches!(RecursiveChunker::new(100, 150), Err(RagError::ConfigError(_))));
    assert!(RecursiveChunker::new(100, 99).is_ok());
}

#[test]
fn chunks_carry_ids_index_and_their_own_metadata_copy() {
    let doc = document(&tokens(200).join(" "));
    let chunker = RecursiveChunker::new(100, 20).unwrap();

    let mut chunks = chunker.chunk(&doc);
    assert!(chunks.len() > 2);

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, format!("{}_{i}", doc.id));
        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.metadata[CHUNK_INDEX_KEY], Value::from(i));
        assert_eq!(chunk.source_file(), Some("notes/a.txt"));
        assert!(chunk.embedding.is_empty());
    }

    chunks[0].metadata.insert(SOURCE_FILE_KEY.to_string(), Value::from("changed.txt"));
    assert_eq!(chunks[1].source_file(), Some("notes/a.txt"));
    assert_eq!(doc.source_file(), Some("notes/a.txt"));
}

#[test]
fn split_documents_keeps_document_order() {
    let first = document("first document");
    let second = document("second document");
    let chunks = RecursiveChunker::default().split_documents(&[first.clone(), second.clone()]);

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].document_id, first.id);
    assert_eq!(chunks[1].document_id, second.id);
}

#[test]
fn multibyte_text_is_measured_in_characters() {
    let text = "é".repeat(30);
    let chunks = RecursiveChunker::new(10, 2).unwrap().split_text(&text);

    assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    assert_eq!(chunks[0], "é".repeat(10));
    assert_eq!(chunks[1], "é".repeat(10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn chunks_never_exceed_chunk_size(
        text in "[a-z .\n]{0,1500}",
        size in 1usize..300,
        overlap_fraction in 0.0f64..0.9,
    ) {
        let overlap = ((size as f64) * overlap_fraction) as usize;
        let overlap = overlap.min(size - 1);
        let chunker = RecursiveChunker::new(size, overlap).unwrap();

        for chunk in chunker.split_text(&text) {
            prop_assert!(chunk.chars().count() <= size);
            prop_assert!(!chunk.trim().is_empty());
            prop_assert_eq!(chunk.trim(), chunk.as_str());
        }
    }

    #[test]
    fn every_token_is_covered_in_order_with_overlap(
        n in 1usize..300,
        size in 40usize..200,
        overlap in 8usize..20,
    ) {
        let words = tokens(n);
        let text = words.join(" ");
        let chunks = RecursiveChunker::new(size, overlap).unwrap().split_text(&text);

        prop_assert!(!chunks.is_empty());
        prop_assert!(chunks[0].starts_with("x0y"));
        let last = format!("x{}y", n - 1);
        prop_assert!(chunks[chunks.len() - 1].ends_with(&last));

        // Every token appears whole in some chunk.
        for word in &words {
            prop_assert!(
                chunks.iter().any(|c| c.split(' ').any(|w| w == word)),
                "token {} missing", word
            );
        }

        // Consecutive chunks overlap: the next one starts inside the previous one.
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            prop_assert!(
                pair[0].split(' ').any(|w| w == first_word),
                "chunk {:?} does not overlap {:?}", pair[1], pair[0]
            );
        }
    }

    #[test]
    fn removing_overlaps_reconstructs_the_text(
        n in 1usize..300,
        size in 40usize..200,
        overlap in 0usize..30,
    ) {
        let words = tokens(n);
        let chunks = RecursiveChunker::new(size, overlap).unwrap().split_text(&words.join(" "));

        // Each chunk starts with a trailing run of the previous one; drop it and join.
        let mut rebuilt: Vec<&str> = Vec::new();
        for chunk in &chunks {
            let next: Vec<&str> = chunk.split_whitespace().collect();
            let shared = (0..=next.len().min(rebuilt.len()))
                .rev()
                .find(|&k| rebuilt[rebuilt.len() - k..] == next[..k])
                .unwrap_or(0);
            rebuilt.extend_from_slice(&next[shared..]);
        }

        prop_assert_eq!(rebuilt.join(" "), words.join(" "));
    }

    #[test]
    fn separator_free_chunks_concatenate_back_after_trimming_the_overlap(
        text in "[a-z]{1,1500}",
        size in 2usize..300,
        overlap_fraction in 0.0f64..0.9,
    ) {
        let overlap = (((size as f64) * overlap_fraction) as usize).min(size - 1);
        let chunks = RecursiveChunker::new(size, overlap).unwrap().split_text(&text);

        let mut rebuilt = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(overlap));
        }

        prop_assert_eq!(rebuilt, text);
    }
}
