use std::sync::Arc;

use docqa_core::{Chunk, IndexError, MetadataFilter, VectorIndex};
use docqa_embed::HashEmbedder;
use docqa_vector::FlatIndex;
use tempfile::TempDir;

fn chunk(source: &str, seq: u64, page: u32, section: &str, text: &str) -> Chunk {
    Chunk { text: text.to_string(), source: source.to_string(), page, section: section.to_string(), sequence_id: seq }
}

fn embedder(dim: usize) -> Arc<HashEmbedder> {
    Arc::new(HashEmbedder::new(dim))
}

fn corpus() -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = (0..8)
        .map(|i| chunk("solar.txt", i, 1 + i as u32 / 4, "Results", &format!("solar panel efficiency measurement {i}")))
        .collect();
    chunks.push(chunk("bread.txt", 0, 1, "", "rye bread recipe with sourdough"));
    chunks.push(chunk("bread.txt", 1, 2, "Baking", "oven temperature for rye bread"));
    chunks
}

#[test]
fn empty_index_returns_no_hits() {
    let tmp = TempDir::new().unwrap();
    let index = FlatIndex::open(tmp.path().join("idx.bin"), embedder(64)).unwrap();
    let res = index.search("anything", 5, None).unwrap();
    assert!(res.is_empty());
    assert!(res.sources.is_empty());
    assert_eq!(index.count().unwrap(), 0);
}

#[test]
fn search_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("nested/idx.bin");
    let top_before = {
        let mut index = FlatIndex::open(&path, embedder(64)).unwrap();
        index.add(&corpus()).unwrap();
        let res = index.search("rye bread recipe", 1, None).unwrap();
        assert_eq!(res.hits[0].metadata.source, "bread.txt");
        res.hits[0].clone()
    };
    let index = FlatIndex::open(&path, embedder(64)).unwrap();
    assert_eq!(index.count().unwrap(), 10);
    let res = index.search("rye bread recipe", 1, None).unwrap();
    assert_eq!(res.hits[0].text, top_before.text);
    assert_eq!(res.hits[0].metadata, top_before.metadata);
    assert!((res.hits[0].score - top_before.score).abs() < 1e-6);
}

#[test]
fn filter_applies_before_truncation() {
    let tmp = TempDir::new().unwrap();
    let mut index = FlatIndex::open(tmp.path().join("idx.bin"), embedder(64)).unwrap();
    index.add(&corpus()).unwrap();

    let res = index.search("solar panel efficiency", 2, Some(&MetadataFilter::Source("bread.txt".into()))).unwrap();
    assert_eq!(res.len(), 2);
    assert!(res.hits.iter().all(|h| h.metadata.source == "bread.txt"));
    assert_eq!(res.sources.len(), 1);

    let res = index.search("solar", 10, Some(&MetadataFilter::Page(2))).unwrap();
    assert_eq!(res.len(), 5);
    assert!(res.hits.iter().all(|h| h.metadata.page == Some(2)));

    let res = index.search("bread", 10, Some(&MetadataFilter::Section("Baking".into()))).unwrap();
    assert_eq!(res.len(), 1);
    assert_eq!(res.hits[0].metadata.sequence_id, 1);

    let res = index.search("bread", 10, Some(&MetadataFilter::Source("missing.txt".into()))).unwrap();
    assert!(res.is_empty());
}

#[test]
fn hits_are_ordered_and_capped() {
    let tmp = TempDir::new().unwrap();
    let mut index = FlatIndex::open(tmp.path().join("idx.bin"), embedder(64)).unwrap();
    let same: Vec<Chunk> = (0..4).map(|i| chunk("dup.txt", 3 - i, 1, "", "identical words here")).collect();
    index.add(&same).unwrap();

    let res = index.search("identical words here", 3, None).unwrap();
    let seqs: Vec<u64> = res.hits.iter().map(|h| h.metadata.sequence_id).collect();
    assert_eq!(seqs, vec![0, 1, 2]);

    let res = index.search("identical words here", 50, None).unwrap();
    assert_eq!(res.len(), 4);
    assert!(res.hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(index.search("identical", 0, None).unwrap().is_empty());
}

#[test]
fn duplicate_chunks_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut index = FlatIndex::open(tmp.path().join("idx.bin"), embedder(32)).unwrap();
    index.add(&[chunk("a.txt", 0, 1, "", "first")]).unwrap();

    let err = index.add(&[chunk("a.txt", 1, 1, "", "second"), chunk("a.txt", 0, 1, "", "again")]).unwrap_err();
    assert!(matches!(err, IndexError::DuplicateChunk { ref source_id, sequence_id: 0 } if source_id == "a.txt"));
    assert_eq!(index.count().unwrap(), 1);

    let err = index.add(&[chunk("b.txt", 0, 1, "", "x"), chunk("b.txt", 0, 1, "", "y")]).unwrap_err();
    assert!(matches!(err, IndexError::DuplicateChunk { .. }));
    assert_eq!(index.count().unwrap(), 1);
}

#[test]
fn empty_text_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut index = FlatIndex::open(tmp.path().join("idx.bin"), embedder(32)).unwrap();
    let err = index.add(&[chunk("a.txt", 0, 1, "", "")]).unwrap_err();
    assert!(matches!(err, IndexError::EmptyChunk { ref source_id, sequence_id: 0 } if source_id == "a.txt"));
    assert_eq!(index.count().unwrap(), 0);
    assert!(!tmp.path().join("idx.bin").exists());
}

#[test]
fn reopening_with_other_dimension_fails() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx.bin");
    let mut index = FlatIndex::open(&path, embedder(64)).unwrap();
    index.add(&corpus()).unwrap();
    drop(index);

    match FlatIndex::open(&path, embedder(32)) {
        Err(IndexError::DimensionMismatch { expected: 32, found: 64 }) => {}
        other => panic!("expected dimension mismatch, got {:?}", other.err()),
    }
}

#[test]
fn corrupt_blobs_are_reported() {
    let tmp = TempDir::new().unwrap();
    let garbage = tmp.path().join("garbage.bin");
    std::fs::write(&garbage, b"definitely not an index file at all").unwrap();
    assert!(matches!(FlatIndex::open(&garbage, embedder(16)), Err(IndexError::Corrupt { .. })));

    let path = tmp.path().join("idx.bin");
    let mut index = FlatIndex::open(&path, embedder(16)).unwrap();
    index.add(&corpus()).unwrap();
    drop(index);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 7]).unwrap();
    assert!(matches!(FlatIndex::open(&path, embedder(16)), Err(IndexError::Corrupt { .. })));
}

#[test]
fn clear_persists_empty_state() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("idx.bin");
    let mut index = FlatIndex::open(&path, embedder(16)).unwrap();
    index.add(&corpus()).unwrap();
    assert_eq!(index.sources().unwrap().len(), 2);
    index.clear().unwrap();
    assert_eq!(index.count().unwrap(), 0);

    let mut reopened = FlatIndex::open(&path, embedder(16)).unwrap();
    assert_eq!(reopened.count().unwrap(), 0);
    reopened.add(&corpus()).unwrap();
    assert_eq!(reopened.count().unwrap(), 10);
}
