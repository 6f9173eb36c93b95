use std::sync::Arc;

use docqa_core::config::RetrievalSettings;
use docqa_core::{Chunk, ChunkMetadata, CitationBindError, VectorIndex};
use docqa_embed::HashEmbedder;
use docqa_retrieve::{CitationBinder, RetrievalMode, Retriever, BLOCK_DELIMITER};
use docqa_vector::{FlatIndex, ManagedCollection};
use tempfile::TempDir;

fn chunk(source: &str, seq: u64, text: &str) -> Chunk {
    Chunk { text: text.to_string(), source: source.to_string(), page: 1, section: String::new(), sequence_id: seq }
}

fn three_sources() -> Vec<Chunk> {
    vec![
        chunk("alpha.txt", 0, "abstract this paper studies coral reefs"),
        chunk("alpha.txt", 1, "reef bleaching increases with temperature"),
        chunk("alpha.txt", 2, "conclusion reefs need protection"),
        chunk("beta.txt", 0, "introduction to compiler optimisation"),
        chunk("beta.txt", 1, "register allocation by graph colouring"),
        chunk("gamma.txt", 0, "summary of medieval trade routes"),
        chunk("gamma.txt", 1, "silk road caravans and markets"),
    ]
}

fn flat_index(tmp: &TempDir) -> anyhow::Result<FlatIndex> {
    let mut index = FlatIndex::open(tmp.path().join("idx.bin"), Arc::new(HashEmbedder::new(64)))?;
    index.add(&three_sources())?;
    Ok(index)
}

#[test]
fn overview_question_covers_every_source() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let index = flat_index(&tmp)?;
    let known: Vec<String> = index.sources()?.into_iter().collect();
    let retriever = Retriever::from_settings(&RetrievalSettings::default());

    let out = retriever.retrieve(&index, "Give me an overview of all documents", &known, 10)?;
    assert_eq!(out.mode, RetrievalMode::Coverage);
    assert_eq!(out.result.sources.len(), 3);
    assert_eq!(out.result.len(), 6);
    let order: Vec<&str> = out.result.hits.iter().map(|h| h.metadata.source.as_str()).collect();
    assert_eq!(order, vec!["alpha.txt", "alpha.txt", "beta.txt", "beta.txt", "gamma.txt", "gamma.txt"]);
    Ok(())
}

#[test]
fn coverage_skips_unknown_and_repeated_sources() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let index = flat_index(&tmp)?;
    let known = vec!["gamma.txt".to_string(), "ghost.txt".to_string(), "gamma.txt".to_string(), "beta.txt".to_string()];
    let retriever = Retriever::new(["summary"], 1, "abstract introduction summary conclusion");

    let out = retriever.retrieve(&index, "summary please", &known, 10)?;
    let order: Vec<&str> = out.result.hits.iter().map(|h| h.metadata.source.as_str()).collect();
    assert_eq!(order, vec!["gamma.txt", "beta.txt"]);
    assert!(!out.result.sources.contains("ghost.txt"));
    Ok(())
}

#[test]
fn focused_mode_keeps_index_order() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let index = flat_index(&tmp)?;
    let known: Vec<String> = index.sources()?.into_iter().collect();
    let retriever = Retriever::from_settings(&RetrievalSettings::default());

    let question = "register allocation by graph colouring";
    let out = retriever.retrieve(&index, question, &known, 3)?;
    assert_eq!(out.mode, RetrievalMode::Focused);
    assert_eq!(out.result, index.search(question, 3, None)?);
    assert_eq!(out.result.hits[0].metadata.source, "beta.txt");
    assert_eq!(out.blocks[0], "Fonte: beta.txt\nConteúdo: register allocation by graph colouring");
    assert_eq!(out.context(), out.blocks.join(BLOCK_DELIMITER));
    Ok(())
}

#[test]
fn coverage_without_known_sources_searches_focused() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let index = flat_index(&tmp)?;
    let retriever = Retriever::from_settings(&RetrievalSettings::default());
    let out = retriever.retrieve(&index, "overview", &[], 4)?;
    assert_eq!(out.mode, RetrievalMode::Focused);
    assert_eq!(out.result.len(), 4);
    Ok(())
}

#[test]
fn managed_backend_covers_the_same_sources() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let mut coll = ManagedCollection::open(tmp.path().join("db"), "documents", Arc::new(HashEmbedder::new(64)))?;
    coll.add(&three_sources())?;
    let known: Vec<String> = coll.sources()?.into_iter().collect();
    let retriever = Retriever::from_settings(&RetrievalSettings::default());

    let out = retriever.retrieve(&coll, "resumo de todos os textos", &known, 10)?;
    assert_eq!(out.mode, RetrievalMode::Coverage);
    assert_eq!(out.result.sources.len(), 3);
    assert!(out.result.hits.iter().all(|h| known.contains(&h.metadata.source)));
    Ok(())
}

#[test]
fn bound_context_cites_each_block() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let index = flat_index(&tmp)?;
    let retriever = Retriever::from_settings(&RetrievalSettings::default());
    let out = retriever.retrieve(&index, "coral reefs", &[], 2)?;

    let binder = CitationBinder::new();
    let bound = binder.bind(&out.blocks, &out.result.metadata())?;
    let parts: Vec<&str> = bound.split(BLOCK_DELIMITER).collect();
    assert_eq!(parts.len(), 2);
    for (part, hit) in parts.iter().zip(&out.result.hits) {
        assert!(part.starts_with("Fonte: "));
        assert!(part.ends_with(&format!("(Fonte: {}, p. 1)", hit.metadata.source)));
    }
    assert_eq!(bound, binder.bind(&out.blocks, &out.result.metadata())?);
    Ok(())
}

#[test]
fn binding_requires_matching_lengths() {
    let blocks = vec!["Fonte: a\nConteúdo: x".to_string(), "Fonte: b\nConteúdo: y".to_string()];
    let metadata = vec![ChunkMetadata { source: "a".into(), page: Some(2), section: Some("Intro".into()), sequence_id: 0 }];
    let err = CitationBinder::new().bind(&blocks, &metadata).unwrap_err();
    assert_eq!(err, CitationBindError { blocks: 2, metadata: 1 });

    let bound = CitationBinder::new().bind(&blocks[..1], &metadata).unwrap();
    assert_eq!(bound, "Fonte: a\nConteúdo: x (Fonte: a, p. 2, sec. Intro)");
}
