use docqa_core::config::EmbeddingSettings;
use docqa_core::Embedder;
use docqa_embed::{embedder_from_settings, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { dim: 64, ..EmbeddingSettings::default() };
    let embedder = embedder_from_settings(&settings).expect("embedder");
    assert_eq!(embedder.dim(), 64);
    assert_eq!(embedder.model_id(), "hash-64");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    assert_eq!(embs[0].len(), 64);

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn shared_tokens_score_higher() {
    let e = HashEmbedder::new(256);
    let q = e.embed_text("solar panel efficiency");
    let near = e.embed_text("the efficiency of a solar panel");
    let far = e.embed_text("bread recipes with rye flour");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let e = HashEmbedder::new(8);
    assert!(e.embed_text("").iter().all(|x| *x == 0.0));
}

#[test]
fn missing_model_dir_is_an_error() {
    let settings = EmbeddingSettings { model: "/nonexistent/model/dir".to_string(), ..EmbeddingSettings::default() };
    if std::env::var("APP_USE_FAKE_EMBEDDINGS").is_err() && std::env::var("APP_MODEL_DIR").is_err() {
        assert!(embedder_from_settings(&settings).is_err());
    }
}
