use ragdb_core::config::EmbeddingSettings;
use ragdb_core::traits::Embedder;
use ragdb_embed::{load_embedder, HashEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Select the hashing embedder through settings to avoid loading the large model
    let settings = EmbeddingSettings { use_fake: true, ..EmbeddingSettings::default() };
    let embedder = load_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert_eq!(embedder.dim(), 1024);
    assert!(embedder.embedder_id().starts_with("hash-xx64"));

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn batch_preserves_order() {
    let embedder = HashEmbedder::new(64);
    let texts: Vec<String> = ["alpha", "bravo", "charlie"].iter().map(|s| s.to_string()).collect();
    let batch = embedder.embed_batch(&texts).expect("batch");
    for (i, t) in texts.iter().enumerate() {
        let single = embedder.embed_batch(std::slice::from_ref(t)).expect("single");
        assert_eq!(batch[i], single[0]);
    }
}

#[test]
fn punctuation_and_case_do_not_change_tokens() {
    let embedder = HashEmbedder::new(256);
    let embs = embedder
        .embed_batch(&["Capital of France.".to_string(), "capital of france?".to_string()])
        .expect("embed");
    assert!((cosine(&embs[0], &embs[1]) - 1.0).abs() < 1e-5);
}

#[test]
fn shared_words_are_closer_than_unrelated_text() {
    let embedder = HashEmbedder::new(1024);
    let embs = embedder
        .embed_batch(&[
            "Paris is the capital of France.".to_string(),
            "What is the capital of France?".to_string(),
            "Bananas ripen quickly in warm kitchens.".to_string(),
        ])
        .expect("embed");
    assert!(cosine(&embs[0], &embs[1]) > cosine(&embs[0], &embs[2]));
}

#[test]
fn zero_width_fake_embedder_is_refused() {
    let settings = EmbeddingSettings { use_fake: true, fake_dim: 0, ..EmbeddingSettings::default() };
    assert!(load_embedder(&settings).is_err());
}
