use insights_core::config::{EmbeddingBackend, EmbeddingSettings};
use insights_core::traits::EmbeddingProvider;
use insights_core::types::EmbeddingTask;
use insights_embed::{from_settings, HashedEmbedder};

#[tokio::test]
async fn hashed_embedder_shapes_and_determinism() {
    let embedder = from_settings(&EmbeddingSettings::default()).expect("embedder");

    let v1 = embedder.embed("hello world", EmbeddingTask::SemanticSimilarity).await.expect("embed");
    let v2 = embedder.embed("hello world", EmbeddingTask::RetrievalDocument).await.expect("embed");

    assert_eq!(v1.len(), 256, "default dimension");
    assert_eq!(embedder.dim(), 256);

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn shared_words_are_closer_than_disjoint_ones() {
    let e = HashedEmbedder::new(128);
    let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
    let base = e.embed_sync("brake pad wear");
    let near = e.embed_sync("Brake pad noise");
    let far = e.embed_sync("infotainment screen freeze");
    assert!(dot(&base, &near) > dot(&base, &far));
}

#[test]
fn http_provider_requires_url() {
    let settings = EmbeddingSettings { provider: EmbeddingBackend::Http, ..EmbeddingSettings::default() };
    assert!(from_settings(&settings).is_err());
}
