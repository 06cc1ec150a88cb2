use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use insights_core::error::Result;
use insights_core::traits::EmbeddingProvider;
use insights_core::types::EmbeddingTask;

use crate::pool::l2_normalize;

/// Deterministic bag-of-tokens embedder. Each lowercased token is hashed into
/// one bucket, so texts sharing words land close together. Used for local
/// runs and tests where no embedding service is reachable.
pub struct HashedEmbedder {
    dim: usize,
    id: String,
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("hashed-{dim}") }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i % 3) as f32 * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str, _task: EmbeddingTask) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}
