//! Embedding providers: a deterministic hashed embedder for local runs and
//! an HTTP client for a hosted embedding model.
use std::sync::Arc;

use insights_core::config::{EmbeddingBackend, EmbeddingSettings};
use insights_core::error::Result;
use insights_core::traits::EmbeddingProvider;

pub mod hashed;
pub mod http;
pub mod pool;

pub use hashed::HashedEmbedder;
pub use http::HttpEmbedder;

pub fn from_settings(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingProvider>> {
    match settings.provider {
        EmbeddingBackend::Hashed => {
            tracing::info!(dim = settings.dimension, "using hashed embedder");
            Ok(Arc::new(HashedEmbedder::new(settings.dimension)))
        }
        EmbeddingBackend::Http => {
            tracing::info!(model = %settings.model, "using http embedder");
            Ok(Arc::new(HttpEmbedder::new(settings)?))
        }
    }
}
