use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use insights_core::config::EmbeddingSettings;
use insights_core::error::{Error, Result};
use insights_core::traits::EmbeddingProvider;
use insights_core::types::EmbeddingTask;

/// Remote embedding service. Accepts either a bare `{"embedding": [...]}`
/// answer or the list-style `{"data": [{"embedding": [...]}]}` one.
pub struct HttpEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    dim: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Bare { embedding: Vec<f32> },
    Listed { data: Vec<EmbeddingItem> },
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let url = settings
            .url
            .clone()
            .ok_or_else(|| Error::InvalidConfig("embedding.url is not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("embedding client: {e}")))?;
        Ok(Self {
            client,
            url,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            dim: settings.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn embedder_id(&self) -> &str {
        &self.model
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        let body = json!({"model": self.model, "input": text, "task_type": task.as_str()});
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("embedding request: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("embedding service returned {status}: {detail}")));
        }
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("embedding response: {e}")))?;
        let vector = match parsed {
            EmbeddingResponse::Bare { embedding } => embedding,
            EmbeddingResponse::Listed { data } => data
                .into_iter()
                .next()
                .map(|item| item.embedding)
                .ok_or_else(|| Error::Upstream("embedding response had no data".into()))?,
        };
        if vector.len() != self.dim {
            return Err(Error::Upstream(format!(
                "embedding has {} dimensions, expected {}",
                vector.len(),
                self.dim
            )));
        }
        tracing::debug!(task = task.as_str(), chars = text.len(), "text embedded");
        Ok(vector)
    }
}
