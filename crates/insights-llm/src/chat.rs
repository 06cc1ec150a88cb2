use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use insights_core::config::LlmSettings;
use insights_core::error::{Error, Result};
use insights_core::traits::Summarizer;
use insights_core::types::SummaryInput;

use crate::prompts;
use crate::token::TokenSource;

/// Summarizer backed by a chat-completions endpoint.
pub struct ChatSummarizer {
    client: reqwest::Client,
    url: String,
    model: String,
    token: TokenSource,
}

#[derive(Deserialize)]
struct Keywords {
    keywords: Vec<Value>,
}

/// Keyword string from a model answer shaped like `{"keywords": [...]}`,
/// optionally wrapped in a Markdown code fence. Words are joined with single
/// spaces; an empty list or an unparsable answer gives `None`.
pub fn parse_keywords(answer: &str) -> Option<String> {
    let trimmed = answer.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    let parsed: Keywords = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "keyword answer is not the expected json");
            return None;
        }
    };
    let words: Vec<String> = parsed
        .keywords
        .iter()
        .map(|w| match w {
            Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|w| !w.is_empty())
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

impl ChatSummarizer {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("llm client: {e}")))?;
        Ok(Self {
            client,
            url: settings.url.clone(),
            model: settings.model.clone(),
            token: TokenSource::from_settings(settings),
        })
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(token) = self.token.bearer(&self.client).await? {
            request = request.bearer_auth(token);
        }
        tracing::debug!(url = %self.url, model = %self.model, "requesting chat completion");
        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("llm request: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(%status, detail = %detail, "llm request failed");
            return Err(Error::Upstream(format!("llm returned {status}")));
        }
        let answer: Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("llm response: {e}")))?;
        answer["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Upstream("llm response has no message content".into()))
    }
}

#[async_trait]
impl Summarizer for ChatSummarizer {
    async fn summarize(&self, query: &str, documents: &[SummaryInput]) -> Result<String> {
        let documents_json = serde_json::to_string(documents)?;
        self.complete(prompts::SUMMARY_SYSTEM, &prompts::summary_request(query, &documents_json)).await
    }

    async fn extract_keywords(&self, query: &str) -> Result<Option<String>> {
        let answer = self.complete(prompts::KEYWORDS_SYSTEM, query).await?;
        tracing::debug!(answer = %answer, "keyword answer");
        Ok(parse_keywords(&answer))
    }

    async fn classify_query_equivalence(&self, a: &str, b: &str) -> Result<Option<String>> {
        let answer = self.complete(prompts::EQUIVALENCE_SYSTEM, &prompts::equivalence_request(a, b)).await?;
        let answer = answer.trim();
        Ok((!answer.is_empty()).then(|| answer.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_joined() {
        assert_eq!(parse_keywords(r#"{"keywords": ["brake", "wear", 2024]}"#).as_deref(), Some("brake wear 2024"));
    }

    #[test]
    fn fenced_answers_are_accepted() {
        let answer = "```json\n{\"keywords\": [\"cruise\", \"control\"]}\n```";
        assert_eq!(parse_keywords(answer).as_deref(), Some("cruise control"));
    }

    #[test]
    fn empty_or_malformed_answers_give_none() {
        assert_eq!(parse_keywords(r#"{"keywords": []}"#), None);
        assert_eq!(parse_keywords("brake, wear"), None);
        assert_eq!(parse_keywords(""), None);
    }
}
