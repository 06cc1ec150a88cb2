use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, DocumentUpdate, Summarizer};
use insights_core::types::{
    fields, IndexPrefix, Reaction, Requester, SearchHit, SearchRequest, SummaryCacheEntry, SummaryInput,
};
use insights_query::QueryBuilder;
use insights_store::schema;

use crate::reaction::{apply, patch_of};

/// Extra attempts after a version conflict or a taken key.
const CONFLICT_RETRIES: usize = 3;

static LAST_KEY: AtomicU64 = AtomicU64::new(0);

/// Millisecond cache key, bumped past the last key minted by this process.
pub fn mint_key(now_millis: u64) -> u64 {
    let prev = LAST_KEY
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(now_millis.max(prev + 1)))
        .unwrap_or_else(|prev| prev);
    now_millis.max(prev + 1)
}

/// True when `answer` contains the standalone word "yes", any case.
pub fn is_affirmative(answer: &str) -> bool {
    answer
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("yes"))
}

/// Decides whether a cached summary can be reused, produces new summaries,
/// and applies reactions to cached ones.
pub struct SummaryCacheManager {
    index: Arc<dyn DocumentIndex>,
    summarizer: Arc<dyn Summarizer>,
    queries: Arc<QueryBuilder>,
    cache_index: String,
    dims: usize,
}

impl SummaryCacheManager {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        summarizer: Arc<dyn Summarizer>,
        queries: Arc<QueryBuilder>,
        cache_index: String,
        dims: usize,
    ) -> Self {
        Self { index, summarizer, queries, cache_index, dims }
    }

    pub fn cache_index(&self) -> &str {
        &self.cache_index
    }

    /// Summary for page one of a search. `request.query` is the effective
    /// (keyword) query; `original_query` is what the user typed.
    pub async fn resolve_summary(
        &self,
        original_query: &str,
        request: &SearchRequest,
        results: &[SearchHit],
    ) -> Result<SummaryCacheEntry> {
        if request.summary_cache_id.is_some() {
            return self.summarize_and_cache(original_query, request, results).await;
        }
        if !self.index.exists(&self.cache_index).await? {
            tracing::info!(index = %self.cache_index, "summary cache index missing");
            return self.summarize_and_cache(original_query, request, results).await;
        }
        match self.find_candidate(request).await {
            Ok(Some(candidate)) => {
                if self.same_question(original_query, &candidate.user_query).await {
                    tracing::info!(key = candidate.key, "reusing cached summary");
                    return Ok(candidate);
                }
            }
            Ok(None) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!(error = %e, "summary cache lookup found nothing");
            }
            Err(e) => return Err(e),
        }
        self.summarize_and_cache(original_query, request, results).await
    }

    async fn find_candidate(&self, request: &SearchRequest) -> Result<Option<SummaryCacheEntry>> {
        if self.index.count(&self.cache_index).await? == 0 {
            return Ok(None);
        }
        let regions = &request.filters.regions;
        let body = self.queries.cache_query(&request.query, regions).await?;
        let response = self.index.search(&self.cache_index, &body).await?;
        let candidate = response.hits.into_iter().find(|hit| {
            !regions.is_empty()
                || hit.source[fields::REGIONS].as_array().is_some_and(Vec::is_empty)
        });
        candidate.map(|hit| serde_json::from_value(hit.source).map_err(Error::from)).transpose()
    }

    async fn same_question(&self, query: &str, cached_query: &str) -> bool {
        match self.summarizer.classify_query_equivalence(query, cached_query).await {
            Ok(Some(answer)) => {
                tracing::debug!(answer = %answer, "query equivalence answer");
                is_affirmative(&answer)
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "query equivalence check failed");
                false
            }
        }
    }

    async fn summarize_and_cache(
        &self,
        original_query: &str,
        request: &SearchRequest,
        results: &[SearchHit],
    ) -> Result<SummaryCacheEntry> {
        let summary = self.summarize_results(original_query, results).await;
        self.cache_summary(
            request.summary_cache_id.as_deref(),
            &request.query,
            original_query,
            &summary,
            &request.requester,
            &request.filters.regions,
        )
        .await
    }

    /// Summarize the first hits. A summarizer failure yields an empty summary.
    pub async fn summarize_results(&self, query: &str, results: &[SearchHit]) -> String {
        let limit = self.queries.settings().summary_doc_limit;
        let inputs: Vec<SummaryInput> = results.iter().take(limit).map(|hit| SummaryInput::from_source(&hit.source)).collect();
        match self.summarizer.summarize(query, &inputs).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, documents = inputs.len(), "summarization failed");
                String::new()
            }
        }
    }

    /// Store `summary`. Without a key a new entry is minted; with a key the
    /// existing entry gets the new text and a reload.
    pub async fn cache_summary(
        &self,
        key: Option<&str>,
        topic: &str,
        user_query: &str,
        summary: &str,
        requester: &Requester,
        regions: &[String],
    ) -> Result<SummaryCacheEntry> {
        self.ensure_cache_index().await?;
        match key {
            Some(key) => self.mutate(&self.cache_index, key, Reaction::Reload, requester, Some(summary)).await,
            None => {
                let (topic, vector) = self.queries.embed_query(topic).await?;
                let mut attempt = 0;
                loop {
                    let now = Utc::now();
                    let key = mint_key(u64::try_from(now.timestamp_millis()).unwrap_or_default());
                    let entry = SummaryCacheEntry {
                        key,
                        topic: topic.clone(),
                        user_query: user_query.to_string(),
                        summary: summary.to_string(),
                        regions: regions.to_vec(),
                        total_likes: 0,
                        total_dislikes: 0,
                        liked_by: Vec::new(),
                        disliked_by: Vec::new(),
                        last_liked_by: String::new(),
                        last_disliked_by: String::new(),
                        updated_by: requester.id.clone(),
                        updated_at: now,
                        topic_vector: Some(vector.clone()),
                    };
                    let id = key.to_string();
                    match self.index.create(&self.cache_index, &id, &serde_json::to_value(&entry)?).await {
                        Ok(()) => {
                            tracing::info!(key, topic = %entry.topic, "summary cached");
                            return self.read(&self.cache_index, &id).await;
                        }
                        Err(e) if e.is_conflict() && attempt < CONFLICT_RETRIES => {
                            attempt += 1;
                            tracing::warn!(key, attempt, "summary key taken, minting another");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }

    /// Apply a user reaction to a cached summary and return the stored result.
    pub async fn react(&self, index: &str, key: &str, reaction: &str, requester: &Requester) -> Result<SummaryCacheEntry> {
        if !IndexPrefix::AiSummaryCache.matches(index) {
            return Err(Error::NotFound("Invalid index name".into()));
        }
        let reaction: Reaction = reaction.parse()?;
        self.mutate(index.trim(), key.trim(), reaction, requester, None).await
    }

    async fn mutate(
        &self,
        index: &str,
        key: &str,
        reaction: Reaction,
        requester: &Requester,
        new_summary: Option<&str>,
    ) -> Result<SummaryCacheEntry> {
        let mut attempt = 0;
        loop {
            let stored = self.index.get(index, key, &[fields::TOPIC_VECTOR]).await?;
            let mut entry: SummaryCacheEntry = serde_json::from_value(stored.source)?;
            if let Some(summary) = new_summary {
                entry.summary = summary.to_string();
            }
            apply(&mut entry, reaction, requester, Utc::now());
            let update = DocumentUpdate {
                doc: serde_json::to_value(patch_of(&entry, new_summary.is_some()))?,
                upsert: Some(serde_json::to_value(&entry)?),
                guard: stored.version,
            };
            match self.index.update(index, key, &update).await {
                Ok(()) => break,
                Err(e) if e.is_conflict() && attempt < CONFLICT_RETRIES => {
                    attempt += 1;
                    tracing::warn!(index, key, attempt, "summary changed concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!(index, key, reaction = %reaction, by = %requester.id, "summary cache updated");
        self.read(index, key).await
    }

    async fn read(&self, index: &str, key: &str) -> Result<SummaryCacheEntry> {
        let stored = self.index.get(index, key, &[fields::TOPIC_VECTOR]).await?;
        Ok(serde_json::from_value(stored.source)?)
    }

    async fn ensure_cache_index(&self) -> Result<()> {
        if self.index.exists(&self.cache_index).await? {
            return Ok(());
        }
        if let Err(e) = self.index.create_index(&self.cache_index, &schema::summary_cache_index(self.dims)).await {
            // Lost a creation race with a concurrent request.
            if !self.index.exists(&self.cache_index).await? {
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_a_standalone_yes_counts() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Yes, they are the same."));
        assert!(is_affirmative("  YES"));
        assert!(!is_affirmative("no"));
        assert!(!is_affirmative("unsure"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yesterday"));
        assert!(!is_affirmative("eyes"));
    }

    #[test]
    fn keys_minted_in_the_same_millisecond_differ() {
        let a = mint_key(1_700_000_000_000);
        let b = mint_key(1_700_000_000_000);
        assert!(b > a);
        assert!(a >= 1_700_000_000_000);
    }
}
