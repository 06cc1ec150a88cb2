use std::sync::Arc;
use std::time::Duration;

use insights_core::config::Settings;
use insights_core::error::Result;
use insights_core::traits::{DocumentIndex, EmbeddingProvider, Summarizer};
use insights_core::error::Error;
use insights_core::types::{
    EmbeddingTask, Job, ReactionOutcome, Requester, SearchOutcome, SearchParams, SearchRequest, SyncOption,
};
use serde_json::Value;
use insights_llm::ChatSummarizer;
use insights_query::QueryBuilder;
use insights_store::ElasticIndex;

use crate::jobs::JobRegistry;
use crate::orchestrator::SearchOrchestrator;
use crate::summary_cache::SummaryCacheManager;
use crate::sync::IndexSync;

/// Composition root: every service is built once here and shared by reference.
pub struct AppContext {
    pub settings: Settings,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub jobs: Arc<JobRegistry>,
    pub cache: Arc<SummaryCacheManager>,
    pub search: SearchOrchestrator,
    pub sync: IndexSync,
}

impl AppContext {
    /// Wire the production adapters: Elasticsearch, the configured embedder
    /// and the chat-completions summarizer.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let index: Arc<dyn DocumentIndex> = Arc::new(ElasticIndex::new(&settings.elastic)?);
        let embedder = insights_embed::from_settings(&settings.embedding)?;
        let summarizer: Arc<dyn Summarizer> = Arc::new(ChatSummarizer::new(&settings.llm)?);
        Ok(Self::with_components(settings, index, embedder, summarizer))
    }

    pub fn with_components(
        settings: Settings,
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        let queries = Arc::new(QueryBuilder::new(settings.search.clone(), Arc::clone(&embedder)));
        let cache = Arc::new(SummaryCacheManager::new(
            Arc::clone(&index),
            Arc::clone(&summarizer),
            Arc::clone(&queries),
            settings.summary_cache_index(),
            embedder.dim(),
        ));
        let search = SearchOrchestrator::new(Arc::clone(&index), summarizer, queries, Arc::clone(&cache));
        let jobs = Arc::new(JobRegistry::new(settings.jobs.capacity));
        let sync = IndexSync::new(
            index,
            Arc::clone(&embedder),
            Arc::clone(&jobs),
            Duration::from_secs(settings.elastic.bulk_timeout_secs),
        );
        Self { settings, embedder, jobs, cache, search, sync }
    }

    /// Normalize a raw request and run it.
    pub async fn search(&self, index: &str, requester: Requester, params: SearchParams) -> Result<SearchOutcome> {
        let result = self.search.search(SearchRequest::normalize(index, requester, params)).await;
        surface("search", result)
    }

    pub async fn react(&self, index: &str, key: &str, reaction: &str, requester: &Requester) -> Result<ReactionOutcome> {
        let result = self.cache.react(index, key, reaction, requester).await;
        surface("react", result.map(|summary| ReactionOutcome { summary }))
    }

    /// Register and run a sync job. A failed sync is recorded on the job.
    pub async fn sync_records(
        &self,
        job_id: u64,
        key: Option<&str>,
        index: &str,
        records: Vec<Value>,
        option: SyncOption,
    ) -> Result<Job> {
        surface("sync", self.sync.run_job(job_id, key, index, records, option).await)
    }

    pub async fn delete(&self, index: &str, key: Option<&str>) -> Result<()> {
        surface("delete", self.sync.delete(index, key).await)
    }

    /// Embed `sentence` for a task given by its wire name.
    pub async fn embed(&self, sentence: &str, task: &str) -> Result<Vec<f32>> {
        let result = match task.parse::<EmbeddingTask>() {
            Ok(task) => self.embedder.embed(sentence, task).await,
            Err(e) => Err(e),
        };
        surface("embed", result)
    }
}

/// Log a failure before it reaches the caller. Server-side failures carry
/// their full detail here since callers only see the public message.
fn surface<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        log_failure(operation, e);
    }
    result
}

fn log_failure(operation: &str, e: &Error) {
    if e.is_server_error() {
        tracing::error!(operation, status = e.status_code(), error = %e, "request failed");
    } else {
        tracing::info!(operation, status = e.status_code(), error = %e, "request rejected");
    }
}
