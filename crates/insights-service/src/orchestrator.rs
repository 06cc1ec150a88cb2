use std::sync::Arc;

use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, Summarizer};
use insights_core::types::{IndexSearchResponse, InsightsPage, SearchOutcome, SearchRequest};
use insights_query::QueryBuilder;

use crate::summary_cache::SummaryCacheManager;

/// Summary cached for a first page on which no hit survived the cutoff.
pub const NO_RESULTS_SUMMARY: &str = "I'm sorry, but there are no search results for your query. If you have any \
other queries or need assistance with different information, feel free to ask.";

/// End-to-end search: keyword rewrite, hybrid query, score cutoff, and the
/// page-one summary.
pub struct SearchOrchestrator {
    index: Arc<dyn DocumentIndex>,
    summarizer: Arc<dyn Summarizer>,
    queries: Arc<QueryBuilder>,
    cache: Arc<SummaryCacheManager>,
}

impl SearchOrchestrator {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        summarizer: Arc<dyn Summarizer>,
        queries: Arc<QueryBuilder>,
        cache: Arc<SummaryCacheManager>,
    ) -> Self {
        Self { index, summarizer, queries, cache }
    }

    pub async fn search(&self, mut request: SearchRequest) -> Result<SearchOutcome> {
        let settings = self.queries.settings();
        request.validate(settings)?;

        let original_query = request.query.clone();
        match self.summarizer.extract_keywords(&original_query).await {
            Ok(Some(keywords)) if !keywords.trim().is_empty() => request.query = keywords.trim().to_string(),
            Ok(_) => tracing::debug!("no keywords extracted, keeping the query as typed"),
            Err(e) => tracing::warn!(error = %e, "keyword extraction failed, keeping the query as typed"),
        }
        tracing::info!(index = %request.index, query = %request.query, page = request.page_no, "searching");

        let response = self.run_query(&request).await?;
        let total_records = response.total;
        let insights: Vec<_> = response.hits.into_iter().filter(|hit| hit.score >= settings.score_cutoff).collect();
        tracing::info!(kept = insights.len(), total_records, cutoff = settings.score_cutoff, "hits cut off by score");
        let search_results = InsightsPage { insights, total_records };

        if request.page_no != 1 {
            return Ok(SearchOutcome { summary: None, search_results });
        }

        let summary = if search_results.insights.is_empty() {
            self.cache
                .cache_summary(
                    request.summary_cache_id.as_deref(),
                    &request.query,
                    &original_query,
                    NO_RESULTS_SUMMARY,
                    &request.requester,
                    &request.filters.regions,
                )
                .await?
        } else {
            self.cache.resolve_summary(&original_query, &request, &search_results.insights).await?
        };
        Ok(SearchOutcome { summary: Some(summary), search_results })
    }

    async fn run_query(&self, request: &SearchRequest) -> Result<IndexSearchResponse> {
        if !self.index.exists(&request.index).await? {
            tracing::error!(index = %request.index, "search on missing index");
            return Err(Error::NotFound(format!("Index {} does not exist.", request.index)));
        }
        let total_docs = self.index.count(&request.index).await?;
        if total_docs == 0 {
            // Nothing to page through, so no window check either.
            return Ok(IndexSearchResponse::default());
        }
        let body = self.queries.document_query(request, total_docs).await?;
        self.index.search(&request.index, &body).await
    }
}
