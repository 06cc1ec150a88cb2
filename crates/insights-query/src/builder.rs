use serde_json::{json, Value};
use std::sync::Arc;

use insights_core::config::SearchSettings;
use insights_core::error::{Error, Result};
use insights_core::traits::EmbeddingProvider;
use insights_core::types::{fields, EmbeddingTask, Filters, SearchRequest, SortMode};

use crate::hashtags::{clean_query_text, extract_hashtags};

/// Slice of the ranked result set requested by one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub from: usize,
    pub size: usize,
}

/// Compute the `from`/`size` pair for a page.
///
/// The result-window limit is checked before the total, so a page beyond the
/// window is a 400 even when it is also past the last document. Callers
/// answer an empty index before asking for a window.
pub fn page_window(page_no: usize, page_size: usize, total_docs: u64, max_window: usize) -> Result<PageWindow> {
    let from = page_no.saturating_sub(1).saturating_mul(page_size);
    if from.saturating_add(page_size) > max_window {
        return Err(Error::BadRequest(
            "Requested range exceeds the maximum allowed. Please adjust the page size.".into(),
        ));
    }
    let total = usize::try_from(total_docs).unwrap_or(usize::MAX);
    if from >= total {
        return Err(Error::NotFound("No more documents to fetch".into()));
    }
    Ok(PageWindow { from, size: page_size.min(total - from) })
}

/// Lexical best-fields match plus one kNN clause per vector field, optional
/// exact-match filters, and one phrase clause per hashtag.
pub fn hybrid_query(
    settings: &SearchSettings,
    text: &str,
    vector: &[f32],
    hashtags: &[String],
    filters: &Filters,
) -> Value {
    let knn = |field: &str| {
        json!({"knn": {"field": field, "query_vector": vector, "num_candidates": settings.knn_candidates}})
    };
    let mut should = vec![
        json!({"multi_match": {
            "query": text,
            "fields": fields::SEARCH_FIELDS,
            "type": "best_fields",
            "boost": settings.lexical_boost,
        }}),
        knn(fields::TITLE_VECTOR),
        knn(fields::DESCRIPTION_VECTOR),
    ];
    if !hashtags.is_empty() {
        let tags: Vec<Value> = hashtags
            .iter()
            .map(|tag| {
                json!({"multi_match": {
                    "query": tag,
                    "fields": fields::HASHTAG_FIELDS,
                    "type": "phrase",
                    "boost": settings.hashtag_boost,
                }})
            })
            .collect();
        should.push(json!({"bool": {"should": tags, "minimum_should_match": 1}}));
    }

    let mut bool_query = json!({"should": should, "minimum_should_match": 1});
    let must = filter_clauses(filters);
    if !must.is_empty() {
        bool_query["must"] = Value::Array(must);
    }
    json!({"bool": bool_query})
}

fn filter_clauses(filters: &Filters) -> Vec<Value> {
    [
        (fields::REGIONS, &filters.regions),
        (fields::CLASSIFICATIONS, &filters.categories),
        (fields::AUTHORS_ID, &filters.authors),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(field, values)| json!({"terms": {field: values}}))
    .collect()
}

/// Published documents, or drafts the requester authored, created or was
/// invited to view.
pub fn permission_filter(requester_id: &str) -> Value {
    json!({"bool": {
        "should": [
            {"term": {(fields::IS_DRAFT): {"value": false}}},
            {"bool": {"must": [
                {"term": {(fields::IS_DRAFT): {"value": true}}},
                {"bool": {
                    "should": [
                        {"term": {(fields::AUTHORS_ID): requester_id}},
                        {"term": {(fields::DRAFT_VIEWERS_ID): requester_id}},
                        {"term": {(fields::CREATED_BY_ID): requester_id}},
                    ],
                    "minimum_should_match": 1,
                }},
            ]}},
        ],
        "minimum_should_match": 1,
    }})
}

/// Relevance first; the update timestamp breaks ties for the dated modes.
pub fn sort_clauses(sort: SortMode) -> Vec<Value> {
    let mut clauses = vec![json!({"_score": {"order": "desc"}})];
    match sort {
        SortMode::LastUpdatedAsc => clauses.push(json!({(fields::UPDATED_DATETIME): {"order": "asc"}})),
        SortMode::LastUpdatedDesc => clauses.push(json!({(fields::UPDATED_DATETIME): {"order": "desc"}})),
        SortMode::Relevance | SortMode::MostAccessed => {}
    }
    clauses
}

/// Topic lookup against the summary cache: prefix phrase on the topic or
/// nearest topic vector, restricted to the requested regions.
pub fn summary_cache_query(settings: &SearchSettings, topic: &str, vector: &[f32], regions: &[String]) -> Value {
    let mut bool_query = json!({
        "should": [
            {"match_phrase_prefix": {(fields::TOPIC): {"query": topic}}},
            {"knn": {
                "field": fields::TOPIC_VECTOR,
                "query_vector": vector,
                "num_candidates": settings.knn_candidates,
                "boost": 1,
            }},
        ],
        "minimum_should_match": 1,
    });
    if !regions.is_empty() {
        bool_query["must"] = json!([{"terms": {(fields::REGIONS): regions}}]);
    }
    json!({
        "query": {"bool": bool_query},
        "_source": {"excludes": [fields::TOPIC_VECTOR]},
    })
}

/// Turns validated requests into query bodies, embedding the query text on
/// the way.
pub struct QueryBuilder {
    settings: SearchSettings,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl QueryBuilder {
    pub fn new(settings: SearchSettings, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { settings, embedder }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.settings
    }

    /// Cleaned query text and its embedding.
    pub async fn embed_query(&self, query: &str) -> Result<(String, Vec<f32>)> {
        let cleaned = clean_query_text(query);
        tracing::debug!(raw = query, cleaned = %cleaned, "query text cleaned");
        let vector = self.embedder.embed(&cleaned, EmbeddingTask::SemanticSimilarity).await?;
        Ok((cleaned, vector))
    }

    /// Full listing query for one page. Paging is validated before any
    /// embedding call is made.
    pub async fn document_query(&self, request: &SearchRequest, total_docs: u64) -> Result<Value> {
        let window = page_window(request.page_no, request.page_size, total_docs, self.settings.max_result_window)?;
        let hashtags = extract_hashtags(&request.query);
        let (text, vector) = self.embed_query(&request.query).await?;

        let body = json!({
            "query": {"bool": {"must": [
                hybrid_query(&self.settings, &text, &vector, &hashtags, &request.filters),
                permission_filter(&request.requester.id),
            ]}},
            "highlight": {"fields": {(fields::TITLE): {}, (fields::DESCRIPTION): {}}},
            "from": window.from,
            "size": window.size,
            "_source": {"excludes": [fields::TITLE_VECTOR, fields::DESCRIPTION_VECTOR]},
            "sort": sort_clauses(request.sort),
        });
        tracing::debug!(
            index = %request.index,
            from = window.from,
            size = window.size,
            hashtags = hashtags.len(),
            "document query built"
        );
        Ok(body)
    }

    /// Summary-cache lookup body for `topic`.
    pub async fn cache_query(&self, topic: &str, regions: &[String]) -> Result<Value> {
        let (text, vector) = self.embed_query(topic).await?;
        Ok(summary_cache_query(&self.settings, &text, &vector, regions))
    }
}
