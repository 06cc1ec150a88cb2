//! Domain types shared by the query builder, the store adapters and the
//! search/summary services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::config::SearchSettings;
use crate::error::{Error, Result};

pub type DocumentId = String;

/// Field names of the insights and summary-cache indexes.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const AUTHORS: &str = "authors";
    pub const REGIONS: &str = "regions";
    pub const CLASSIFICATIONS: &str = "classifications";
    pub const AUTHORS_ID: &str = "authors_cdsid";
    pub const CREATED_BY_ID: &str = "created_by_cdsid";
    pub const DRAFT_VIEWERS_ID: &str = "draft_viewers_cdsid";
    pub const IS_DRAFT: &str = "is_draft";
    pub const UPDATED_DATETIME: &str = "updated_datetime";
    pub const KEY: &str = "key";
    pub const TOPIC: &str = "topic";

    pub const TITLE_VECTOR: &str = "title_vector";
    pub const DESCRIPTION_VECTOR: &str = "description_vector";
    pub const TOPIC_VECTOR: &str = "topic_vector";

    /// Lexical best-fields targets.
    pub const SEARCH_FIELDS: [&str; 9] = [
        "title",
        "description",
        "finding",
        "created_by",
        "authors",
        "draft_viewers",
        "file_path",
        "file_link",
        "data_source",
    ];

    /// Exact-phrase targets for `#tag` tokens.
    pub const HASHTAG_FIELDS: [&str; 7] = [
        "created_by_cdsid",
        "authors_cdsid",
        "draft_viewers_cdsid",
        "platform",
        "regions",
        "classifications",
        "confidentiality",
    ];

    /// Only these fields of a hit are forwarded to the summarizer.
    pub const SUMMARY_FIELDS: [&str; 4] = ["title", "description", "authors", "regions"];
}

/// Index families. The prefix is part of the physical index name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPrefix {
    Insights,
    AiSummaryCache,
}

impl IndexPrefix {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insights => "insights",
            Self::AiSummaryCache => "ai_summary_cache",
        }
    }

    pub fn matches(self, index: &str) -> bool {
        index.trim().starts_with(self.as_str())
    }
}

/// Name of the summary-cache index for a deployment environment.
pub fn summary_cache_index(env: &str) -> String {
    format!("{}_{}", IndexPrefix::AiSummaryCache.as_str(), env.trim().to_lowercase())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    #[default]
    Relevance,
    LastUpdatedAsc,
    LastUpdatedDesc,
    MostAccessed,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::LastUpdatedAsc => "lastUpdatedAsc",
            Self::LastUpdatedDesc => "lastUpdatedDesc",
            Self::MostAccessed => "mostAccessed",
        }
    }
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "relevance" => Ok(Self::Relevance),
            "lastUpdatedAsc" => Ok(Self::LastUpdatedAsc),
            "lastUpdatedDesc" => Ok(Self::LastUpdatedDesc),
            "mostAccessed" => Ok(Self::MostAccessed),
            other => Err(Error::BadRequest(format!("Invalid sort option {other}."))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Dislike,
    Reload,
}

impl Reaction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Reload => "reload",
        }
    }
}

impl FromStr for Reaction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "reload" => Ok(Self::Reload),
            other => Err(Error::BadRequest(format!("Invalid user reaction {other}."))),
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOption {
    Insert,
    Upsert,
    BulkInsert,
}

impl SyncOption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Upsert => "upsert",
            Self::BulkInsert => "bulk_insert",
        }
    }
}

impl FromStr for SyncOption {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "insert" => Ok(Self::Insert),
            "upsert" => Ok(Self::Upsert),
            "bulk_insert" => Ok(Self::BulkInsert),
            other => Err(Error::BadRequest(format!("Invalid sync option {other}."))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InProgress,
    Completed,
    Failed,
}

/// Task hint forwarded to the embedding provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmbeddingTask {
    SemanticSimilarity,
    RetrievalQuery,
    RetrievalDocument,
}

impl EmbeddingTask {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SemanticSimilarity => "SEMANTIC_SIMILARITY",
            Self::RetrievalQuery => "RETRIEVAL_QUERY",
            Self::RetrievalDocument => "RETRIEVAL_DOCUMENT",
        }
    }
}

impl FromStr for EmbeddingTask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SEMANTIC_SIMILARITY" => Ok(Self::SemanticSimilarity),
            "RETRIEVAL_QUERY" => Ok(Self::RetrievalQuery),
            "RETRIEVAL_DOCUMENT" => Ok(Self::RetrievalDocument),
            _ => Err(Error::NotFound("Invalid task type".to_string())),
        }
    }
}

/// The authenticated caller: stable identity plus display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: String,
    pub name: String,
}

impl Requester {
    pub fn new(id: &str, name: &str) -> Self {
        Self { id: id.trim().to_uppercase(), name: capitalize(name.trim()) }
    }
}

/// Request body as received from a caller, before normalization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub sorted_by: SortMode,
    pub page_no: usize,
    pub page_size: usize,
    #[serde(default)]
    pub ai_summary_cache_id: Option<String>,
}

/// Exact-match restrictions. An empty set means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    pub regions: Vec<String>,
    pub categories: Vec<String>,
    pub authors: Vec<String>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.categories.is_empty() && self.authors.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index: String,
    pub requester: Requester,
    pub query: String,
    pub filters: Filters,
    pub sort: SortMode,
    pub page_no: usize,
    pub page_size: usize,
    pub summary_cache_id: Option<String>,
}

impl SearchRequest {
    /// Trim and canonicalize a raw request.
    ///
    /// Author filters arrive as display strings like `"Jane Doe (JDOE1)"`; the
    /// parenthesized id is what the index stores. A plain string with no
    /// parentheses is taken as an id as-is instead of being dropped, so
    /// `"THAWLEY2"` filters on `THAWLEY2`. Unbalanced or empty parentheses
    /// drop the filter value.
    pub fn normalize(index: &str, requester: Requester, params: SearchParams) -> Self {
        let summary_cache_id = params
            .ai_summary_cache_id
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let authors = params.authors.iter().filter_map(|a| author_id(a)).collect();
        Self {
            index: index.trim().to_string(),
            requester,
            query: params.query.trim().to_string(),
            filters: Filters {
                regions: trimmed(params.regions),
                categories: trimmed(params.categories),
                authors,
            },
            sort: params.sorted_by,
            page_no: params.page_no,
            page_size: params.page_size,
            summary_cache_id,
        }
    }

    pub fn validate(&self, limits: &SearchSettings) -> Result<()> {
        if self.index.is_empty() {
            return Err(Error::BadRequest("Index name is required.".into()));
        }
        if self.query.chars().count() < 3 {
            return Err(Error::BadRequest("Query must be at least 3 characters long.".into()));
        }
        if self.requester.id.len() < 3
            || !self.requester.id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::BadRequest(format!("Invalid requester id {}.", self.requester.id)));
        }
        if self.page_no == 0 || self.page_no > limits.max_page_no {
            return Err(Error::BadRequest(format!(
                "page_no must be between 1 and {}.",
                limits.max_page_no
            )));
        }
        if self.page_size < limits.min_page_size || self.page_size > limits.max_page_size {
            return Err(Error::BadRequest(format!(
                "page_size must be between {} and {}.",
                limits.min_page_size, limits.max_page_size
            )));
        }
        if let Some(key) = &self.summary_cache_id {
            if key.len() > 20 || !key.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::BadRequest(format!("Invalid summary cache id {key}.")));
            }
        }
        Ok(())
    }
}

fn trimmed(values: Vec<String>) -> Vec<String> {
    values.into_iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect()
}

fn author_id(display: &str) -> Option<String> {
    let display = display.trim();
    let id = match display.find('(') {
        Some(open) => {
            let rest = &display[open + 1..];
            let close = rest.find(')')?;
            rest[..close].trim()
        }
        None => display,
    };
    (!id.is_empty()).then(|| id.to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// One ranked hit as returned by the document index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    #[serde(rename = "_score")]
    pub score: f64,
    #[serde(rename = "_source")]
    pub source: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
}

/// Raw index response: the current page of hits plus the index-reported total.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSearchResponse {
    pub hits: Vec<SearchHit>,
    pub total: u64,
}

/// Trimmed per-document input for the summarizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regions: Option<Value>,
}

impl SummaryInput {
    pub fn from_source(source: &Value) -> Self {
        let field = |name: &str| source.get(name).cloned();
        Self {
            title: field(fields::TITLE),
            description: field(fields::DESCRIPTION),
            authors: field(fields::AUTHORS),
            regions: field(fields::REGIONS),
        }
    }
}

/// A cached AI summary with its reaction bookkeeping.
///
/// `liked_by` and `disliked_by` are ordered sets: membership is unique and the
/// last element is the most recent reactor. An identity is never in both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryCacheEntry {
    pub key: u64,
    pub topic: String,
    pub user_query: String,
    #[serde(rename = "ai_summary_cache")]
    pub summary: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub total_likes: u64,
    #[serde(default)]
    pub total_dislikes: u64,
    #[serde(rename = "liked_by_cdsids", default)]
    pub liked_by: Vec<String>,
    #[serde(rename = "disliked_by_cdsids", default)]
    pub disliked_by: Vec<String>,
    #[serde(default)]
    pub last_liked_by: String,
    #[serde(default)]
    pub last_disliked_by: String,
    #[serde(rename = "updated_by_cdsid", default)]
    pub updated_by: String,
    #[serde(rename = "updated_datetime_utc", default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_vector: Option<Vec<f32>>,
}

/// Partial document written on the reaction path. Only the fields a
/// reaction or a reload may touch are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionPatch {
    #[serde(rename = "ai_summary_cache", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub total_likes: u64,
    pub total_dislikes: u64,
    #[serde(rename = "liked_by_cdsids")]
    pub liked_by: Vec<String>,
    #[serde(rename = "disliked_by_cdsids")]
    pub disliked_by: Vec<String>,
    pub last_liked_by: String,
    pub last_disliked_by: String,
    #[serde(rename = "updated_by_cdsid")]
    pub updated_by: String,
    #[serde(rename = "updated_datetime_utc")]
    pub updated_at: DateTime<Utc>,
}

/// Answer to a reaction: the persisted entry after the transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionOutcome {
    pub summary: SummaryCacheEntry,
}

/// Listing returned to callers: the page of hits and the index-reported total.
///
/// `total_records` is the pre-cutoff count, so it can exceed `insights.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightsPage {
    pub insights: Vec<SearchHit>,
    pub total_records: u64,
}

/// Combined search answer. Pages after the first carry an empty summary object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    #[serde(serialize_with = "entry_or_empty")]
    pub summary: Option<SummaryCacheEntry>,
    pub search_results: InsightsPage,
}

fn entry_or_empty<S>(entry: &Option<SummaryCacheEntry>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match entry {
        Some(entry) => entry.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

/// Background job record kept by the job registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: u64,
    pub name: String,
    pub status: JobStatus,
    #[serde(default)]
    pub data: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(query: &str) -> SearchParams {
        SearchParams { query: query.into(), page_no: 1, page_size: 24, ..Default::default() }
    }

    #[test]
    fn normalize_canonicalizes_requester_and_authors() {
        let mut p = params("  blue cruise  ");
        p.authors = vec!["Jane Doe (JDOE1)".into(), "THAWLEY2".into(), "Broken ()".into()];
        p.ai_summary_cache_id = Some("  ".into());
        let req = SearchRequest::normalize(" insights_dev ", Requester::new(" jdoe1 ", "jANE"), p);
        assert_eq!(req.index, "insights_dev");
        assert_eq!(req.query, "blue cruise");
        assert_eq!(req.requester, Requester { id: "JDOE1".into(), name: "Jane".into() });
        assert_eq!(req.filters.authors, vec!["JDOE1".to_string(), "THAWLEY2".to_string()]);
        assert_eq!(req.summary_cache_id, None);
    }

    #[test]
    fn validate_rejects_out_of_range_pages() {
        let limits = SearchSettings::default();
        let mut req = SearchRequest::normalize("insights", Requester::new("abc", "a"), params("blue"));
        assert!(req.validate(&limits).is_ok());
        req.page_size = 10;
        assert_eq!(req.validate(&limits).map_err(|e| e.status_code()), Err(400));
        req.page_size = 24;
        req.page_no = 0;
        assert!(req.validate(&limits).is_err());
    }

    #[test]
    fn wire_literals_round_trip() {
        assert_eq!("lastUpdatedDesc".parse::<SortMode>().ok(), Some(SortMode::LastUpdatedDesc));
        assert_eq!(serde_json::to_value(SyncOption::BulkInsert).ok(), Some(json!("bulk_insert")));
        assert_eq!(serde_json::to_value(JobStatus::InProgress).ok(), Some(json!("IN_PROGRESS")));
        let err = "love".parse::<Reaction>().err().map(|e| e.status_code());
        assert_eq!(err, Some(400));
    }

    #[test]
    fn later_pages_serialize_an_empty_summary() {
        let outcome = SearchOutcome { summary: None, search_results: InsightsPage::default() };
        let v = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(v["summary"], json!({}));
        assert_eq!(v["search_results"]["total_records"], json!(0));
    }

    #[test]
    fn summary_input_keeps_only_whitelisted_fields() {
        let src = json!({"title": "t", "description": "d", "finding": "secret", "regions": ["NA"]});
        let input = serde_json::to_value(SummaryInput::from_source(&src)).expect("serialize");
        assert_eq!(input, json!({"title": "t", "description": "d", "regions": ["NA"]}));
    }

    #[test]
    fn cache_index_name_is_env_scoped() {
        assert_eq!(summary_cache_index(" PROD "), "ai_summary_cache_prod");
        assert!(IndexPrefix::AiSummaryCache.matches("ai_summary_cache_dev"));
        assert!(!IndexPrefix::AiSummaryCache.matches("insights_dev"));
    }
}
