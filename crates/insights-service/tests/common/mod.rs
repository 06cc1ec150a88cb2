#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use insights_core::config::Settings;
use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, DocumentUpdate, StoredDocument, Summarizer};
use insights_core::types::{DocumentId, IndexSearchResponse, Requester, SearchParams, SummaryInput};
use insights_embed::HashedEmbedder;
use insights_service::AppContext;
use insights_store::MemoryIndex;

pub const INSIGHTS: &str = "insights_dev";
pub const CACHE: &str = "ai_summary_cache_dev";

/// Summarizer whose answers are set by the test.
pub struct ScriptedSummarizer {
    pub keywords: Mutex<Option<String>>,
    pub verdict: Mutex<Option<String>>,
    /// `None` makes `summarize` fail.
    pub summary: Mutex<Option<String>>,
    pub summarize_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub last_inputs: Mutex<Vec<SummaryInput>>,
}

impl Default for ScriptedSummarizer {
    fn default() -> Self {
        Self {
            keywords: Mutex::new(None),
            verdict: Mutex::new(None),
            summary: Mutex::new(Some("Fresh summary.".into())),
            summarize_calls: AtomicUsize::new(0),
            classify_calls: AtomicUsize::new(0),
            last_inputs: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedSummarizer {
    pub fn summarize_calls(&self) -> usize {
        self.summarize_calls.load(Ordering::SeqCst)
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Summarizer for ScriptedSummarizer {
    async fn summarize(&self, _query: &str, documents: &[SummaryInput]) -> Result<String> {
        self.summarize_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_inputs.lock() = documents.to_vec();
        self.summary.lock().clone().ok_or_else(|| Error::Upstream("llm returned 503".into()))
    }

    async fn extract_keywords(&self, _query: &str) -> Result<Option<String>> {
        Ok(self.keywords.lock().clone())
    }

    async fn classify_query_equivalence(&self, _a: &str, _b: &str) -> Result<Option<String>> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.lock().clone())
    }
}

/// Wraps a `MemoryIndex`. Guarded updates can be made to lose a race: a
/// competing like by `ZED9` lands first and the update reports a conflict.
/// Creates can be made to find their key taken, and bulk writes and
/// searches can be made to fail.
pub struct HookedIndex {
    pub inner: Arc<MemoryIndex>,
    pub races: Mutex<usize>,
    pub taken_keys: Mutex<usize>,
    pub fail_bulk: Mutex<bool>,
    pub fail_search: Mutex<bool>,
}

impl HookedIndex {
    pub fn new(inner: Arc<MemoryIndex>) -> Self {
        Self {
            inner,
            races: Mutex::new(0),
            taken_keys: Mutex::new(0),
            fail_bulk: Mutex::new(false),
            fail_search: Mutex::new(false),
        }
    }
}

#[async_trait]
impl DocumentIndex for HookedIndex {
    async fn exists(&self, index: &str) -> Result<bool> {
        self.inner.exists(index).await
    }

    async fn count(&self, index: &str) -> Result<u64> {
        self.inner.count(index).await
    }

    async fn search(&self, index: &str, body: &Value) -> Result<IndexSearchResponse> {
        if *self.fail_search.lock() {
            return Err(Error::Upstream(format!("search {index}: 503 cluster_block_exception")));
        }
        self.inner.search(index, body).await
    }

    async fn get(&self, index: &str, id: &str, excludes: &[&str]) -> Result<StoredDocument> {
        self.inner.get(index, id, excludes).await
    }

    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        self.inner.index(index, id, document).await
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        {
            let mut taken = self.taken_keys.lock();
            if *taken > 0 {
                *taken -= 1;
                return Err(Error::Conflict(format!("create: document {id} already exists")));
            }
        }
        self.inner.create(index, id, document).await
    }

    async fn update(&self, index: &str, id: &str, update: &DocumentUpdate) -> Result<()> {
        let race = {
            let mut races = self.races.lock();
            let race = update.guard.is_some() && *races > 0;
            if race {
                *races -= 1;
            }
            race
        };
        if race {
            let mut current = self.inner.get(index, id, &[]).await?.source;
            let likes = current["total_likes"].as_u64().unwrap_or(0);
            current["total_likes"] = json!(likes + 1);
            if let Some(liked) = current["liked_by_cdsids"].as_array_mut() {
                liked.push(json!("ZED9"));
            }
            current["last_liked_by"] = json!("Zed");
            self.inner.index(index, id, &current).await?;
        }
        self.inner.update(index, id, update).await
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        self.inner.delete(index, id).await
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        self.inner.create_index(index, mappings).await
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.inner.delete_index(index).await
    }

    async fn scan_ids(&self, index: &str) -> Result<Vec<DocumentId>> {
        self.inner.scan_ids(index).await
    }

    async fn bulk_index(&self, index: &str, documents: &[(DocumentId, Value)], timeout: Duration) -> Result<()> {
        if *self.fail_bulk.lock() {
            return Err(Error::Upstream("bulk into insights_dev failed: 1: mapper_parsing_exception".into()));
        }
        self.inner.bulk_index(index, documents, timeout).await
    }
}

pub struct Harness {
    pub store: Arc<MemoryIndex>,
    pub hooked: Arc<HookedIndex>,
    pub llm: Arc<ScriptedSummarizer>,
    pub ctx: AppContext,
}

/// Context over an in-memory store. Insight documents score by their
/// `score` field; every cache entry matches with score 1.
pub fn harness() -> Harness {
    let store = Arc::new(MemoryIndex::new());
    store.set_scorer(|index, _body, source| if index == CACHE { Some(1.0) } else { source["score"].as_f64() });
    let hooked = Arc::new(HookedIndex::new(Arc::clone(&store)));
    let llm = Arc::new(ScriptedSummarizer::default());
    let ctx = AppContext::with_components(
        Settings::default(),
        hooked.clone(),
        Arc::new(HashedEmbedder::new(256)),
        llm.clone(),
    );
    Harness { store, hooked, llm, ctx }
}

pub fn insight(key: u64, title: &str, score: f64) -> Value {
    json!({
        "key": key,
        "title": title,
        "description": format!("{title} details"),
        "finding": "internal only",
        "authors": ["Ann Lee"],
        "regions": ["NA"],
        "is_draft": false,
        "score": score,
    })
}

pub async fn seed_insights(store: &MemoryIndex, scores: &[f64]) {
    store.create_index(INSIGHTS, &json!({})).await.expect("create insights");
    for (i, score) in scores.iter().enumerate() {
        let key = i as u64 + 1;
        store.index(INSIGHTS, &key.to_string(), &insight(key, &format!("Insight {key}"), *score)).await.expect("seed");
    }
}

pub fn cache_entry(key: u64, user_query: &str, regions: &[&str]) -> Value {
    json!({
        "key": key,
        "topic": "brake wear",
        "user_query": user_query,
        "ai_summary_cache": "Cached summary.",
        "regions": regions,
        "total_likes": 1,
        "total_dislikes": 0,
        "liked_by_cdsids": ["BOB2"],
        "disliked_by_cdsids": [],
        "last_liked_by": "Bob",
        "last_disliked_by": "",
        "updated_by_cdsid": "BOB2",
        "updated_datetime_utc": "2024-03-01T10:00:00+00:00",
        "topic_vector": [0.0, 1.0],
    })
}

pub async fn seed_cache(store: &MemoryIndex, entries: &[Value]) {
    store.create_index(CACHE, &json!({})).await.expect("create cache");
    for entry in entries {
        let key = entry["key"].to_string();
        store.index(CACHE, &key, entry).await.expect("seed cache");
    }
}

pub fn ann() -> Requester {
    Requester::new("ann1", "ann")
}

pub fn params(query: &str, page_no: usize) -> SearchParams {
    SearchParams { query: query.into(), page_no, page_size: 24, ..SearchParams::default() }
}
