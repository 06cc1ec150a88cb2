use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::error::Result;
use crate::types::{DocumentId, EmbeddingTask, IndexSearchResponse, SummaryInput};

/// Sequence number and primary term observed when a document was read.
/// Passing it back on a write makes the store reject the write with
/// `Error::Conflict` if the document changed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionGuard {
    pub seq_no: u64,
    pub primary_term: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: DocumentId,
    pub source: Value,
    pub version: Option<VersionGuard>,
}

/// Partial update. `upsert` is written verbatim when the document is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub doc: Value,
    pub upsert: Option<Value>,
    pub guard: Option<VersionGuard>,
}

/// Remote document index with lexical scoring and approximate kNN.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn exists(&self, index: &str) -> Result<bool>;
    async fn count(&self, index: &str) -> Result<u64>;

    /// Run a query body. The body is the store's native query DSL.
    async fn search(&self, index: &str, body: &Value) -> Result<IndexSearchResponse>;

    /// Fetch one document. Missing documents yield `Error::NotFound`.
    async fn get(&self, index: &str, id: &str, excludes: &[&str]) -> Result<StoredDocument>;

    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<()>;
    /// Write a new document. An existing `id` yields `Error::Conflict`.
    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<()>;
    async fn update(&self, index: &str, id: &str, update: &DocumentUpdate) -> Result<()>;
    async fn delete(&self, index: &str, id: &str) -> Result<()>;

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()>;
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Every document id currently stored in `index`.
    async fn scan_ids(&self, index: &str) -> Result<Vec<DocumentId>>;

    async fn bulk_index(&self, index: &str, documents: &[(DocumentId, Value)], timeout: Duration) -> Result<()>;
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier reported back to sync callers as the model name.
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;
}

/// Language-model operations used by the search and cache services.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, query: &str, documents: &[SummaryInput]) -> Result<String>;

    /// Keyword form of a free-text query; `None` when nothing usable came back.
    async fn extract_keywords(&self, query: &str) -> Result<Option<String>>;

    /// Free-text verdict on whether two queries ask the same thing.
    async fn classify_query_equivalence(&self, a: &str, b: &str) -> Result<Option<String>>;
}
