use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, DocumentUpdate, StoredDocument, VersionGuard};
use insights_core::types::{DocumentId, IndexSearchResponse, SearchHit};

const PRIMARY_TERM: u64 = 1;

/// Scores a stored source against a query body; `None` means "no match".
pub type Scorer = Arc<dyn Fn(&str, &Value, &Value) -> Option<f64> + Send + Sync>;

struct Doc {
    source: Value,
    seq_no: u64,
}

#[derive(Default)]
struct Index {
    mappings: Value,
    docs: BTreeMap<DocumentId, Doc>,
}

/// In-process document index. Query bodies are not interpreted; a pluggable
/// scorer decides which documents match and how they rank. Paging
/// (`from`/`size`) and `_source.excludes` are honored. Every search body is
/// recorded for inspection.
pub struct MemoryIndex {
    indices: RwLock<HashMap<String, Index>>,
    next_seq: Mutex<u64>,
    scorer: RwLock<Scorer>,
    searches: Mutex<Vec<(String, Value)>>,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            indices: RwLock::new(HashMap::new()),
            next_seq: Mutex::new(0),
            scorer: RwLock::new(Arc::new(match_all)),
            searches: Mutex::new(Vec::new()),
        }
    }

    /// Replace the scorer. Arguments are index name, query body and source.
    pub fn set_scorer<F>(&self, scorer: F)
    where
        F: Fn(&str, &Value, &Value) -> Option<f64> + Send + Sync + 'static,
    {
        *self.scorer.write() = Arc::new(scorer);
    }

    /// Search bodies sent to `index`, oldest first.
    pub fn searches(&self, index: &str) -> Vec<Value> {
        self.searches.lock().iter().filter(|(i, _)| i == index).map(|(_, b)| b.clone()).collect()
    }

    pub fn source(&self, index: &str, id: &str) -> Option<Value> {
        self.indices.read().get(index)?.docs.get(id).map(|d| d.source.clone())
    }

    pub fn ids(&self, index: &str) -> Vec<DocumentId> {
        self.indices.read().get(index).map(|i| i.docs.keys().cloned().collect()).unwrap_or_default()
    }

    pub fn mappings(&self, index: &str) -> Option<Value> {
        self.indices.read().get(index).map(|i| i.mappings.clone())
    }

    fn bump(&self) -> u64 {
        let mut seq = self.next_seq.lock();
        *seq += 1;
        *seq
    }

    fn put(&self, index: &str, id: &str, source: Value) {
        let seq_no = self.bump();
        self.indices
            .write()
            .entry(index.to_string())
            .or_default()
            .docs
            .insert(id.to_string(), Doc { source, seq_no });
    }
}

fn match_all(_index: &str, _body: &Value, _source: &Value) -> Option<f64> {
    Some(1.0)
}

fn missing_index(index: &str) -> Error {
    Error::NotFound(format!("no such index [{index}]"))
}

fn strip(source: &Value, excludes: &[String]) -> Value {
    match source {
        Value::Object(map) if !excludes.is_empty() => {
            Value::Object(map.iter().filter(|(k, _)| !excludes.contains(k)).map(|(k, v)| (k.clone(), v.clone())).collect())
        }
        other => other.clone(),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

#[async_trait]
impl DocumentIndex for MemoryIndex {
    async fn exists(&self, index: &str) -> Result<bool> {
        Ok(self.indices.read().contains_key(index))
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let indices = self.indices.read();
        let idx = indices.get(index).ok_or_else(|| missing_index(index))?;
        Ok(idx.docs.len() as u64)
    }

    async fn search(&self, index: &str, body: &Value) -> Result<IndexSearchResponse> {
        self.searches.lock().push((index.to_string(), body.clone()));
        let scorer = self.scorer.read().clone();
        let excludes: Vec<String> = body["_source"]["excludes"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut hits: Vec<SearchHit> = {
            let indices = self.indices.read();
            let idx = indices.get(index).ok_or_else(|| missing_index(index))?;
            idx.docs
                .iter()
                .filter_map(|(id, doc)| {
                    scorer(index, body, &doc.source).map(|score| SearchHit {
                        id: id.clone(),
                        score,
                        source: strip(&doc.source, &excludes),
                        highlight: None,
                    })
                })
                .collect()
        };
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

        let total = hits.len() as u64;
        let from = body["from"].as_u64().map_or(0, |v| usize::try_from(v).unwrap_or(usize::MAX));
        let size = body["size"].as_u64().map_or(10, |v| usize::try_from(v).unwrap_or(usize::MAX));
        let hits = hits.into_iter().skip(from).take(size).collect();
        Ok(IndexSearchResponse { hits, total })
    }

    async fn get(&self, index: &str, id: &str, excludes: &[&str]) -> Result<StoredDocument> {
        let indices = self.indices.read();
        let doc = indices
            .get(index)
            .and_then(|i| i.docs.get(id))
            .ok_or_else(|| Error::NotFound(format!("Document {id} not found in {index}.")))?;
        let excludes: Vec<String> = excludes.iter().map(|s| (*s).to_string()).collect();
        Ok(StoredDocument {
            id: id.to_string(),
            source: strip(&doc.source, &excludes),
            version: Some(VersionGuard { seq_no: doc.seq_no, primary_term: PRIMARY_TERM }),
        })
    }

    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        self.put(index, id, document.clone());
        Ok(())
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        let seq_no = self.bump();
        let mut indices = self.indices.write();
        let idx = indices.entry(index.to_string()).or_default();
        if idx.docs.contains_key(id) {
            return Err(Error::Conflict(format!("create: document {id} already exists")));
        }
        idx.docs.insert(id.to_string(), Doc { source: document.clone(), seq_no });
        Ok(())
    }

    async fn update(&self, index: &str, id: &str, update: &DocumentUpdate) -> Result<()> {
        let seq_no = self.bump();
        let mut indices = self.indices.write();
        let idx = indices.entry(index.to_string()).or_default();
        match idx.docs.get_mut(id) {
            Some(doc) => {
                if let Some(guard) = update.guard {
                    if guard.seq_no != doc.seq_no || guard.primary_term != PRIMARY_TERM {
                        return Err(Error::Conflict(format!("update: document {id} changed since read")));
                    }
                }
                merge(&mut doc.source, &update.doc);
                doc.seq_no = seq_no;
            }
            None => {
                let source = update
                    .upsert
                    .clone()
                    .ok_or_else(|| Error::NotFound(format!("Document {id} not found in {index}.")))?;
                idx.docs.insert(id.to_string(), Doc { source, seq_no });
            }
        }
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        let mut indices = self.indices.write();
        let idx = indices.get_mut(index).ok_or_else(|| missing_index(index))?;
        idx.docs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Document {id} not found in {index}.")))
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        let mut indices = self.indices.write();
        if indices.contains_key(index) {
            return Err(Error::BadRequest(format!("index [{index}] already exists")));
        }
        indices.insert(index.to_string(), Index { mappings: mappings.clone(), docs: BTreeMap::new() });
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.indices.write().remove(index).map(|_| ()).ok_or_else(|| missing_index(index))
    }

    async fn scan_ids(&self, index: &str) -> Result<Vec<DocumentId>> {
        let indices = self.indices.read();
        let idx = indices.get(index).ok_or_else(|| missing_index(index))?;
        Ok(idx.docs.keys().cloned().collect())
    }

    async fn bulk_index(&self, index: &str, documents: &[(DocumentId, Value)], _timeout: Duration) -> Result<()> {
        for (id, source) in documents {
            self.put(index, id, source.clone());
        }
        Ok(())
    }
}

/// Scorer that matches documents whose string fields contain any query
/// token, one point per token hit. Handy for local runs without a cluster.
pub fn token_overlap_scorer(weight: f64) -> impl Fn(&str, &Value, &Value) -> Option<f64> + Send + Sync {
    move |_index: &str, body: &Value, source: &Value| {
        let query = find_query_text(body)?;
        let haystack = flatten_text(source).to_lowercase();
        let hits = query.split_whitespace().filter(|t| haystack.contains(&t.to_lowercase())).count();
        (hits > 0).then(|| hits as f64 * weight)
    }
}

fn find_query_text(body: &Value) -> Option<String> {
    match body {
        Value::Object(map) => {
            for key in ["multi_match", "match_phrase_prefix"] {
                if let Some(inner) = map.get(key) {
                    if let Some(q) = inner["query"].as_str() {
                        return Some(q.to_string());
                    }
                    if let Some(q) = inner.as_object().and_then(first_query) {
                        return Some(q);
                    }
                }
            }
            map.values().find_map(find_query_text)
        }
        Value::Array(items) => items.iter().find_map(find_query_text),
        _ => None,
    }
}

fn first_query(fields: &Map<String, Value>) -> Option<String> {
    fields.values().find_map(|v| v["query"].as_str().map(str::to_string))
}

fn flatten_text(source: &Value) -> String {
    match source {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten_text).collect::<Vec<_>>().join(" "),
        Value::Object(map) => map.values().map(flatten_text).collect::<Vec<_>>().join(" "),
        _ => String::new(),
    }
}
