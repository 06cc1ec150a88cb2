use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use insights_core::config::expand_path;
use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, DocumentUpdate, EmbeddingProvider};
use insights_core::types::{fields, DocumentId, EmbeddingTask, Job, JobStatus, SyncOption};
use insights_store::schema;

use crate::jobs::JobRegistry;

/// Result of one sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub index: String,
    pub model: String,
    pub total_records: u64,
}

/// Records from a JSON-lines file, one object per line. `~` and `$VAR` in
/// `path` are expanded and blank lines are skipped.
pub fn read_records(path: &str) -> Result<Vec<Value>> {
    let path = expand_path(path);
    let text = fs::read_to_string(&path)
        .map_err(|e| Error::NotFound(format!("cannot read {}: {e}", path.display())))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::BadRequest(format!("{}:{}: {e}", path.display(), n + 1)))
        })
        .collect()
}

/// Loads insight records into a document index and removes stale ones.
pub struct IndexSync {
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    jobs: Arc<JobRegistry>,
    bulk_timeout: Duration,
}

fn record_id(record: &Value) -> Option<DocumentId> {
    match record.get(fields::KEY)? {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

impl IndexSync {
    pub fn new(
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        jobs: Arc<JobRegistry>,
        bulk_timeout: Duration,
    ) -> Self {
        Self { index, embedder, jobs, bulk_timeout }
    }

    /// Write `records` into `index_name`. A full sync (`key` is `None`) also
    /// deletes indexed documents that are no longer among the records.
    pub async fn sync(
        &self,
        key: Option<&str>,
        index_name: &str,
        records: Vec<Value>,
        option: SyncOption,
    ) -> Result<SyncReport> {
        self.ensure_index(index_name).await?;

        let mut documents = Vec::with_capacity(records.len());
        for mut record in records {
            let Some(id) = record_id(&record) else {
                tracing::error!(record = %record, "record without key skipped");
                continue;
            };
            self.embed_missing_vectors(&mut record).await?;
            documents.push((id, record));
        }

        if key.is_none() {
            self.delete_stale(index_name, &documents).await?;
        }

        match option {
            SyncOption::BulkInsert => self.index.bulk_index(index_name, &documents, self.bulk_timeout).await?,
            SyncOption::Insert => {
                for (id, doc) in &documents {
                    tracing::debug!(id = %id, "inserting");
                    self.index.index(index_name, id, doc).await?;
                }
            }
            SyncOption::Upsert => {
                for (id, doc) in &documents {
                    tracing::debug!(id = %id, "upserting");
                    let update = DocumentUpdate { doc: doc.clone(), upsert: Some(doc.clone()), guard: None };
                    self.index.update(index_name, id, &update).await?;
                }
            }
        }

        let report = SyncReport {
            index: index_name.to_string(),
            model: self.embedder.embedder_id().to_string(),
            total_records: self.index.count(index_name).await?,
        };
        tracing::info!(index = %report.index, option = option.as_str(), written = documents.len(), total = report.total_records, "sync finished");
        Ok(report)
    }

    /// Run a sync under `job_id` and record its outcome in the job registry.
    pub async fn process_sync(
        &self,
        job_id: u64,
        key: Option<&str>,
        index_name: &str,
        records: Vec<Value>,
        option: SyncOption,
    ) {
        match self.sync(key, index_name, records, option).await {
            Ok(report) => {
                let data = serde_json::to_value(&report).ok();
                self.jobs.update(job_id, JobStatus::Completed, data);
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "sync failed");
                self.jobs.update(job_id, JobStatus::Failed, Some(json!({"error": e.to_string()})));
            }
        }
    }

    /// Register a sync job, run it to completion and return its final record.
    pub async fn run_job(
        &self,
        job_id: u64,
        key: Option<&str>,
        index_name: &str,
        records: Vec<Value>,
        option: SyncOption,
    ) -> Result<Job> {
        self.jobs.register(job_id, &format!("sync {index_name}"));
        self.process_sync(job_id, key, index_name, records, option).await;
        self.jobs
            .get(job_id)
            .ok_or_else(|| Error::Internal(format!("job {job_id} was evicted before it finished")))
    }

    /// Delete one document, or the whole index when `key` is `None`.
    pub async fn delete(&self, index_name: &str, key: Option<&str>) -> Result<()> {
        if !self.index.exists(index_name).await? {
            return Err(Error::NotFound(format!("Index {index_name} does not exist.")));
        }
        match key {
            Some(key) => {
                self.index.delete(index_name, key).await?;
                tracing::info!(index = index_name, key, "document deleted");
            }
            None => self.index.delete_index(index_name).await?,
        }
        Ok(())
    }

    async fn ensure_index(&self, index_name: &str) -> Result<()> {
        if self.index.exists(index_name).await? {
            tracing::debug!(index = index_name, "index already exists");
            return Ok(());
        }
        self.index.create_index(index_name, &schema::insights_index(self.embedder.dim())).await
    }

    async fn embed_missing_vectors(&self, record: &mut Value) -> Result<()> {
        for (text_field, vector_field) in
            [(fields::TITLE, fields::TITLE_VECTOR), (fields::DESCRIPTION, fields::DESCRIPTION_VECTOR)]
        {
            if record.get(vector_field).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let Some(text) = record.get(text_field).and_then(Value::as_str).map(str::to_string) else {
                continue;
            };
            let vector = self.embedder.embed(&text, EmbeddingTask::RetrievalDocument).await?;
            record[vector_field] = json!(vector);
        }
        Ok(())
    }

    async fn delete_stale(&self, index_name: &str, documents: &[(DocumentId, Value)]) -> Result<()> {
        let incoming: HashSet<&str> = documents.iter().map(|(id, _)| id.as_str()).collect();
        let stale: Vec<DocumentId> = self
            .index
            .scan_ids(index_name)
            .await?
            .into_iter()
            .filter(|id| !incoming.contains(id.as_str()))
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        tracing::info!(index = index_name, count = stale.len(), "deleting stale documents");
        try_join_all(stale.iter().map(|id| self.index.delete(index_name, id))).await?;
        Ok(())
    }
}
