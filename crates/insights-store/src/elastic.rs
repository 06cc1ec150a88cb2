use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use insights_core::config::ElasticSettings;
use insights_core::error::{Error, Result};
use insights_core::traits::{DocumentIndex, DocumentUpdate, StoredDocument, VersionGuard};
use insights_core::types::{DocumentId, IndexSearchResponse, SearchHit};

const SCROLL_KEEP_ALIVE: &str = "1m";
const SCROLL_PAGE: usize = 1000;

/// Elasticsearch over its REST API.
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ElasticIndex {
    pub fn new(settings: &ElasticSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("elastic client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}/{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("ApiKey {key}")),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(what, error = %e, "elastic request failed");
            Error::Upstream(format!("{what}: {e}"))
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => {
                tracing::debug!(%status, what, detail = %detail, "elastic document or index missing");
                Error::NotFound(format!("{what}: not found"))
            }
            StatusCode::CONFLICT => {
                tracing::warn!(%status, what, detail = %detail, "elastic version conflict");
                Error::Conflict(format!("{what}: version conflict"))
            }
            _ => {
                tracing::error!(%status, what, detail = %detail, "elastic request rejected");
                Error::Upstream(format!("{what}: {status} {detail}"))
            }
        })
    }

    async fn json(&self, builder: RequestBuilder, what: &str) -> Result<Value> {
        self.send(builder, what)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("{what}: malformed response: {e}")))
    }
}

/// Hits and total from a `_search` response.
pub fn parse_search_response(body: &Value) -> Result<IndexSearchResponse> {
    let hits = &body["hits"];
    let total = hits["total"]["value"].as_u64().or_else(|| hits["total"].as_u64()).unwrap_or(0);
    let hits = match hits["hits"].as_array() {
        Some(raw) => raw
            .iter()
            .map(|hit| serde_json::from_value::<SearchHit>(hit.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    Ok(IndexSearchResponse { hits, total })
}

/// NDJSON body for `_bulk`: one index action line and one source line per document.
pub fn bulk_body(index: &str, documents: &[(DocumentId, Value)]) -> Result<String> {
    let mut body = String::new();
    for (id, source) in documents {
        body.push_str(&serde_json::to_string(&json!({"index": {"_index": index, "_id": id}}))?);
        body.push('\n');
        body.push_str(&serde_json::to_string(source)?);
        body.push('\n');
    }
    Ok(body)
}

/// First item error of a `_bulk` response, if the response reports any.
pub fn bulk_error(response: &Value) -> Option<String> {
    if !response["errors"].as_bool().unwrap_or(false) {
        return None;
    }
    let items = response["items"].as_array()?;
    let failed = items.iter().find_map(|item| {
        let action = item.as_object()?.values().next()?;
        action.get("error").map(|err| {
            format!(
                "{}: {}",
                action["_id"].as_str().unwrap_or("?"),
                err["reason"].as_str().unwrap_or("unknown error")
            )
        })
    });
    Some(failed.unwrap_or_else(|| "bulk request reported errors".to_string()))
}

#[async_trait]
impl DocumentIndex for ElasticIndex {
    async fn exists(&self, index: &str) -> Result<bool> {
        match self.send(self.request(Method::HEAD, index), "index exists").await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn count(&self, index: &str) -> Result<u64> {
        let body = self.json(self.request(Method::GET, &format!("{index}/_count")), "count").await?;
        body["count"]
            .as_u64()
            .ok_or_else(|| Error::Upstream(format!("count on {index} returned no count")))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<IndexSearchResponse> {
        let response = self
            .json(self.request(Method::POST, &format!("{index}/_search")).json(body), "search")
            .await?;
        parse_search_response(&response)
    }

    async fn get(&self, index: &str, id: &str, excludes: &[&str]) -> Result<StoredDocument> {
        let mut builder = self.request(Method::GET, &format!("{index}/_doc/{id}"));
        if !excludes.is_empty() {
            builder = builder.query(&[("_source_excludes", excludes.join(","))]);
        }
        let body = match self.json(builder, "get").await {
            Err(e) if e.is_not_found() => {
                return Err(Error::NotFound(format!("Document {id} not found in {index}.")));
            }
            other => other?,
        };
        let version = match (body["_seq_no"].as_u64(), body["_primary_term"].as_u64()) {
            (Some(seq_no), Some(primary_term)) => Some(VersionGuard { seq_no, primary_term }),
            _ => None,
        };
        Ok(StoredDocument { id: id.to_string(), source: body["_source"].clone(), version })
    }

    async fn index(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        self.send(self.request(Method::PUT, &format!("{index}/_doc/{id}")).json(document), "index")
            .await?;
        Ok(())
    }

    async fn create(&self, index: &str, id: &str, document: &Value) -> Result<()> {
        self.send(self.request(Method::PUT, &format!("{index}/_create/{id}")).json(document), "create")
            .await?;
        Ok(())
    }

    async fn update(&self, index: &str, id: &str, update: &DocumentUpdate) -> Result<()> {
        let mut body = json!({"doc": update.doc});
        if let Some(upsert) = &update.upsert {
            body["upsert"] = upsert.clone();
        }
        let mut builder = self.request(Method::POST, &format!("{index}/_update/{id}"));
        if let Some(guard) = update.guard {
            builder = builder.query(&[("if_seq_no", guard.seq_no), ("if_primary_term", guard.primary_term)]);
        }
        self.send(builder.json(&body), "update").await?;
        Ok(())
    }

    async fn delete(&self, index: &str, id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("{index}/_doc/{id}")), "delete")
            .await?;
        Ok(())
    }

    async fn create_index(&self, index: &str, mappings: &Value) -> Result<()> {
        self.send(self.request(Method::PUT, index).json(mappings), "create index").await?;
        tracing::info!(index, "index created");
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, index), "delete index").await?;
        tracing::info!(index, "index deleted");
        Ok(())
    }

    async fn scan_ids(&self, index: &str) -> Result<Vec<DocumentId>> {
        let first = json!({"size": SCROLL_PAGE, "_source": false, "query": {"match_all": {}}});
        let mut page = self
            .json(
                self.request(Method::POST, &format!("{index}/_search"))
                    .query(&[("scroll", SCROLL_KEEP_ALIVE)])
                    .json(&first),
                "scan",
            )
            .await?;
        let mut ids = Vec::new();
        loop {
            let hits = page["hits"]["hits"].as_array().cloned().unwrap_or_default();
            if hits.is_empty() {
                break;
            }
            ids.extend(hits.iter().filter_map(|h| h["_id"].as_str().map(str::to_string)));
            let Some(scroll_id) = page["_scroll_id"].as_str().map(str::to_string) else {
                break;
            };
            page = self
                .json(
                    self.request(Method::POST, "_search/scroll")
                        .json(&json!({"scroll": SCROLL_KEEP_ALIVE, "scroll_id": scroll_id})),
                    "scroll",
                )
                .await?;
        }
        if let Some(scroll_id) = page["_scroll_id"].as_str() {
            let clear = self.request(Method::DELETE, "_search/scroll").json(&json!({"scroll_id": scroll_id}));
            if let Err(e) = self.send(clear, "clear scroll").await {
                tracing::warn!(error = %e, "failed to clear scroll");
            }
        }
        Ok(ids)
    }

    async fn bulk_index(&self, index: &str, documents: &[(DocumentId, Value)], timeout: Duration) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let builder = self
            .request(Method::POST, "_bulk")
            .header("Content-Type", "application/x-ndjson")
            .timeout(timeout)
            .body(bulk_body(index, documents)?);
        let response = self.json(builder, "bulk").await?;
        if let Some(reason) = bulk_error(&response) {
            return Err(Error::Upstream(format!("bulk into {index} failed: {reason}")));
        }
        tracing::info!(index, count = documents.len(), "bulk indexed");
        Ok(())
    }
}
