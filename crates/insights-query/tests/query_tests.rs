use serde_json::json;
use std::sync::Arc;

use insights_core::config::SearchSettings;
use insights_core::types::{Requester, SearchParams, SearchRequest, SortMode};
use insights_embed::HashedEmbedder;
use insights_query::QueryBuilder;

fn builder() -> QueryBuilder {
    QueryBuilder::new(SearchSettings::default(), Arc::new(HashedEmbedder::new(32)))
}

fn request(query: &str, page_no: usize) -> SearchRequest {
    let params = SearchParams { query: query.into(), page_no, page_size: 24, ..SearchParams::default() };
    SearchRequest::normalize("insights_dev", Requester::new("ann1", "ann"), params)
}

#[tokio::test]
async fn document_query_combines_hybrid_and_permission_clauses() {
    let body = builder().document_query(&request("brake wear", 1), 100).await.expect("query");

    let must = body["query"]["bool"]["must"].as_array().expect("must");
    assert_eq!(must.len(), 2);
    let should = must[0]["bool"]["should"].as_array().expect("should");
    assert_eq!(should[0]["multi_match"]["query"], json!("brake wear"));
    assert_eq!(should[0]["multi_match"]["boost"], json!(10.0));
    assert_eq!(should[1]["knn"]["field"], json!("title_vector"));
    assert_eq!(should[2]["knn"]["query_vector"].as_array().map(Vec::len), Some(32));
    assert!(must[1].to_string().contains("\"ANN1\""));
    assert_eq!(body["from"], json!(0));
    assert_eq!(body["size"], json!(24));
    assert_eq!(body["_source"]["excludes"], json!(["title_vector", "description_vector"]));
    assert_eq!(body["sort"], json!([{"_score": {"order": "desc"}}]));
}

#[tokio::test]
async fn hashtags_become_phrase_clauses_and_leave_the_text() {
    let body = builder().document_query(&request("brake #EU-rules #na", 1), 10).await.expect("query");

    let should = body["query"]["bool"]["must"][0]["bool"]["should"].as_array().expect("should");
    assert_eq!(should.len(), 4);
    assert_eq!(should[0]["multi_match"]["query"], json!("brake EUrules na"));
    let tags = should[3]["bool"]["should"].as_array().expect("tag clauses");
    let queries: Vec<_> = tags.iter().map(|t| t["multi_match"]["query"].clone()).collect();
    assert_eq!(queries, vec![json!("EUrules"), json!("na")]);
    assert_eq!(tags[0]["multi_match"]["type"], json!("phrase"));
    assert_eq!(tags[0]["multi_match"]["boost"], json!(15.0));
}

#[tokio::test]
async fn filters_and_dated_sort_are_applied() {
    let mut req = request("brake wear", 2);
    req.filters.regions = vec!["EU".into()];
    req.filters.authors = vec!["JDOE1".into()];
    req.sort = SortMode::LastUpdatedDesc;

    let body = builder().document_query(&req, 100).await.expect("query");

    let filters = body["query"]["bool"]["must"][0]["bool"]["must"].as_array().expect("filters");
    assert_eq!(filters, &vec![json!({"terms": {"regions": ["EU"]}}), json!({"terms": {"authors_cdsid": ["JDOE1"]}})]);
    assert_eq!(body["from"], json!(24));
    assert_eq!(body["sort"][1], json!({"updated_datetime": {"order": "desc"}}));
}

#[tokio::test]
async fn paging_errors_precede_embedding() {
    let b = builder();
    let err = b.document_query(&request("brake wear", 3), 48).await.expect_err("past the end");
    assert_eq!(err.status_code(), 404);
    let err = b.document_query(&request("brake wear", 500), 48).await.expect_err("window");
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn cache_query_scopes_regions_only_when_given() {
    let b = builder();
    let open = b.cache_query("brake wear", &[]).await.expect("open");
    assert!(open["query"]["bool"].get("must").is_none());
    assert_eq!(open["query"]["bool"]["should"][0], json!({"match_phrase_prefix": {"topic": {"query": "brake wear"}}}));
    assert_eq!(open["_source"]["excludes"], json!(["topic_vector"]));

    let scoped = b.cache_query("brake wear", &["EU".to_string()]).await.expect("scoped");
    assert_eq!(scoped["query"]["bool"]["must"], json!([{"terms": {"regions": ["EU"]}}]));
}
