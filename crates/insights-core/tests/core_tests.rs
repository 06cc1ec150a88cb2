use std::fs;
use tempfile::TempDir;

use insights_core::config::{resolve_with_base, EmbeddingBackend, Settings};
use insights_core::types::{Requester, SearchParams, SearchRequest, SortMode};

#[test]
fn defaults_apply_without_config_files() {
    let tmp = TempDir::new().expect("tempdir");
    let settings = Settings::load_from(tmp.path(), "dev").expect("load");

    assert_eq!(settings.env, "dev");
    assert!((settings.search.score_cutoff - 14.0).abs() < f64::EPSILON);
    assert_eq!(settings.search.knn_candidates, 5);
    assert_eq!(settings.jobs.capacity, 30);
    assert_eq!(settings.summary_cache_index(), "ai_summary_cache_dev");
}

#[test]
fn env_file_overrides_base_file() {
    let tmp = TempDir::new().expect("tempdir");
    fs::write(
        tmp.path().join("config.toml"),
        "[search]\nscore_cutoff = 9.5\nknn_candidates = 7\n[llm]\nmodel = \"base-model\"\n",
    )
    .expect("write base");
    fs::write(tmp.path().join("config.prod.toml"), "[llm]\nmodel = \"prod-model\"\n").expect("write prod");

    let settings = Settings::load_from(tmp.path(), "production").expect("load");

    assert_eq!(settings.env, "prod");
    assert!((settings.search.score_cutoff - 9.5).abs() < f64::EPSILON);
    assert_eq!(settings.search.knn_candidates, 7);
    assert_eq!(settings.llm.model, "prod-model");
    assert_eq!(settings.summary_cache_index(), "ai_summary_cache_prod");
}

#[test]
fn invalid_page_range_is_rejected() {
    let tmp = TempDir::new().expect("tempdir");
    fs::write(tmp.path().join("config.toml"), "[search]\nmin_page_size = 40\nmax_page_size = 30\n").expect("write");

    let err = Settings::load_from(tmp.path(), "dev").expect_err("range must be rejected");
    assert_eq!(err.status_code(), 500);
}

#[test]
fn result_window_smaller_than_a_page_is_rejected() {
    let mut settings = Settings::default();
    settings.search.max_result_window = 10;
    settings.search.max_page_size = 30;
    let err = settings.validate().expect_err("window must hold a page");
    assert!(err.to_string().contains("max_result_window"));

    settings.search.max_result_window = 30;
    assert!(settings.validate().is_ok());
}

#[test]
fn http_embedder_requires_url() {
    let mut settings = Settings::default();
    assert!(settings.validate().is_ok());
    settings.embedding.provider = EmbeddingBackend::Http;
    assert!(settings.validate().is_err());
    settings.embedding.url = Some("http://localhost:8081/embed".into());
    assert!(settings.validate().is_ok());
}

#[test]
fn resolve_with_base_keeps_absolute_paths() {
    let tmp = TempDir::new().expect("tempdir");
    let abs = tmp.path().join("x.toml");
    assert_eq!(resolve_with_base(tmp.path(), abs.to_string_lossy()), abs);
    assert_eq!(resolve_with_base(tmp.path(), "y.toml"), tmp.path().join("y.toml"));
}

#[test]
fn search_params_deserialize_from_wire_body() {
    let body = r#"{"query":"cruise control","regions":["NA"],"sorted_by":"lastUpdatedAsc",
                   "page_no":2,"page_size":24,"ai_summary_cache_id":"1712345678901"}"#;
    let params: SearchParams = serde_json::from_str(body).expect("parse");
    let req = SearchRequest::normalize("insights_dev", Requester::new("abc12", "ann"), params);

    assert_eq!(req.sort, SortMode::LastUpdatedAsc);
    assert_eq!(req.filters.regions, vec!["NA".to_string()]);
    assert_eq!(req.summary_cache_id.as_deref(), Some("1712345678901"));
    assert!(req.validate(&Settings::default().search).is_ok());
}
