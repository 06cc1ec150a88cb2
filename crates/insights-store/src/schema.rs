use serde_json::{json, Value};

const NORMALIZER: &str = "case_insensitive_analyzer";

fn settings() -> Value {
    json!({"analysis": {"normalizer": {NORMALIZER: {"type": "custom", "filter": ["lowercase"]}}}})
}

fn keyword() -> Value {
    json!({"type": "keyword", "normalizer": NORMALIZER})
}

fn text() -> Value {
    json!({"type": "text"})
}

fn vector(dims: usize) -> Value {
    json!({"type": "dense_vector", "dims": dims, "index": true, "similarity": "cosine"})
}

fn date() -> Value {
    json!({
        "type": "date",
        "format": "yyyy-MM-dd HH:mm:ss||yyyy-MM-dd HH:mm:ss.SSSSSS||yyyy-MM-dd'T'HH:mm:ss.SSSSSS||strict_date_optional_time||epoch_millis"
    })
}

/// Create-index body for an insights index.
pub fn insights_index(dims: usize) -> Value {
    json!({
        "settings": settings(),
        "mappings": {"properties": {
            "key": {"type": "long"},
            "title": text(),
            "description": text(),
            "finding": text(),
            "name": text(),
            "preferred_role": text(),
            "publication_date": text(),
            "created_by": text(),
            "created_by_cdsid": keyword(),
            "created_datetime": date(),
            "updated_by": text(),
            "updated_datetime": date(),
            "authors": text(),
            "authors_cdsid": keyword(),
            "draft_viewers": text(),
            "draft_viewers_cdsid": keyword(),
            "is_draft": {"type": "boolean"},
            "regions": keyword(),
            "classifications": keyword(),
            "platform": keyword(),
            "confidentiality": keyword(),
            "keywords": keyword(),
            "file_path": text(),
            "file_link": text(),
            "data_source": text(),
            "title_vector": vector(dims),
            "description_vector": vector(dims),
        }}
    })
}

/// Create-index body for a summary-cache index.
pub fn summary_cache_index(dims: usize) -> Value {
    json!({
        "settings": settings(),
        "mappings": {"properties": {
            "key": {"type": "long"},
            "topic": text(),
            "user_query": text(),
            "ai_summary_cache": text(),
            "regions": keyword(),
            "total_likes": {"type": "long"},
            "total_dislikes": {"type": "long"},
            "liked_by_cdsids": keyword(),
            "disliked_by_cdsids": keyword(),
            "last_liked_by": keyword(),
            "last_disliked_by": keyword(),
            "updated_by_cdsid": keyword(),
            "updated_datetime_utc": {"type": "text"},
            "topic_vector": vector(dims),
        }}
    })
}
