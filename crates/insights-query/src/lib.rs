//! insights-query
//!
//! Builds document-index query bodies: the hybrid lexical + kNN listing
//! query with its filters, and the topic lookup against the summary cache.
pub mod builder;
pub mod hashtags;

pub use builder::{PageWindow, QueryBuilder};
pub use hashtags::{clean_query_text, extract_hashtags};
