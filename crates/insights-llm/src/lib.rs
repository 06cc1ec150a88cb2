//! insights-llm
//!
//! Summarizer over an OpenAI-style chat-completions endpoint: result
//! summaries, keyword extraction and query-equivalence checks.
pub mod chat;
pub mod prompts;
pub mod token;

pub use chat::{parse_keywords, ChatSummarizer};
pub use token::TokenSource;
