//! Prompt texts sent to the chat model.

pub const SUMMARY_SYSTEM: &str = "You receive a JSON list of records (title, description, authors, regions) \
that all relate to one topic. Prefer what the records say over general knowledge, and use general knowledge \
only to round out the answer.";

pub const KEYWORDS_SYSTEM: &str = "Extract the key words from the user's text. Answer with JSON only, \
shaped exactly like {\"keywords\": [\"word\", ...]}.";

pub const EQUIVALENCE_SYSTEM: &str = "You compare two search queries. Answer 'yes' if they ask for the same \
thing, 'no' if they differ, and 'unsure' if you cannot tell.";

/// Reply the model is told to use when the records do not cover the topic.
pub const INSUFFICIENT_INFORMATION: &str =
    "I'm sorry, but I couldn't answer your query due to Insufficient information.";

pub fn summary_request(topic: &str, documents_json: &str) -> String {
    format!(
        "Topic: '{topic}'.\n\
         Write one plain paragraph of at most 150 words that summarizes the records below with respect to the \
         topic. Open the paragraph with the topic itself, keep only the main points, and do not refer to \"the \
         document\" or \"the records\". If the records say nothing useful about the topic, reply exactly: \
         {INSUFFICIENT_INFORMATION}\n\
         Records: {documents_json}"
    )
}

pub fn equivalence_request(a: &str, b: &str) -> String {
    format!("1. {a}\n2. {b}\n")
}
