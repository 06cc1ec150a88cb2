/// Tags written as `#word` anywhere in the query, with everything but
/// ASCII letters, digits and `_` stripped. Tags that clean to nothing are
/// dropped.
pub fn extract_hashtags(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .filter_map(|word| word.strip_prefix('#'))
        .map(|tag| tag.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_').collect::<String>())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Query text with everything outside `[a-zA-Z0-9_ ]` removed. Both the
/// lexical clause and the query embedding use this form.
pub fn clean_query_text(query: &str) -> String {
    query.chars().filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == ' ').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashtags_are_cleaned() {
        assert_eq!(extract_hashtags("brake #EU-rules and #na #"), vec!["EUrules", "na"]);
        assert!(extract_hashtags("no tags here").is_empty());
    }

    #[test]
    fn cleaning_drops_punctuation() {
        assert_eq!(clean_query_text("#brake, wear (2024)!"), "brake wear 2024");
    }
}
