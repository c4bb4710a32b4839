use itertools::Itertools;

use crate::finder::LabelMatcher;

/// Case-insensitive substring matching; every query word must occur.
pub struct SimpleMatcher;

impl LabelMatcher for SimpleMatcher {
    fn matches<'a>(&self, query: &str, labels: &[&'a str]) -> Vec<&'a str> {
        let query = query.to_lowercase();
        let query_parts = query.split_whitespace().collect_vec();

        if query_parts.is_empty() {
            return Vec::new();
        }

        labels.iter()
            .filter(|label| {
                let haystack = label.to_lowercase();
                query_parts.iter().all(|part| haystack.contains(part))
            })
            .copied()
            .collect()
    }
}
