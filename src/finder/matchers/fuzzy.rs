use fuzzy_matcher::skim::SkimMatcherV2;
use itertools::Itertools;

use crate::finder::LabelMatcher;

/// Subsequence matching backed by any `fuzzy_matcher` implementation.
pub struct FuzzyMatcher<T>(T);

impl<T> FuzzyMatcher<T> {
    pub fn new(inner: T) -> Self {
        Self(inner)
    }
}

impl FuzzyMatcher<SkimMatcherV2> {
    pub fn skim() -> Self {
        Self::new(SkimMatcherV2::default().ignore_case())
    }
}

impl<T> LabelMatcher for FuzzyMatcher<T>
    where T: fuzzy_matcher::FuzzyMatcher + Send + Sync,
{
    fn matches<'a>(&self, query: &str, labels: &[&'a str]) -> Vec<&'a str> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        labels.iter()
            .flat_map(|label| {
                self.0
                    .fuzzy_match(label, query)
                    .map(|score| (score, *label))
            })

            .sorted_by_key(|(score, _label)| -score)
            .map(|(_score, label)| label)
            .collect()
    }
}
