use std::collections::BTreeSet;

use itertools::Itertools;
use rayon::prelude::*;
use serde::Serialize;

use crate::finder::{LabelMatcher, SimpleMatcher, Tour, TourIndex, TypoMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Name,
    Title,
    Description,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Name, Field::Title, Field::Description];
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Highest normalized edit distance still counted as a match.
    pub threshold: f64,
    pub name_weight: f64,
    pub title_weight: f64,
    pub description_weight: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            name_weight: 2.5,
            title_weight: 2.5,
            description_weight: 1.5,
        }
    }
}

impl SearchOptions {
    fn weight(&self, field: Field) -> f64 {
        match field {
            Field::Name => self.name_weight,
            Field::Title => self.title_weight,
            Field::Description => self.description_weight,
        }
    }
}

/// A tour matched by a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Position of the tour in the collection the engine was built from.
    pub position: usize,

    /// Match quality in `0.0..=1.0`, higher is better.
    pub score: f64,

    pub matched: BTreeSet<Field>,
}

struct Haystack {
    /// Lowercased characters of name, title and description.
    fields: [Vec<char>; 3],
    name: String,
    title: String,
}

/// Weighted fuzzy search over a tour collection.
///
/// Built once per collection; it keeps the searchable fields lowercased and
/// split into characters, plus the label index used for suggestions.
pub struct SearchEngine {
    options: SearchOptions,
    matcher: TypoMatcher,
    labels: Box<dyn LabelMatcher>,
    index: TourIndex,
    haystacks: Vec<Haystack>,
}

impl SearchEngine {
    pub fn new(tours: &[Tour], options: SearchOptions) -> Self {
        let haystacks = tours.iter()
            .map(|tour| Haystack {
                fields: [
                    lowercase_chars(&tour.name),
                    lowercase_chars(&tour.title),
                    lowercase_chars(&tour.description),
                ],
                name: tour.name.trim().to_string(),
                title: tour.title.trim().to_string(),
            })
            .collect();

        Self {
            matcher: TypoMatcher::new(options.threshold),
            labels: Box::new(SimpleMatcher),
            index: TourIndex::build(tours),
            haystacks,
            options,
        }
    }

    pub fn with_label_matcher(mut self, labels: Box<dyn LabelMatcher>) -> Self {
        self.labels = labels;
        self
    }

    /// Ranked fuzzy hits for `query`, best first. A blank query searches nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query = lowercase_chars(query.trim());
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let total_weight: f64 = Field::ALL.iter().map(|&field| self.options.weight(field)).sum();

        let mut hits: Vec<SearchHit> = self.haystacks
            .par_iter()
            .enumerate()
            .filter_map(|(position, haystack)| {
                let mut matched = BTreeSet::new();
                let mut combined = 1.0;

                for (field, text) in Field::ALL.into_iter().zip(&haystack.fields) {
                    if let Some(distance) = self.matcher.distance(&query, text) {
                        let exponent = self.options.weight(field) / total_weight;
                        combined *= distance.max(f64::EPSILON).powf(exponent);
                        matched.insert(field);
                    }
                }

                (!matched.is_empty()).then(|| SearchHit {
                    position,
                    score: 1.0 - combined,
                    matched,
                })
            })
            .collect();

        // stable, so equal scores keep collection order
        hits.sort_by(|lhs, rhs| rhs.score.total_cmp(&lhs.score));
        hits.truncate(limit);
        hits
    }

    /// Completion candidates drawn from category labels, destinations and
    /// the names of the best fuzzy hits, without duplicates.
    pub fn suggestions(&self, query: &str, limit: usize) -> Vec<String> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }

        let categories = self.index.categories().keys().map(String::as_str).collect_vec();
        let destinations = self.index.destinations().keys().map(String::as_str).collect_vec();

        let labels = self.labels
            .matches(query, &categories)
            .into_iter()
            .chain(self.labels.matches(query, &destinations));

        let names = self.search(query, limit)
            .into_iter()
            .flat_map(|hit| {
                let haystack = &self.haystacks[hit.position];
                [haystack.name.as_str(), haystack.title.as_str()]
            });

        labels
            .chain(names)
            .filter(|suggestion| !suggestion.is_empty())
            .unique()
            .take(limit)
            .map(str::to_string)
            .collect()
    }
}

fn lowercase_chars(text: &str) -> Vec<char> {
    text.to_lowercase().chars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::FuzzyMatcher;

    fn tours() -> Vec<Tour> {
        vec![
            Tour {
                id: "1".into(),
                name: "Sapa Trek".into(),
                price: 100.0,
                category: vec!["Adventure".into()],
                destination: Some("Sapa".into()),
                ..Default::default()
            },
            Tour {
                id: "2".into(),
                name: "Beach Resort".into(),
                price: 300.0,
                category: vec!["Beach".into()],
                destination: Some("Phu Quoc".into()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn misspelled_query_still_matches() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default());
        let hits = engine.search("Saap", 10);

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].position, 0);
        assert!(hits[0].matched.contains(&Field::Name));
        assert!(hits[0].score > 0.0 && hits[0].score < 1.0);
    }

    #[test]
    fn exact_matches_rank_above_typos() {
        let mut collection = tours();
        collection.push(Tour {
            id: "3".into(),
            name: "Sapo Homestay".into(),
            ..Default::default()
        });
        let engine = SearchEngine::new(&collection, SearchOptions::default());
        let hits = engine.search("sapa", 10);

        assert_eq!(hits.first().map(|hit| hit.position), Some(0));
        assert!(hits.iter().any(|hit| hit.position == 2));
    }

    #[test]
    fn matches_in_several_fields_score_higher() {
        let collection = vec![
            Tour {
                id: "1".into(),
                name: "Mekong Delta".into(),
                description: "Boats along the delta".into(),
                ..Default::default()
            },
            Tour {
                id: "2".into(),
                name: "Delta Express".into(),
                description: "Fast boats".into(),
                ..Default::default()
            },
        ];
        let engine = SearchEngine::new(&collection, SearchOptions::default());
        let hits = engine.search("delta", 10);

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[0].matched.len(), 2);
    }

    #[test]
    fn engine_indexes_its_collection() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default());
        assert_eq!(engine.index.categories().len(), 2);
        assert_eq!(engine.index.destinations().len(), 2);
    }

    #[test]
    fn upper_case_fields_match_lower_case_queries() {
        let collection = vec![Tour {
            id: "1".into(),
            name: "SAPA TREK".into(),
            description: "Rice Terraces Of MU CANG CHAI".into(),
            ..Default::default()
        }];
        let engine = SearchEngine::new(&collection, SearchOptions::default());

        let hits = engine.search("Terrace", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].matched.contains(&Field::Description));
        assert_eq!(engine.search("saap", 10)[0].matched, BTreeSet::from([Field::Name]));
    }

    #[test]
    fn blank_query_returns_nothing() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default());
        assert!(engine.search("", 10).is_empty());
        assert!(engine.search("   ", 10).is_empty());
        assert!(engine.suggestions(" ", 10).is_empty());
    }

    #[test]
    fn limit_truncates_hits() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default());
        assert_eq!(engine.search("e", 1).len(), 1);
        assert!(engine.search("e", 0).is_empty());
    }

    #[test]
    fn suggestions_union_labels_and_names() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default());

        assert_eq!(engine.suggestions("beach", 10), ["Beach", "Beach Resort"]);
        assert_eq!(engine.suggestions("sapa", 10), ["Sapa", "Sapa Trek"]);
        assert_eq!(engine.suggestions("sapa", 1), ["Sapa"]);
    }

    #[test]
    fn suggestions_use_configured_label_matcher() {
        let engine = SearchEngine::new(&tours(), SearchOptions::default())
            .with_label_matcher(Box::new(FuzzyMatcher::skim()));

        let suggestions = engine.suggestions("advnture", 10);
        assert_eq!(suggestions, ["Adventure"]);
    }
}
