use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::RangeInclusive;

use clap::ValueEnum;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::finder::{SearchHit, Tour};

pub const DEFAULT_DURATION_RANGE: RangeInclusive<f64> = 1.0..=21.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[default]
    Recommended,
    PriceLow,
    PriceHigh,
    Rating,
    DurationShort,
    DurationLong,
    Alphabetical,
    Relevance,
}

/// Shows the same kebab-case name the command line accepts.
impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => Ok(()),
        }
    }
}

/// User selected narrowing and ordering of the tour list.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    /// Settled free-text query; blank means no text search.
    pub query: String,
    pub price_range: RangeInclusive<f64>,
    pub duration_range: RangeInclusive<f64>,
    pub rating_min: f64,
    /// Selected category labels, matched with OR semantics.
    pub categories: BTreeSet<String>,
    /// Party size the tour must be able to host.
    pub group_size_max: u32,
    pub sort: SortKey,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            query: String::new(),
            price_range: 0.0..=f64::INFINITY,
            duration_range: DEFAULT_DURATION_RANGE,
            rating_min: 0.0,
            categories: BTreeSet::new(),
            group_size_max: 1,
            sort: SortKey::default(),
        }
    }
}

impl FilterState {
    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// True if anything besides the sort order differs from the defaults.
    pub fn is_active(&self) -> bool {
        let defaults = FilterState::default();

        self.has_query()
            || self.price_range != defaults.price_range
            || self.duration_range != defaults.duration_range
            || self.rating_min != defaults.rating_min
            || !self.categories.is_empty()
            || self.group_size_max != defaults.group_size_max
    }

    pub fn reset(&mut self) {
        *self = FilterState::default();
    }

    pub fn toggle_category(&mut self, label: &str) {
        if !self.categories.remove(label) {
            self.categories.insert(label.to_string());
        }
    }

    fn accepts(&self, tour: &Tour) -> bool {
        self.price_range.contains(&tour.price)
            && self.duration_range.contains(&tour.duration_days())
            && tour.rating.map_or(true, |rating| rating >= self.rating_min)
            && (self.categories.is_empty()
                || tour.category_labels().any(|label| self.categories.contains(label)))
            && tour.max_guests_or_default() >= self.group_size_max
    }
}

/// Runs the filter pipeline and returns the positions of the surviving
/// tours in display order.
pub fn filter_positions(tours: &[Tour], filters: &FilterState, hits: Option<&[SearchHit]>) -> Vec<usize> {
    let hits = hits.unwrap_or_default();

    let candidates: Vec<usize> = if filters.has_query() {
        // a query without hits is a miss, never a fallback to browsing
        if hits.is_empty() {
            return Vec::new();
        }

        hits.iter()
            .map(|hit| hit.position)
            .filter(|&position| position < tours.len())
            .sorted()
            .dedup()
            .collect()
    } else {
        (0..tours.len()).collect()
    };

    let mut positions = candidates
        .into_iter()
        .filter(|&position| filters.accepts(&tours[position]))
        .collect_vec();

    let scores: HashMap<usize, f64> = hits.iter()
        .map(|hit| (hit.position, hit.score))
        .collect();

    sort_positions(tours, &mut positions, filters.sort, &scores);
    positions
}

fn sort_positions(tours: &[Tour], positions: &mut [usize], sort: SortKey, scores: &HashMap<usize, f64>) {
    let price = |position: &usize| tours[*position].price;
    let rating = |position: &usize| tours[*position].rating_or_zero();
    let duration = |position: &usize| tours[*position].duration_days();
    let score = |position: &usize| scores.get(position).copied().unwrap_or(0.0);

    // all sorts are stable, ties keep their previous order
    match sort {
        SortKey::Recommended => {}
        SortKey::PriceLow => positions.sort_by(|a, b| price(a).total_cmp(&price(b))),
        SortKey::PriceHigh => positions.sort_by(|a, b| price(b).total_cmp(&price(a))),
        SortKey::Rating => positions.sort_by(|a, b| rating(b).total_cmp(&rating(a))),
        SortKey::DurationShort => positions.sort_by(|a, b| duration(a).total_cmp(&duration(b))),
        SortKey::DurationLong => positions.sort_by(|a, b| duration(b).total_cmp(&duration(a))),
        SortKey::Alphabetical => positions.sort_by_cached_key(|position| {
            let name = tours[*position].display_name();
            (name.to_lowercase(), name.to_string())
        }),
        SortKey::Relevance => positions.sort_by(|a, b| score(b).total_cmp(&score(a))),
    }
}

/// Occurrence counts per label over an unfiltered collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub categories: BTreeMap<String, usize>,
    pub destinations: BTreeMap<String, usize>,
}

pub fn filter_counts(tours: &[Tour]) -> FilterCounts {
    let mut counts = FilterCounts::default();

    for tour in tours {
        for label in tour.category_labels().unique() {
            *counts.categories.entry(label.to_string()).or_default() += 1;
        }

        if let Some(destination) = tour.destination_label() {
            *counts.destinations.entry(destination).or_default() += 1;
        }
    }

    counts
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::finder::{Departure, SearchEngine, SearchOptions};

    fn scenario() -> Vec<Tour> {
        vec![
            Tour {
                id: "1".into(),
                name: "Sapa Trek".into(),
                price: 100.0,
                duration: Some(crate::finder::TourDuration::Days(3.0)),
                category: vec!["Adventure".into()],
                destination: Some("Sapa".into()),
                ..Default::default()
            },
            Tour {
                id: "2".into(),
                name: "Beach Resort".into(),
                price: 300.0,
                duration: Some(crate::finder::TourDuration::Days(5.0)),
                category: vec!["Beach".into()],
                destination: Some("Phu Quoc".into()),
                ..Default::default()
            },
        ]
    }

    fn filter<'a>(tours: &'a [Tour], filters: &FilterState, hits: Option<&[SearchHit]>) -> Vec<&'a Tour> {
        filter_positions(tours, filters, hits)
            .into_iter()
            .map(|position| &tours[position])
            .collect()
    }

    fn ids(tours: &[&Tour]) -> Vec<String> {
        tours.iter().map(|tour| tour.id.clone()).collect()
    }

    fn hit(position: usize, score: f64) -> SearchHit {
        SearchHit { position, score, matched: BTreeSet::new() }
    }

    #[test]
    fn price_range_selects_cheap_tour() {
        let tours = scenario();
        let filters = FilterState { price_range: 0.0..=200.0, ..Default::default() };

        assert_eq!(ids(&filter(&tours, &filters, None)), ["1"]);
    }

    #[test]
    fn category_selects_beach_tour() {
        let tours = scenario();
        let filters = FilterState {
            categories: BTreeSet::from(["Beach".to_string()]),
            ..Default::default()
        };

        assert_eq!(ids(&filter(&tours, &filters, None)), ["2"]);
    }

    #[test]
    fn categories_use_or_semantics() {
        let tours = vec![Tour {
            id: "ab".into(),
            category: vec!["A".into(), "B".into()],
            duration: Some(crate::finder::TourDuration::Days(2.0)),
            ..Default::default()
        }];
        let filters = FilterState {
            categories: BTreeSet::from(["B".to_string(), "C".to_string()]),
            ..Default::default()
        };

        assert_eq!(ids(&filter(&tours, &filters, None)), ["ab"]);
    }

    #[test]
    fn query_without_hits_is_a_hard_miss() {
        let tours = scenario();
        let filters = FilterState { query: "zanzibar".into(), ..Default::default() };

        assert!(filter(&tours, &filters, Some(&[])).is_empty());
        assert!(filter(&tours, &filters, None).is_empty());
    }

    #[test]
    fn query_restricts_candidates_to_hits() {
        let tours = scenario();
        let engine = SearchEngine::new(&tours, SearchOptions::default());
        let filters = FilterState { query: "Saap".into(), ..Default::default() };
        let hits = engine.search(&filters.query, 50);

        assert_eq!(ids(&filter(&tours, &filters, Some(&hits))), ["1"]);
    }

    #[test]
    fn hits_are_ignored_without_a_query() {
        let tours = scenario();
        let hits = [hit(1, 0.9)];

        assert_eq!(ids(&filter(&tours, &FilterState::default(), Some(&hits))), ["1", "2"]);
    }

    #[test]
    fn relevance_orders_by_score() {
        let tours = scenario();
        let filters = FilterState {
            query: "resort trek".into(),
            sort: SortKey::Relevance,
            ..Default::default()
        };
        let hits = [hit(0, 0.4), hit(1, 0.8)];

        assert_eq!(ids(&filter(&tours, &filters, Some(&hits))), ["2", "1"]);
    }

    #[test]
    fn unrated_tours_pass_rating_filter_but_sort_last() {
        let mut tours = scenario();
        tours[1].rating = Some(4.0);
        let filters = FilterState { rating_min: 3.0, sort: SortKey::Rating, ..Default::default() };

        assert_eq!(ids(&filter(&tours, &filters, None)), ["2", "1"]);

        tours[1].rating = Some(2.0);
        assert_eq!(ids(&filter(&tours, &filters, None)), ["1"]);
    }

    #[test]
    fn group_size_uses_default_capacity() {
        let mut tours = scenario();
        tours[0].max_guests = Some(4);
        let filters = FilterState { group_size_max: 10, ..Default::default() };

        assert_eq!(ids(&filter(&tours, &filters, None)), ["2"]);

        let crowd = FilterState { group_size_max: 51, ..Default::default() };
        assert!(filter(&tours, &crowd, None).is_empty());
    }

    #[test]
    fn zero_duration_needs_widened_range() {
        let tours = vec![Tour { id: "open".into(), ..Default::default() }];
        assert!(filter(&tours, &FilterState::default(), None).is_empty());

        let widened = FilterState { duration_range: 0.0..=21.0, ..Default::default() };
        assert_eq!(ids(&filter(&tours, &widened, None)), ["open"]);
    }

    #[test]
    fn duration_comes_from_departures() {
        let tours = vec![Tour {
            id: "dated".into(),
            departure_options: vec![Departure {
                departure_date: Some("2024-03-01".into()),
                return_date: Some("2024-03-10".into()),
            }],
            ..Default::default()
        }];
        let short = FilterState { duration_range: 1.0..=7.0, ..Default::default() };

        assert!(filter(&tours, &short, None).is_empty());
        assert_eq!(ids(&filter(&tours, &FilterState::default(), None)), ["dated"]);
    }

    #[test]
    fn duration_and_alphabetical_sorts() {
        let mut tours = scenario();
        tours.push(Tour {
            id: "3".into(),
            name: "ancient Capital".into(),
            duration: Some(crate::finder::TourDuration::Days(1.0)),
            ..Default::default()
        });

        let by = |sort| ids(&filter(&tours, &FilterState { sort, ..Default::default() }, None));

        assert_eq!(by(SortKey::DurationShort), ["3", "1", "2"]);
        assert_eq!(by(SortKey::DurationLong), ["2", "1", "3"]);
        assert_eq!(by(SortKey::Alphabetical), ["3", "2", "1"]);
        assert_eq!(by(SortKey::Recommended), ["1", "2", "3"]);
    }

    #[test]
    fn counts_labels_over_whole_collection() {
        let mut tours = scenario();
        tours.push(Tour {
            id: "3".into(),
            category: vec!["Adventure".into(), "Adventure".into()],
            destination: Some("Sapa".into()),
            ..Default::default()
        });
        let counts = filter_counts(&tours);

        assert_eq!(counts.categories["Adventure"], 2);
        assert_eq!(counts.categories["Beach"], 1);
        assert_eq!(counts.destinations["Sapa"], 2);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut filters = FilterState { rating_min: 4.0, ..Default::default() };
        filters.toggle_category("Beach");
        assert!(filters.is_active());

        filters.reset();
        assert!(!filters.is_active());
        assert_eq!(filters, FilterState::default());
    }

    #[test]
    fn sort_names_agree_across_cli_display_and_serde() {
        let names: Vec<String> = SortKey::value_variants().iter().map(SortKey::to_string).collect();
        assert_eq!(names.len(), 8);
        assert!(names.contains(&"price-low".to_string()));

        for key in SortKey::value_variants() {
            let name = key.to_string();
            assert_eq!(SortKey::from_str(&name, false), Ok(*key));
            assert_eq!(serde_json::to_string(key).unwrap(), format!("\"{name}\""));
        }
    }

    #[test]
    fn toggling_twice_removes_category() {
        let mut filters = FilterState::default();
        filters.toggle_category("Beach");
        filters.toggle_category("Beach");
        assert!(filters.categories.is_empty());
    }

    fn arb_tours() -> impl Strategy<Value = Vec<Tour>> {
        prop::collection::vec((0u32..1000, 1u32..=21), 0..20).prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (price, days))| Tour {
                    id: i.to_string(),
                    name: format!("Tour {i}"),
                    price: price as f64,
                    duration: Some(crate::finder::TourDuration::Days(days as f64)),
                    ..Default::default()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn default_filters_keep_everything_in_order(tours in arb_tours()) {
            let kept = filter(&tours, &FilterState::default(), None);
            prop_assert_eq!(kept.len(), tours.len());
            prop_assert!(kept.iter().zip(&tours).all(|(kept, tour)| kept.id == tour.id));
        }

        #[test]
        fn price_bounds_are_inclusive(tours in arb_tours(), lo in 0u32..1000, span in 0u32..1000) {
            let (lo, hi) = (lo as f64, (lo + span) as f64);
            let filters = FilterState { price_range: lo..=hi, ..Default::default() };
            let kept = filter(&tours, &filters, None);

            let expected = tours.iter().filter(|tour| tour.price >= lo && tour.price <= hi).count();
            prop_assert_eq!(kept.len(), expected);
        }

        #[test]
        fn price_sorts_are_mirrored(prices in prop::collection::btree_set(0u32..10_000, 0..20)) {
            let tours: Vec<Tour> = prices.iter()
                .rev()
                .enumerate()
                .map(|(i, price)| Tour {
                    id: i.to_string(),
                    price: *price as f64,
                    duration: Some(crate::finder::TourDuration::Days(2.0)),
                    ..Default::default()
                })
                .collect();

            let low = ids(&filter(&tours, &FilterState { sort: SortKey::PriceLow, ..Default::default() }, None));
            let mut high = ids(&filter(&tours, &FilterState { sort: SortKey::PriceHigh, ..Default::default() }, None));
            high.reverse();

            prop_assert_eq!(low, high);
        }

        #[test]
        fn missed_queries_ignore_other_filters(tours in arb_tours(), query in "[a-z]{1,8}") {
            let filters = FilterState { query, ..Default::default() };
            prop_assert!(filter(&tours, &filters, Some(&[])).is_empty());
        }
    }
}
