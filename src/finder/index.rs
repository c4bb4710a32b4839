use std::collections::{BTreeMap, BTreeSet};

use crate::finder::Tour;

pub type Postings = BTreeMap<String, BTreeSet<usize>>;

/// Lookup tables from normalized labels to positions in the tour collection.
///
/// The index is immutable; a changed collection needs a fresh `build`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TourIndex {
    categories: Postings,
    destinations: Postings,
}

impl TourIndex {
    pub fn build(tours: &[Tour]) -> Self {
        let mut index = TourIndex::default();

        for (position, tour) in tours.iter().enumerate() {
            for label in tour.category_labels() {
                index.categories
                    .entry(label.to_string())
                    .or_default()
                    .insert(position);
            }

            if let Some(destination) = tour.destination_label() {
                index.destinations
                    .entry(destination)
                    .or_default()
                    .insert(position);
            }
        }

        index
    }

    pub fn categories(&self) -> &Postings {
        &self.categories
    }

    pub fn destinations(&self) -> &Postings {
        &self.destinations
    }
}
