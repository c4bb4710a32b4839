use itertools::Itertools;

use crate::finder::LabelMatcher;

/// Smallest number of single-character edits that turn `needle` into some
/// substring of `haystack`.
fn substring_distance(needle: &[char], haystack: &[char]) -> usize {
    let n = needle.len();
    if n == 0 {
        return 0;
    }

    // row i holds the cost of matching the first i needle chars
    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0; n + 1];
    let mut best = n;

    for &h in haystack {
        curr[0] = 0;
        for i in 1..=n {
            let cost = if needle[i - 1] == h { 0 } else { 1 };
            curr[i] = (prev[i] + 1)
                .min(curr[i - 1] + 1)
                .min(prev[i - 1] + cost);
        }
        best = best.min(curr[n]);
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}

/// Typo tolerant matching: a text matches when the query, allowing for
/// edits, occurs somewhere in it.
///
/// Distances are normalized to `0.0..=1.0` by the query length; zero is
/// an exact occurrence.
#[derive(Debug, Clone, Copy)]
pub struct TypoMatcher {
    threshold: f64,
}

impl TypoMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold: threshold.clamp(0.0, 1.0) }
    }

    /// Normalized distance of `query` within `text`, or `None` if it exceeds
    /// the threshold. Both sides must already be lowercased.
    pub fn distance(&self, query: &[char], text: &[char]) -> Option<f64> {
        if query.is_empty() || text.is_empty() {
            return None;
        }

        let distance = substring_distance(query, text) as f64 / query.len() as f64;

        (distance <= self.threshold).then_some(distance)
    }
}

impl LabelMatcher for TypoMatcher {
    fn matches<'a>(&self, query: &str, labels: &[&'a str]) -> Vec<&'a str> {
        let query = query.trim().to_lowercase().chars().collect_vec();

        labels.iter()
            .flat_map(|label| {
                let text = label.to_lowercase().chars().collect_vec();
                self.distance(&query, &text).map(|distance| (distance, *label))
            })
            .sorted_by(|(lhs, _), (rhs, _)| lhs.total_cmp(rhs))
            .map(|(_distance, label)| label)
            .collect()
    }
}
