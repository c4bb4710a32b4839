pub use fuzzy::FuzzyMatcher;
pub use simple::SimpleMatcher;
pub use typo::TypoMatcher;

mod fuzzy;
mod simple;
mod typo;

/// Matches a query against short labels such as category or destination names.
pub trait LabelMatcher: Send + Sync {
    /// Applies the query against the labels and returns the matching ones.
    /// The resulting list should be ordered by match score
    /// with the best match in the first place.
    fn matches<'a>(&self, query: &str, labels: &[&'a str]) -> Vec<&'a str>;
}

/// Selects the label matcher used for suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LabelMatching {
    /// Every query word must occur in the label.
    #[default]
    Substring,
    /// Skim style subsequence matching.
    Skim,
    /// Edit distance matching with the search threshold.
    Typo,
}

impl LabelMatching {
    pub fn build(self, threshold: f64) -> Box<dyn LabelMatcher> {
        match self {
            LabelMatching::Substring => Box::new(SimpleMatcher),
            LabelMatching::Skim => Box::new(FuzzyMatcher::skim()),
            LabelMatching::Typo => Box::new(TypoMatcher::new(threshold)),
        }
    }
}
