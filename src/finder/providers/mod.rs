pub use api::ToursApi;
pub use cache::{default_cache_path, CachedSource};
pub use suggestions::{RemoteSuggestions, SuggestionApi, SuggestionSource};

use crate::finder::{Result, Tour};

mod api;
mod cache;
mod suggestions;

pub trait TourSource: Send + Sync {
    fn title(&self) -> String {
        "Unknown".into()
    }

    /// Loads all tours that this source can provide.
    fn load(&self) -> Result<Vec<Tour>>;
}
