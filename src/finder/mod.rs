pub use browser::*;
pub use debounce::*;
pub use error::{Error, Result};
pub use filter::*;
pub use history::*;
pub use index::*;
pub use matchers::*;
pub use providers::*;
pub use search::*;
pub use store::*;
pub use tour::*;

mod browser;
mod debounce;
mod error;
mod filter;
mod history;
mod index;
mod matchers;
mod providers;
mod search;
mod store;
mod tour;
