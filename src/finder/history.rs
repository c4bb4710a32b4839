use log::warn;

use crate::finder::{KeyValueStore, Result};

pub const HISTORY_KEY: &str = "travel-booking-search-history";
pub const LANGUAGE_KEY: &str = "travel-booking-language";
pub const HISTORY_LIMIT: usize = 10;
pub const DEFAULT_LANGUAGE: &str = "en";
pub const LANGUAGES: [&str; 2] = ["en", "vi"];

/// Recently accepted queries, most recent first and without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchHistory {
    entries: Vec<String>,
}

impl SearchHistory {
    /// Loads the persisted history; unreadable values start a fresh one.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let raw = match store.get(HISTORY_KEY) {
            Ok(raw) => raw,
            Err(err) => {
                warn!("failed to read search history: {err}");
                None
            }
        };

        let mut entries: Vec<String> = raw
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(err) => {
                    warn!("ignoring malformed search history: {err}");
                    None
                }
            })
            .unwrap_or_default();

        entries.truncate(HISTORY_LIMIT);
        Self { entries }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Moves `query` to the front. Blank queries are ignored.
    pub fn add(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }

        self.entries.retain(|entry| entry != query);
        self.entries.insert(0, query.to_string());
        self.entries.truncate(HISTORY_LIMIT);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(HISTORY_KEY, &serde_json::to_string(&self.entries)?)
    }
}

/// User preferences backed by a key-value store.
pub struct Preferences {
    store: Box<dyn KeyValueStore>,
    history: SearchHistory,
}

impl Preferences {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        let history = SearchHistory::load(store.as_ref());
        Self { store, history }
    }

    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    /// Records an accepted search and persists the history right away.
    pub fn record_search(&mut self, query: &str) {
        if self.history.add(query) {
            if let Err(err) = self.history.save(self.store.as_mut()) {
                warn!("failed to persist search history: {err}");
            }
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        if let Err(err) = self.store.remove(HISTORY_KEY) {
            warn!("failed to clear search history: {err}");
        }
    }

    pub fn language(&self) -> String {
        match self.store.get(LANGUAGE_KEY) {
            Ok(Some(language)) if !language.trim().is_empty() => language,
            Ok(_) => DEFAULT_LANGUAGE.to_string(),
            Err(err) => {
                warn!("failed to read language preference: {err}");
                DEFAULT_LANGUAGE.to_string()
            }
        }
    }

    pub fn set_language(&mut self, language: &str) -> Result<()> {
        self.store.set(LANGUAGE_KEY, language.trim())
    }
}
