use std::time::{Duration, Instant};

use log::debug;

use crate::finder::SearchHit;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// What a settled query produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub query: String,
    pub outcome: SearchOutcome,
    /// Increases with every matcher invocation.
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// No query.
    Idle,

    /// Waiting for input to settle. The last resolved search stays
    /// available so the list does not flash empty while typing.
    Pending {
        query: String,
        due: Instant,
        previous: Option<Resolved>,
    },

    Resolved(Resolved),
}

/// Debounces free-text input before it reaches the matcher.
///
/// Time is passed in explicitly; the caller polls from its event loop.
pub struct DebouncedSearch {
    delay: Duration,
    state: SearchState,
    generation: u64,
    last_search_time: Option<Duration>,
}

impl Default for DebouncedSearch {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl DebouncedSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: SearchState::Idle,
            generation: 0,
            last_search_time: None,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    pub fn last_search_time(&self) -> Option<Duration> {
        self.last_search_time
    }

    /// The newest search result, even while a newer query is pending.
    pub fn current(&self) -> Option<&Resolved> {
        match &self.state {
            SearchState::Idle => None,
            SearchState::Pending { previous, .. } => previous.as_ref(),
            SearchState::Resolved(resolved) => Some(resolved),
        }
    }

    /// Feeds the latest input. Each change restarts the quiet period.
    pub fn input(&mut self, query: &str, now: Instant) {
        let query = query.trim();

        if query.is_empty() {
            if self.state != SearchState::Idle {
                // results for the old query must not come back
                self.generation += 1;
                self.state = SearchState::Idle;
            }
            return;
        }

        let previous = match std::mem::replace(&mut self.state, SearchState::Idle) {
            SearchState::Idle => None,

            SearchState::Resolved(resolved) if resolved.query == query => {
                self.state = SearchState::Resolved(resolved);
                return;
            }

            SearchState::Resolved(resolved) => Some(resolved),

            SearchState::Pending { query: pending, due, previous } if pending == query => {
                self.state = SearchState::Pending { query: pending, due, previous };
                return;
            }

            SearchState::Pending { previous, .. } => previous,
        };

        self.state = SearchState::Pending {
            query: query.to_string(),
            due: now + self.delay,
            previous,
        };
    }

    /// Time left until the pending query is due, if one is pending.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        match &self.state {
            SearchState::Pending { due, .. } => Some(due.saturating_duration_since(now)),
            _ => None,
        }
    }

    /// Runs `search` if the pending query has settled. Returns true if it ran.
    pub fn poll<F>(&mut self, now: Instant, search: F) -> bool
        where F: FnOnce(&str) -> SearchOutcome,
    {
        let settled = matches!(&self.state, SearchState::Pending { due, .. } if now >= *due);
        settled && self.resolve(search)
    }

    /// Runs a pending search right away, e.g. when the user submits.
    pub fn flush<F>(&mut self, search: F) -> bool
        where F: FnOnce(&str) -> SearchOutcome,
    {
        self.resolve(search)
    }

    /// Drops a pending search without running it.
    pub fn cancel(&mut self) {
        if let SearchState::Pending { previous, .. } = std::mem::replace(&mut self.state, SearchState::Idle) {
            self.generation += 1;
            self.state = previous.map_or(SearchState::Idle, SearchState::Resolved);
        }
    }

    fn resolve<F>(&mut self, search: F) -> bool
        where F: FnOnce(&str) -> SearchOutcome,
    {
        let query = match &self.state {
            SearchState::Pending { query, .. } => query.clone(),
            _ => return false,
        };

        let started = Instant::now();
        let outcome = search(&query);
        let elapsed = started.elapsed();

        self.generation += 1;
        self.last_search_time = Some(elapsed);

        debug!(
            "search {:?} matched {} tours in {:?}",
            query,
            outcome.hits.len(),
            elapsed,
        );

        self.state = SearchState::Resolved(Resolved {
            query,
            outcome,
            generation: self.generation,
        });

        true
    }
}
