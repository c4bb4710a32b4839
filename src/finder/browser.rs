use std::time::{Duration, Instant};

use log::debug;

use crate::finder::{
    filter_counts, filter_positions, DebouncedSearch, FilterCounts, FilterState, LabelMatching,
    Preferences, SearchEngine, SearchOptions, SearchOutcome, SearchState, Tour,
};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub search: SearchOptions,
    pub labels: LabelMatching,
    pub debounce: Duration,
    /// Most fuzzy hits considered per query.
    pub hit_limit: usize,
    pub suggestion_limit: usize,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            search: SearchOptions::default(),
            labels: LabelMatching::default(),
            debounce: crate::finder::DEFAULT_DEBOUNCE,
            hit_limit: 100,
            suggestion_limit: 8,
        }
    }
}

/// Wall clock measurements of the last search and filter runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerfMetrics {
    pub last_search_time: Option<Duration>,
    pub last_filter_time: Option<Duration>,
    pub total_count: usize,
    pub filtered_count: usize,
}

struct Memo {
    filters: FilterState,
    generation: u64,
    revision: u64,
    positions: Vec<usize>,
}

/// One browsing session over a tour collection.
pub struct TourBrowser {
    options: BrowserOptions,
    tours: Vec<Tour>,
    revision: u64,
    engine: SearchEngine,
    counts: FilterCounts,
    filters: FilterState,
    typed: String,
    search: DebouncedSearch,
    prefs: Preferences,
    memo: Option<Memo>,
    metrics: PerfMetrics,
}

impl TourBrowser {
    pub fn new(options: BrowserOptions, prefs: Preferences) -> Self {
        let engine = build_engine(&[], &options);

        Self {
            search: DebouncedSearch::new(options.debounce),
            options,
            tours: Vec::new(),
            revision: 0,
            engine,
            counts: FilterCounts::default(),
            filters: FilterState::default(),
            typed: String::new(),
            prefs,
            memo: None,
            metrics: PerfMetrics::default(),
        }
    }

    /// Replaces the collection and rebuilds everything derived from it.
    pub fn set_tours(&mut self, tours: Vec<Tour>) {
        let started = Instant::now();

        self.engine = build_engine(&tours, &self.options);
        self.counts = filter_counts(&tours);
        self.tours = tours;
        self.revision += 1;
        self.memo = None;

        debug!("indexed {} tours in {:?}", self.tours.len(), started.elapsed());

        // the current query must be matched against the new collection
        self.search = DebouncedSearch::new(self.options.debounce);
        if !self.typed.trim().is_empty() {
            self.search.input(&self.typed, Instant::now());
            self.run_pending_now();
        }
    }

    pub fn tours(&self) -> &[Tour] {
        &self.tours
    }

    pub fn counts(&self) -> &FilterCounts {
        &self.counts
    }

    pub fn search_state(&self) -> &SearchState {
        self.search.state()
    }

    /// Filter changes are picked up by the next call to [`TourBrowser::results`].
    pub fn filters_mut(&mut self) -> &mut FilterState {
        &mut self.filters
    }

    pub fn reset_filters(&mut self) {
        self.filters.reset();
        self.type_query("", Instant::now());
    }

    pub fn type_query(&mut self, query: &str, now: Instant) {
        self.typed = query.to_string();
        self.search.input(query, now);
    }

    /// Runs the matcher once the typed query has settled.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Self { search, engine, options, .. } = self;
        search.poll(now, |query| run_search(engine, options, query))
    }

    /// Time until [`TourBrowser::poll`] has work to do.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.search.time_until_due(now)
    }

    /// Settles the typed query immediately and remembers it.
    pub fn submit(&mut self) {
        self.run_pending_now();
        let typed = self.typed.clone();
        self.prefs.record_search(&typed);
    }

    /// Marks a result as chosen, recording the query that led to it.
    pub fn select(&mut self, position: usize) -> Option<&Tour> {
        let query = self.search.current().map(|resolved| resolved.query.clone());
        if let Some(query) = query {
            self.prefs.record_search(&query);
        }
        self.tours.get(position)
    }

    /// Chooses the tour shown at `row` of the current list.
    ///
    /// A query still waiting in the debouncer did not produce that list, so
    /// it is neither run nor recorded. With nothing at `row` the typed query
    /// is submitted instead.
    pub fn choose(&mut self, row: usize) -> Option<&Tour> {
        match self.results().get(row).copied() {
            Some(position) => self.select(position),
            None => {
                self.submit();
                None
            }
        }
    }

    /// Drops a query still waiting in the debouncer, e.g. on shutdown.
    pub fn cancel_pending(&mut self) {
        self.search.cancel();
    }

    pub fn suggestions(&self) -> &[String] {
        self.search
            .current()
            .map(|resolved| resolved.outcome.suggestions.as_slice())
            .unwrap_or_default()
    }

    pub fn history(&self) -> &[String] {
        self.prefs.history()
    }

    pub fn clear_history(&mut self) {
        self.prefs.clear_history();
    }

    pub fn preferences(&mut self) -> &mut Preferences {
        &mut self.prefs
    }

    pub fn metrics(&self) -> PerfMetrics {
        self.metrics
    }

    /// Positions of the visible tours, recomputed only when the filters,
    /// the settled search or the collection changed.
    pub fn results(&mut self) -> &[usize] {
        let mut effective = self.filters.clone();
        effective.query = self.search
            .current()
            .map(|resolved| resolved.query.clone())
            .unwrap_or_default();

        let generation = self.search.current().map_or(0, |resolved| resolved.generation);

        let fresh = self.memo.as_ref().is_some_and(|memo| {
            memo.generation == generation && memo.revision == self.revision && memo.filters == effective
        });

        if !fresh {
            let hits = self.search.current().map(|resolved| resolved.outcome.hits.as_slice());

            let started = Instant::now();
            let positions = filter_positions(&self.tours, &effective, hits);
            let elapsed = started.elapsed();

            debug!("filtered {} of {} tours in {:?}", positions.len(), self.tours.len(), elapsed);

            self.metrics = PerfMetrics {
                last_search_time: self.search.last_search_time(),
                last_filter_time: Some(elapsed),
                total_count: self.tours.len(),
                filtered_count: positions.len(),
            };

            self.memo = Some(Memo {
                filters: effective,
                generation,
                revision: self.revision,
                positions,
            });
        }

        self.memo.as_ref().map(|memo| memo.positions.as_slice()).unwrap_or_default()
    }

    pub fn visible(&mut self) -> Vec<&Tour> {
        self.results();

        let positions = self.memo.as_ref().map(|memo| memo.positions.as_slice()).unwrap_or_default();
        positions.iter().map(|&position| &self.tours[position]).collect()
    }

    fn run_pending_now(&mut self) {
        let Self { search, engine, options, .. } = self;
        search.flush(|query| run_search(engine, options, query));
    }
}

fn build_engine(tours: &[Tour], options: &BrowserOptions) -> SearchEngine {
    SearchEngine::new(tours, options.search.clone())
        .with_label_matcher(options.labels.build(options.search.threshold))
}

fn run_search(engine: &SearchEngine, options: &BrowserOptions, query: &str) -> SearchOutcome {
    SearchOutcome {
        hits: engine.search(query, options.hit_limit),
        suggestions: engine.suggestions(query, options.suggestion_limit),
    }
}
