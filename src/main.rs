use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread::spawn;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use eframe::{App, AppCreator, CreationContext, egui};
use eframe::egui::{Color32, Key, Label, Widget};
use itertools::Itertools;
use log::{info, warn};

use crate::egui::{Context, RichText, Slider, Spinner, TextEdit, Visuals};
use crate::finder::{
    default_cache_path, BrowserOptions, CachedSource, JsonFileStore, KeyValueStore, LabelMatching,
    MemoryStore, Preferences, RemoteSuggestions, SearchOptions, SearchState, SortKey, SuggestionApi,
    SuggestionSource, Tour, TourBrowser, TourSource, ToursApi, LANGUAGES,
};

mod finder;

#[derive(Parser, Debug)]
#[command(name = "tourfinder", about = "Search and filter the tours of a booking backend")]
struct Args {
    /// Base URL of the booking backend.
    #[arg(long, env = "TOURFINDER_API", default_value = "http://localhost:5000")]
    api: String,

    /// Base URL of the booking site, used to open tour pages.
    #[arg(long, env = "TOURFINDER_SITE", default_value = "http://localhost:3000")]
    site: String,

    /// Quiet period before a typed query is searched.
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,

    /// Highest normalized edit distance that still counts as a match.
    #[arg(long, default_value_t = 0.4)]
    threshold: f64,

    #[arg(long, value_enum, default_value_t = LabelMatching::Substring)]
    labels: LabelMatching,

    #[arg(long, value_enum, default_value_t = SortKey::Recommended)]
    sort: SortKey,

    /// Ask the backend for suggestions instead of computing them locally.
    #[arg(long)]
    remote_suggestions: bool,

    /// Do not read or write the local tour cache.
    #[arg(long)]
    no_cache: bool,

    /// Where search history and preferences are kept.
    #[arg(long, env = "TOURFINDER_STORAGE")]
    storage: Option<PathBuf>,
}

struct FinderApp {
    query: String,
    selected: usize,
    language: String,
    site: String,
    loading: bool,
    incoming: Arc<Mutex<Option<Vec<Tour>>>>,
    source: Arc<dyn TourSource>,
    browser: TourBrowser,
    remote: Option<RemoteSuggestions>,
}

impl FinderApp {
    pub fn new(source: Arc<dyn TourSource>, mut browser: TourBrowser, site: String) -> Self {
        Self {
            query: String::new(),
            selected: 0,
            language: browser.preferences().language(),
            site,
            loading: true,
            incoming: Arc::new(Mutex::new(None)),
            source,
            browser,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteSuggestions) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn launch(&self, tour: &Tour) {
        let url = format!("{}/tours/{}", self.site.trim_end_matches('/'), tour.id);

        if let Err(err) = Command::new("xdg-open").arg(&url).spawn() {
            warn!("failed to open {url}: {err}");
        }
    }

    fn receive_tours(&mut self) {
        if !self.loading {
            return;
        }

        let tours = match self.incoming.lock() {
            Ok(mut incoming) => incoming.take(),
            Err(_) => return,
        };

        if let Some(tours) = tours {
            self.browser.set_tours(tours);
            self.loading = false;
        }
    }

    fn set_query(&mut self, query: String) {
        self.query = query;
        self.browser.type_query(&self.query, Instant::now());

        // answers for the old text must not replace the history chips
        if self.query.trim().is_empty() {
            if let Some(remote) = self.remote.as_mut() {
                remote.request("");
            }
        }
    }

    /// Chips under the query box: history while it is blank, suggestions otherwise.
    fn chips(&self) -> Vec<String> {
        if self.query.trim().is_empty() {
            return self.browser.history().to_vec();
        }

        match &self.remote {
            Some(remote) => remote.current().to_vec(),
            None => self.browser.suggestions().to_vec(),
        }
    }

    fn set_language(&mut self, language: &str) {
        if let Err(err) = self.browser.preferences().set_language(language) {
            warn!("failed to store language preference: {err}");
        }
        self.language = language.to_string();
    }

    fn close(&mut self, ctx: &Context) {
        self.browser.cancel_pending();
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn handle_events(&mut self, ctx: &Context) {
        let (escape, enter, up, down) = ctx.input(|input| (
            input.key_pressed(Key::Escape),
            input.key_pressed(Key::Enter),
            input.key_pressed(Key::ArrowUp),
            input.key_pressed(Key::ArrowDown),
        ));

        if escape {
            self.close(ctx);
            return;
        }

        let now = Instant::now();
        if self.browser.poll(now) {
            self.selected = 0;
            if let Some(remote) = self.remote.as_mut() {
                remote.request(&self.query);
            }
        }

        if let Some(remote) = self.remote.as_mut() {
            remote.poll();
            if remote.in_flight() > 0 {
                ctx.request_repaint_after(Duration::from_millis(50));
            }
        }

        if let Some(wait) = self.browser.time_until_due(now) {
            ctx.request_repaint_after(wait);
        }

        let count = self.browser.results().len();
        self.selected = self.selected.min(count.saturating_sub(1));
        if count > 0 {
            let steps = i32::from(down) - i32::from(up);
            self.selected = (self.selected as i32 + steps).rem_euclid(count as _) as _;
        }

        if enter && !self.loading {
            // the highlighted row, not whatever a pending query would show
            if let Some(tour) = self.browser.choose(self.selected).cloned() {
                info!("opening tour {} ({})", tour.id, tour.display_name());
                self.launch(&tour);
                self.close(ctx);
            } else {
                self.selected = 0;
            }
        }
    }

    fn paint_query(&mut self, ui: &mut egui::Ui) {
        let mut query = self.query.clone();
        let response = TextEdit::singleline(&mut query)
            .hint_text("search tours")
            .desired_width(f32::INFINITY)
            .text_color(Color32::GOLD)
            .ui(ui);
        response.request_focus();

        if response.changed() {
            self.set_query(query);
        }

        let chips = self.chips();
        let showing_history = self.query.trim().is_empty() && !chips.is_empty();

        let mut picked = None;
        let mut clear = false;
        ui.horizontal_wrapped(|ui| {
            for chip in &chips {
                if ui.small_button(chip.as_str()).clicked() {
                    picked = Some(chip.clone());
                }
            }

            if showing_history && ui.small_button(RichText::new("clear").color(Color32::GRAY)).clicked() {
                clear = true;
            }
        });

        if clear {
            self.browser.clear_history();
        }

        if let Some(picked) = picked {
            self.set_query(picked);
            self.browser.submit();
        }
    }

    fn paint_filters(&mut self, ui: &mut egui::Ui) {
        let max_price = self.browser.tours()
            .iter()
            .map(|tour| tour.price)
            .fold(0.0, f64::max)
            .max(1.0);

        let categories = self.browser.counts()
            .categories
            .iter()
            .map(|(label, count)| (label.clone(), *count))
            .collect_vec();

        let mut language = self.language.clone();
        egui::ComboBox::from_label("language")
            .selected_text(language.as_str())
            .show_ui(ui, |ui| {
                for option in LANGUAGES {
                    ui.selectable_value(&mut language, option.to_string(), option);
                }
            });

        if language != self.language {
            self.set_language(&language);
        }

        let typed = !self.query.trim().is_empty();
        let filters = self.browser.filters_mut();
        let active = typed || filters.is_active();

        egui::ComboBox::from_label("sort")
            .selected_text(filters.sort.to_string())
            .show_ui(ui, |ui| {
                for &key in SortKey::value_variants() {
                    ui.selectable_value(&mut filters.sort, key, key.to_string());
                }
            });

        ui.separator();
        range_sliders(ui, "price", &mut filters.price_range, 0.0..=max_price);
        range_sliders(ui, "days", &mut filters.duration_range, 0.0..=30.0);
        Slider::new(&mut filters.rating_min, 0.0..=5.0).step_by(0.5).text("min rating").ui(ui);
        Slider::new(&mut filters.group_size_max, 1..=50).text("guests").ui(ui);

        ui.separator();
        for (label, count) in &categories {
            let mut checked = filters.categories.contains(label);
            if ui.checkbox(&mut checked, format!("{label} ({count})")).changed() {
                filters.toggle_category(label);
            }
        }

        ui.separator();
        if ui.add_enabled(active, egui::Button::new("reset")).clicked() {
            self.set_query(String::new());
            self.browser.reset_filters();
        }
    }

    fn paint_results(&mut self, ui: &mut egui::Ui) {
        let rows = (ui.available_height() / 28.0).floor() as usize;
        let selected = self.selected;

        let visible = self.browser.visible();
        let items_count = visible.len();

        if items_count == 0 {
            ui.label(RichText::new("no tours").color(Color32::GRAY));
            return;
        }

        let items_iter = visible.into_iter()
            .enumerate()
            .skip(selected.saturating_sub(rows / 2).min(items_count.saturating_sub(rows)))
            .take(rows.max(1));

        for (idx, tour) in items_iter {
            let color = if selected == idx { Color32::WHITE } else { Color32::GRAY };

            let line = format!(
                "{:<40} {:<24} {:>8.0} {:>3}d {}",
                tour.display_name(),
                tour.destination_label().unwrap_or_default(),
                tour.price,
                tour.duration_days(),
                tour.rating.map(|rating| format!("{rating:.1}*")).unwrap_or_default(),
            );

            ui.horizontal(|ui| {
                ui.set_height(24.0);
                Label::new(RichText::new(line).color(color)).ui(ui);
            });
        }
    }

    fn paint(&mut self, ctx: &Context) {
        egui::TopBottomPanel::top("query").show(ctx, |ui| {
            ui.add_space(4.0);
            self.paint_query(ui);
            ui.add_space(4.0);
        });

        let metrics = self.browser.metrics();
        let typing = matches!(self.browser.search_state(), SearchState::Pending { .. });
        egui::TopBottomPanel::bottom("metrics").show(ctx, |ui| {
            ui.label(RichText::new(format!(
                "{}/{} tours | filter {:?} | search {:?}{}",
                metrics.filtered_count,
                metrics.total_count,
                metrics.last_filter_time.unwrap_or_default(),
                metrics.last_search_time.unwrap_or_default(),
                if typing { " | typing..." } else { "" },
            )).small().color(Color32::DARK_GRAY));
        });

        egui::SidePanel::left("filters").resizable(false).show(ctx, |ui| {
            self.paint_filters(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            // make it all monospaced
            ui.style_mut().override_text_style = Some(egui::TextStyle::Monospace);

            // and let no text wrap
            ui.style_mut().wrap = Some(false);

            if self.loading {
                ui.centered_and_justified(|ui| {
                    ui.add(Spinner::new().size(32.0));
                });
            } else {
                self.paint_results(ui);
            }
        });
    }
}

impl App for FinderApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.receive_tours();
        self.handle_events(ctx);
        self.paint(ctx);
    }
}

fn range_sliders(ui: &mut egui::Ui, label: &str, range: &mut RangeInclusive<f64>, bounds: RangeInclusive<f64>) {
    let (min, max) = (*bounds.start(), *bounds.end());
    let mut lo = range.start().clamp(min, max);
    let mut hi = range.end().clamp(min, max);

    let mut changed = Slider::new(&mut lo, bounds.clone()).text(format!("min {label}")).ui(ui).changed();
    changed |= Slider::new(&mut hi, bounds).text(format!("max {label}")).ui(ui).changed();

    if changed {
        *range = lo.min(hi)..=hi.max(lo);
    }
}

fn create_app(cc: &CreationContext<'_>, app: FinderApp) -> Box<dyn App> {
    cc.egui_ctx.set_visuals(Visuals::dark());

    let ctx = cc.egui_ctx.clone();
    let incoming = Arc::clone(&app.incoming);
    let source = Arc::clone(&app.source);

    spawn(move || {
        let tours = load_tours(source.as_ref());

        if let Ok(mut incoming) = incoming.lock() {
            *incoming = Some(tours);
        }

        ctx.request_repaint();
    });

    Box::new(app)
}

/// A failed load shows an empty list rather than an error.
fn load_tours(source: &dyn TourSource) -> Vec<Tour> {
    match source.load() {
        Ok(tours) => tours,
        Err(err) => {
            warn!("failed to load tours from {}: {err}", source.title());
            Vec::new()
        }
    }
}

fn open_store(path: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    let Some(path) = path.or_else(JsonFileStore::default_path) else {
        return Box::new(MemoryStore::default());
    };

    match JsonFileStore::open(&path) {
        Ok(store) => {
            info!("keeping preferences in {:?}", store.path());
            Box::new(store)
        }
        Err(err) => {
            warn!("cannot use storage {:?}, keeping preferences in memory: {err}", path);
            Box::new(MemoryStore::default())
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let api = ToursApi::new(&args.api);
    let source: Arc<dyn TourSource> = match default_cache_path() {
        Some(path) if !args.no_cache => Arc::new(CachedSource::new(api, path)),
        _ => Arc::new(api),
    };

    let options = BrowserOptions {
        search: SearchOptions {
            threshold: args.threshold,
            ..Default::default()
        },
        labels: args.labels,
        debounce: Duration::from_millis(args.debounce_ms),
        ..Default::default()
    };

    let prefs = Preferences::new(open_store(args.storage));

    let mut browser = TourBrowser::new(options, prefs);
    browser.filters_mut().sort = args.sort;

    let mut app = FinderApp::new(source, browser, args.site);
    if args.remote_suggestions {
        let source: Arc<dyn SuggestionSource> = Arc::new(SuggestionApi::new(&args.api));
        app = app.with_remote(RemoteSuggestions::new(source, 8));
    }

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 640.0])
            .with_decorations(false)
            .with_resizable(false),
        ..Default::default()
    };

    let app_creator: AppCreator = Box::new(|ctx| create_app(ctx, app));
    eframe::run_native("tourfinder", native_options, app_creator)
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;

    Ok(())
}
