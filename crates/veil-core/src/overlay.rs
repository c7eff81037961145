//! The overlay instance
//!
//! [`Overlay`] owns the settings, the settings store and the scheduler for one
//! script variant. It is created explicitly, fed host events, ticked with the
//! current time, and disposed when the page is done with it.

use crate::extract::{collect_candidates, AriaLabelExtractor, Extractor, HeadingMetaExtractor, PageExtractor};
use crate::render::{self, render, RenderOptions, DEFAULT_MARKER_CLASS};
use crate::scheduler::{Schedule, Scheduler, SchedulerConfig, Trigger};
use crate::settings::{Settings, SettingsStore, StorageBackend};
use crate::status::StatusReport;
use crate::tree::{is_structural, CandidateShape, ChangeFeed, Tree};
use crate::types::{Features, FilterKind, HostSignal, KindMask};

/// Follow-up recheck delay used when `Features::RECHECK` is on and no delay
/// is configured.
pub const DEFAULT_RECHECK_MS: u64 = 1000;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Prefix of every storage key
    pub namespace: String,
    /// Shape of a candidate container
    pub shape: CandidateShape,
    pub marker_class: String,
    pub kinds: KindMask,
    pub features: Features,
    /// Pattern list quick-add controls append to
    pub quick_add_kind: FilterKind,
    pub scheduler: SchedulerConfig,
}

impl OverlayConfig {
    pub fn new(namespace: &str, shape: CandidateShape, kinds: KindMask) -> Self {
        Self {
            namespace: namespace.to_string(),
            shape,
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            kinds,
            features: Features::empty(),
            quick_add_kind: FilterKind::Title,
            scheduler: SchedulerConfig::default(),
        }
    }

    pub fn with_quick_add(mut self, kind: FilterKind) -> Self {
        self.features |= Features::QUICK_ADD;
        self.quick_add_kind = kind;
        self
    }

    pub fn with_recheck(mut self, delay_ms: u64) -> Self {
        self.features |= Features::RECHECK;
        self.scheduler.recheck_ms = Some(delay_ms);
        self
    }

    pub fn with_marker_class(mut self, class: &str) -> Self {
        self.marker_class = class.to_string();
        self
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            marker_class: self.marker_class.clone(),
            kinds: self.kinds,
            quick_add: self
                .features
                .contains(Features::QUICK_ADD)
                .then_some(self.quick_add_kind),
        }
    }

    fn scheduler_config(&self) -> SchedulerConfig {
        let mut config = self.scheduler;
        config.recheck_ms = if self.features.contains(Features::RECHECK) {
            Some(config.recheck_ms.unwrap_or(DEFAULT_RECHECK_MS))
        } else {
            None
        };
        config
    }
}

/// Ready-made variants of the filtering scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Hide grid items by exact title, with quick-add controls
    TitleFilter,
    /// Hide search results by title prefix or channel
    SearchFilter,
}

impl Preset {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "title-filter" | "joyn" => Some(Self::TitleFilter),
            "search" | "search-filter" | "sv" => Some(Self::SearchFilter),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::TitleFilter => "title-filter",
            Self::SearchFilter => "search-filter",
        }
    }

    pub fn config(self) -> OverlayConfig {
        match self {
            Self::TitleFilter => OverlayConfig::new(
                "joyn_filter",
                CandidateShape::tag("li").with_class("Grid_GridItem__dE_ip"),
                KindMask::TITLE,
            )
            .with_marker_class("joyn-filter-hidden")
            .with_quick_add(FilterKind::Title),
            Self::SearchFilter => OverlayConfig::new(
                "sv_filter",
                CandidateShape::any().with_attr("data-test", "search-result"),
                KindMask::PREFIX | KindMask::CHANNEL,
            )
            .with_marker_class("sv-filter-hidden"),
        }
    }

    pub fn extractor(self) -> PageExtractor {
        match self {
            Self::TitleFilter => PageExtractor::AriaLabel(AriaLabelExtractor::new(
                CandidateShape::tag("a").with_attr_prefix("data-testid", "LL--"),
            )),
            Self::SearchFilter => PageExtractor::HeadingMeta(HeadingMetaExtractor::default()),
        }
    }
}

// =============================================================================
// Overlay
// =============================================================================

pub struct Overlay<B, E = PageExtractor> {
    config: OverlayConfig,
    options: RenderOptions,
    extractor: E,
    store: SettingsStore<B>,
    settings: Settings,
    scheduler: Scheduler,
    status: Option<StatusReport>,
    last_hidden: usize,
}

impl<B: StorageBackend> Overlay<B, PageExtractor> {
    /// Create an overlay for one of the presets.
    pub fn from_preset(preset: Preset, backend: B, now: u64) -> Self {
        Self::create(preset.config(), preset.extractor(), backend, now)
    }
}

impl<B: StorageBackend, E: Extractor> Overlay<B, E> {
    /// Load settings and arm the initial pass.
    pub fn create(config: OverlayConfig, extractor: E, backend: B, now: u64) -> Self {
        let store = SettingsStore::new(backend, config.namespace.clone(), config.kinds);
        let settings = store.load();
        let mut scheduler = Scheduler::new(config.scheduler_config());
        scheduler.trigger(Trigger::Initial, now);

        log::debug!(
            "Created overlay {} ({} title, {} prefix, {} channel patterns)",
            config.namespace,
            settings.pattern_count(FilterKind::Title),
            settings.pattern_count(FilterKind::Prefix),
            settings.pattern_count(FilterKind::Channel),
        );

        Self {
            options: config.render_options(),
            config,
            extractor,
            store,
            settings,
            scheduler,
            status: None,
            last_hidden: 0,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn store(&self) -> &SettingsStore<B> {
        &self.store
    }

    /// Status of the most recent pass.
    pub fn status(&self) -> Option<&StatusReport> {
        self.status.as_ref()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.scheduler.next_due()
    }

    /// Drain the change feed and arm a pass if candidates came or went.
    pub fn observe<H>(&mut self, host: &mut H, now: u64) -> Option<Schedule>
    where
        H: Tree + ChangeFeed + ?Sized,
    {
        let records = host.take_records();
        let structural = records
            .iter()
            .any(|record| is_structural(record, &*host, &self.config.shape));
        structural.then(|| self.scheduler.trigger(Trigger::Structure, now))
    }

    /// Report a structural change the host has already classified.
    pub fn notify_structure(&mut self, now: u64) -> Schedule {
        self.scheduler.trigger(Trigger::Structure, now)
    }

    pub fn notify(&mut self, signal: HostSignal, now: u64) -> Schedule {
        self.scheduler.trigger(Trigger::Signal(signal), now)
    }

    /// Run a pass if one is due.
    pub fn tick<T: Tree + ?Sized>(&mut self, tree: &mut T, now: u64) -> Option<StatusReport> {
        if !self.scheduler.begin_due(now) {
            return None;
        }
        Some(self.run_pass(tree, now))
    }

    /// Persist the current settings and run a pass right away.
    pub fn apply_now<T: Tree + ?Sized>(&mut self, tree: &mut T, now: u64) -> Option<StatusReport> {
        self.store.save(&self.settings);
        if !self.scheduler.begin_immediate() {
            return None;
        }
        Some(self.run_pass(tree, now))
    }

    /// Append `value` to the quick-add pattern list and re-render.
    ///
    /// Returns `None` if the value was blank or already present.
    pub fn quick_add<T: Tree + ?Sized>(&mut self, tree: &mut T, value: &str, now: u64) -> Option<StatusReport> {
        let kind = self.config.quick_add_kind;
        if !self.settings.add_pattern(kind, value) {
            return None;
        }
        log::debug!("Quick-added {:?} to {}", value.trim(), kind);
        self.apply_now(tree, now)
    }

    /// Replace a pattern list from free text. The pass is debounced.
    pub fn edit_patterns(&mut self, kind: FilterKind, text: &str, now: u64) -> Schedule {
        self.settings.set_text(kind, text);
        self.store.save(&self.settings);
        self.scheduler.trigger(Trigger::SettingsEdited, now)
    }

    /// Clear every pattern list and re-render.
    pub fn reset<T: Tree + ?Sized>(&mut self, tree: &mut T, now: u64) -> Option<StatusReport> {
        self.settings.reset();
        self.apply_now(tree, now)
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.settings.set_panel_open(open);
        self.store.save(&self.settings);
    }

    /// Detach from the host: stop observing and strip every marker and
    /// control the overlay owns. Returns the final settings.
    pub fn dispose<H>(self, host: &mut H) -> Settings
    where
        H: Tree + ChangeFeed + ?Sized,
    {
        host.disconnect();
        let nodes = host.candidates(&self.config.shape);
        let removed = render::clear(host, &nodes, &self.config.marker_class);
        log::debug!("Disposed overlay {} ({} edits reverted)", self.config.namespace, removed);
        self.settings
    }

    fn run_pass<T: Tree + ?Sized>(&mut self, tree: &mut T, now: u64) -> StatusReport {
        let candidates = collect_candidates(&*tree, &self.config.shape, &self.extractor);
        let outcome = render(tree, &candidates, &self.settings, &self.options);

        let hid_new_items = outcome.hidden_count > self.last_hidden;
        self.last_hidden = outcome.hidden_count;
        self.scheduler.finish(now, hid_new_items);

        log::debug!(
            "Render pass: {}/{} hidden, {} edits, {} skipped",
            outcome.hidden_count,
            outcome.total_count,
            outcome.mutations,
            outcome.skipped,
        );

        let report = StatusReport::from_outcome(&outcome, &self.settings, self.config.kinds);
        self.status = Some(report.clone());
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Element, VirtualDom};
    use crate::settings::MemoryStorage;
    use crate::types::MatchReason;

    fn result(title: &str, channel: &str) -> Element {
        Element::new("div")
            .attr("data-test", "search-result")
            .child(Element::new("h3").text(title))
            .child(Element::new("p").text(&format!("18.12.2025 | {}", channel)))
    }

    fn grid_item(title: &str) -> Element {
        Element::new("li").class("Grid_GridItem__dE_ip").child(
            Element::new("a")
                .attr("data-testid", "LL--1")
                .attr("aria-label", &format!("{}. Serie", title)),
        )
    }

    #[test]
    fn test_initial_pass_runs_after_window() {
        let storage = MemoryStorage::new();
        storage.insert_raw("sv_filter_prefixes", "Spielfilm:");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        dom.append(root, result("Spielfilm: Die Brücke", "ARD"));
        dom.append(root, result("Tagesschau", "ARD"));

        let mut overlay = Overlay::from_preset(Preset::SearchFilter, storage, 0);
        assert!(overlay.tick(&mut dom, 100).is_none());
        let report = overlay.tick(&mut dom, 150).unwrap();
        assert_eq!(report.pill(), "1/2");
        assert_eq!(report.count_for(MatchReason::PrefixMatch), 1);
    }

    #[test]
    fn test_own_edits_do_not_retrigger() {
        let storage = MemoryStorage::new();
        storage.insert_raw("joyn_filter_titles", "Baywatch");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        dom.append(root, grid_item("Baywatch"));
        dom.append(root, grid_item("Tatort"));

        let mut overlay = Overlay::from_preset(Preset::TitleFilter, storage, 0);
        overlay.observe(&mut dom, 0);
        let report = overlay.tick(&mut dom, 150).unwrap();
        assert_eq!(report.pill(), "1/2");

        // Marker toggles and quick-add controls are not candidate changes
        assert_eq!(overlay.observe(&mut dom, 160), None);
        assert_eq!(overlay.next_due(), None);
    }

    #[test]
    fn test_new_items_trigger_pass() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let mut overlay = Overlay::from_preset(Preset::SearchFilter, MemoryStorage::new(), 0);
        overlay.edit_patterns(FilterKind::Channel, "zdf", 0);
        overlay.tick(&mut dom, 150);

        dom.append(root, result("X", "ZDF"));
        let schedule = overlay.observe(&mut dom, 1000).unwrap();
        assert_eq!(schedule, Schedule::Armed { due_at: 1150 });
        let report = overlay.tick(&mut dom, 1150).unwrap();
        assert_eq!(report.pill(), "1/1");
        assert_eq!(report.count_for(MatchReason::ExactMatch), 1);
    }

    #[test]
    fn test_quick_add_persists_and_applies() {
        let storage = MemoryStorage::new();
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let item = dom.append(root, grid_item("Tatort")).unwrap();

        let mut overlay = Overlay::from_preset(Preset::TitleFilter, storage.clone(), 0);
        overlay.tick(&mut dom, 150);
        assert_eq!(dom.affordance(item).as_deref(), Some("Tatort"));

        let report = overlay.quick_add(&mut dom, "Tatort", 2000).unwrap();
        assert_eq!(report.pill(), "1/1");
        assert!(dom.has_class(item, "joyn-filter-hidden"));
        assert_eq!(dom.affordance(item), None);
        assert_eq!(storage.raw("joyn_filter_titles").as_deref(), Some("Tatort"));

        assert!(overlay.quick_add(&mut dom, "tatort", 2500).is_none());
    }

    #[test]
    fn test_dispose_restores_page() {
        let storage = MemoryStorage::new();
        storage.insert_raw("joyn_filter_titles", "Baywatch");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let a = dom.append(root, grid_item("Baywatch")).unwrap();
        let b = dom.append(root, grid_item("Tatort")).unwrap();

        let mut overlay = Overlay::from_preset(Preset::TitleFilter, storage, 0);
        overlay.tick(&mut dom, 150);
        let settings = overlay.dispose(&mut dom);

        assert_eq!(settings.pattern_count(FilterKind::Title), 1);
        assert!(!dom.has_class(a, "joyn-filter-hidden"));
        assert_eq!(dom.affordance(b), None);
        assert!(!dom.is_observing());
    }

    #[test]
    fn test_reset_unhides_everything() {
        let storage = MemoryStorage::new();
        storage.insert_raw("sv_filter_channels", "ARD");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let node = dom.append(root, result("Tagesschau", "ARD")).unwrap();

        let mut overlay = Overlay::from_preset(Preset::SearchFilter, storage.clone(), 0);
        overlay.tick(&mut dom, 150);
        assert!(dom.has_class(node, "sv-filter-hidden"));

        let report = overlay.reset(&mut dom, 1000).unwrap();
        assert_eq!(report.pill(), "0/1");
        assert!(!dom.has_class(node, "sv-filter-hidden"));
        assert_eq!(storage.raw("sv_filter_channels").as_deref(), Some(""));
    }

    #[test]
    fn test_panel_state_persists() {
        let storage = MemoryStorage::new();
        let mut overlay = Overlay::from_preset(Preset::SearchFilter, storage.clone(), 0);
        overlay.set_panel_open(false);
        assert_eq!(storage.raw("sv_filter_panel_open").as_deref(), Some("false"));

        let fresh = Overlay::from_preset(Preset::SearchFilter, storage, 0);
        assert!(!fresh.settings().panel_open);
    }

    #[test]
    fn test_recheck_feature() {
        let config = Preset::SearchFilter.config().with_recheck(500);
        let storage = MemoryStorage::new();
        storage.insert_raw("sv_filter_channels", "ZDF");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        dom.append(root, result("X", "ZDF"));

        let mut overlay = Overlay::create(config, Preset::SearchFilter.extractor(), storage, 0);
        overlay.tick(&mut dom, 150);
        assert_eq!(overlay.next_due(), Some(650));
        assert!(overlay.tick(&mut dom, 650).is_some());
        assert_eq!(overlay.next_due(), None);
    }

    #[test]
    fn test_burst_of_changes_coalesces_into_one_pass() {
        let storage = MemoryStorage::new();
        storage.insert_raw("sv_filter_channels", "ZDF");
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let mut overlay = Overlay::from_preset(Preset::SearchFilter, storage, 0);
        overlay.tick(&mut dom, 150);

        for i in 0..5u64 {
            dom.append(root, result(&format!("Item {}", i), "ZDF"));
            overlay.observe(&mut dom, 1000 + i * 10);
        }
        assert_eq!(overlay.next_due(), Some(1150));
        assert!(overlay.tick(&mut dom, 1149).is_none());
        let report = overlay.tick(&mut dom, 1150).unwrap();
        assert_eq!(report.pill(), "5/5");
        assert_eq!(overlay.scheduler().stats().passes, 2);
    }

    #[test]
    fn test_preset_parse() {
        assert_eq!(Preset::parse("joyn"), Some(Preset::TitleFilter));
        assert_eq!(Preset::parse("Search-Filter"), Some(Preset::SearchFilter));
        assert_eq!(Preset::parse("rating"), None);
        assert!(Preset::TitleFilter.config().render_options().quick_add.is_some());
        assert!(Preset::SearchFilter.config().render_options().quick_add.is_none());
    }
}
