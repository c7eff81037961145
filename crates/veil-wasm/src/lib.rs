//! WebAssembly bindings for Veil
//!
//! The page script owns the live DOM. It reports candidate containers as a
//! plain array, forwards structural changes and navigation signals, drives
//! the clock, and replays the edits each pass returns.

mod host;

use wasm_bindgen::prelude::*;
use veil_core::extract::AttributeExtractor;
use veil_core::settings::{MemoryStorage, StorageBackend, StorageError};
use veil_core::{
    FilterKind, HostSignal, LinkRewriter, Overlay, PageExtractor, Preset, StatusReport,
};

pub use host::{HostItem, HostOp, HostTree, GROUP_ATTR, TITLE_ATTR};

// =============================================================================
// Logging
// =============================================================================

struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[veil] {}", record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Route `log` output to the browser console. Later calls only change the
/// level.
#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    });
}

// =============================================================================
// Storage
// =============================================================================

/// `window.localStorage`, or page-lifetime memory when it is blocked.
pub enum PageStorage {
    Local(web_sys::Storage),
    Memory(MemoryStorage),
}

impl PageStorage {
    pub fn open() -> Self {
        match local_storage() {
            Ok(storage) => Self::Local(storage),
            Err(e) => {
                log::warn!("Falling back to in-memory settings: {}", e);
                Self::Memory(MemoryStorage::new())
            }
        }
    }
}

fn local_storage() -> Result<web_sys::Storage, StorageError> {
    web_sys::window()
        .ok_or(StorageError::Unavailable)?
        .local_storage()
        .map_err(|_| StorageError::Unavailable)?
        .ok_or(StorageError::Unavailable)
}

fn js_message(value: JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

impl StorageBackend for PageStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Local(storage) => storage.get_item(key).map_err(|e| StorageError::Read {
                key: key.to_string(),
                message: js_message(e),
            }),
            Self::Memory(storage) => storage.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            Self::Local(storage) => storage.set_item(key, value).map_err(|e| StorageError::Write {
                key: key.to_string(),
                message: js_message(e),
            }),
            Self::Memory(storage) => storage.set(key, value),
        }
    }
}

// =============================================================================
// Conversions
// =============================================================================

fn to_ms(now: f64) -> u64 {
    if now.is_finite() && now > 0.0 {
        now as u64
    } else {
        0
    }
}

fn get_field(value: &JsValue, name: &str) -> Option<JsValue> {
    js_sys::Reflect::get(value, &name.into())
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn parse_items(items: &JsValue, marker_class: &str) -> Result<Vec<HostItem>, JsValue> {
    let array = js_sys::Array::from(items);
    let mut out = Vec::with_capacity(array.length() as usize);

    for entry in array.iter() {
        let id = get_field(&entry, "id")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| JsValue::from_str("Candidate is missing a numeric id"))?;
        let mut item = HostItem {
            id: id as u32,
            title: get_field(&entry, "title").and_then(|v| v.as_string()).unwrap_or_default(),
            group_key: get_field(&entry, "groupKey").and_then(|v| v.as_string()).unwrap_or_default(),
            affordance: get_field(&entry, "affordance").and_then(|v| v.as_string()),
            ..Default::default()
        };
        if get_field(&entry, "hidden").and_then(|v| v.as_bool()).unwrap_or(false) {
            item.classes.insert(marker_class.to_string());
        }
        out.push(item);
    }

    Ok(out)
}

fn ops_to_js(ops: &[HostOp]) -> js_sys::Array {
    let array = js_sys::Array::new();
    for op in ops {
        let obj = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&obj, &"op".into(), &JsValue::from_str(op.name()));
        let _ = js_sys::Reflect::set(&obj, &"id".into(), &JsValue::from(op.id()));
        if let Some(value) = op.value() {
            let _ = js_sys::Reflect::set(&obj, &"value".into(), &JsValue::from_str(value));
        }
        array.push(&obj);
    }
    array
}

fn status_to_js(report: &StatusReport) -> JsValue {
    let obj = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&obj, &"hidden".into(), &JsValue::from(report.hidden as u32));
    let _ = js_sys::Reflect::set(&obj, &"total".into(), &JsValue::from(report.total as u32));
    let _ = js_sys::Reflect::set(&obj, &"pill".into(), &JsValue::from_str(&report.pill()));
    let _ = js_sys::Reflect::set(&obj, &"text".into(), &JsValue::from_str(&report.to_string()));

    let reasons = js_sys::Object::new();
    for (reason, count) in report.breakdown() {
        let _ = js_sys::Reflect::set(&reasons, &reason.as_str().into(), &JsValue::from(count as u32));
    }
    let _ = js_sys::Reflect::set(&obj, &"byReason".into(), &reasons);

    let patterns = js_sys::Object::new();
    for (kind, count) in &report.patterns {
        let _ = js_sys::Reflect::set(&patterns, &kind.storage_suffix().into(), &JsValue::from(*count as u32));
    }
    let _ = js_sys::Reflect::set(&obj, &"patterns".into(), &patterns);

    obj.into()
}

// =============================================================================
// Overlay
// =============================================================================

/// One overlay instance per page script.
#[wasm_bindgen]
pub struct FilterOverlay {
    overlay: Option<Overlay<PageStorage>>,
    host: HostTree,
    marker_class: String,
    rewriter: LinkRewriter,
}

#[wasm_bindgen]
impl FilterOverlay {
    /// Create an overlay for a preset (`"title"` or `"search"`). The initial
    /// pass is armed at `now`.
    #[wasm_bindgen(constructor)]
    pub fn new(preset: &str, now: f64) -> Result<FilterOverlay, JsValue> {
        let preset = Preset::parse(preset)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown preset: {}", preset)))?;
        let config = preset.config();
        let marker_class = config.marker_class.clone();
        let extractor = PageExtractor::Attributes(AttributeExtractor::new(TITLE_ATTR, GROUP_ATTR));
        let overlay = Overlay::create(config, extractor, PageStorage::open(), to_ms(now));

        Ok(Self {
            overlay: Some(overlay),
            host: HostTree::new(),
            marker_class,
            rewriter: LinkRewriter::mediatheken(),
        })
    }

    #[wasm_bindgen(getter, js_name = markerClass)]
    pub fn marker_class(&self) -> String {
        self.marker_class.clone()
    }

    #[wasm_bindgen(getter, js_name = panelOpen)]
    pub fn panel_open(&self) -> bool {
        self.overlay.as_ref().map_or(true, |o| o.settings().panel_open)
    }

    #[wasm_bindgen(js_name = setPanelOpen)]
    pub fn set_panel_open(&mut self, open: bool) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_panel_open(open);
        }
    }

    /// Replace the candidate snapshot used by the next pass.
    #[wasm_bindgen(js_name = setCandidates)]
    pub fn set_candidates(&mut self, items: JsValue) -> Result<(), JsValue> {
        let items = parse_items(&items, &self.marker_class)?;
        self.host.load(items);
        Ok(())
    }

    /// Candidate containers were added or removed. Returns the due time.
    #[wasm_bindgen(js_name = notifyStructure)]
    pub fn notify_structure(&mut self, now: f64) -> Option<f64> {
        let overlay = self.overlay.as_mut()?;
        Some(overlay.notify_structure(to_ms(now)).due_at() as f64)
    }

    /// History navigation (`"traverse"` or `"push"`) or a visibility change
    /// (`"visible"`). Returns the due time.
    #[wasm_bindgen(js_name = notifySignal)]
    pub fn notify_signal(&mut self, signal: &str, now: f64) -> Result<Option<f64>, JsValue> {
        let signal = match signal {
            "traverse" | "popstate" | "pageshow" => HostSignal::HistoryTraversal,
            "push" | "pushState" => HostSignal::HistoryPush,
            "visible" | "visibilitychange" => HostSignal::VisibilityRestored,
            other => return Err(JsValue::from_str(&format!("Unknown signal: {}", other))),
        };
        Ok(self
            .overlay
            .as_mut()
            .map(|overlay| overlay.notify(signal, to_ms(now)).due_at() as f64))
    }

    #[wasm_bindgen(js_name = nextDue)]
    pub fn next_due(&self) -> Option<f64> {
        self.overlay.as_ref()?.next_due().map(|t| t as f64)
    }

    /// Run a pass if one is due. Returns `{ ran, ops, status }`.
    #[wasm_bindgen(js_name = runDue)]
    pub fn run_due(&mut self, now: f64) -> JsValue {
        let report = match self.overlay.as_mut() {
            Some(overlay) => overlay.tick(&mut self.host, to_ms(now)),
            None => None,
        };
        self.pass_result(report)
    }

    /// Persist settings and run a pass right away.
    #[wasm_bindgen(js_name = applyNow)]
    pub fn apply_now(&mut self, now: f64) -> JsValue {
        let report = match self.overlay.as_mut() {
            Some(overlay) => overlay.apply_now(&mut self.host, to_ms(now)),
            None => None,
        };
        self.pass_result(report)
    }

    #[wasm_bindgen(js_name = quickAdd)]
    pub fn quick_add(&mut self, value: &str, now: f64) -> JsValue {
        let report = match self.overlay.as_mut() {
            Some(overlay) => overlay.quick_add(&mut self.host, value, to_ms(now)),
            None => None,
        };
        self.pass_result(report)
    }

    pub fn reset(&mut self, now: f64) -> JsValue {
        let report = match self.overlay.as_mut() {
            Some(overlay) => overlay.reset(&mut self.host, to_ms(now)),
            None => None,
        };
        self.pass_result(report)
    }

    /// Replace one pattern list from panel text. The pass is debounced.
    #[wasm_bindgen(js_name = setPatterns)]
    pub fn set_patterns(&mut self, kind: &str, text: &str, now: f64) -> Result<Option<f64>, JsValue> {
        let kind = FilterKind::parse(kind)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown filter kind: {}", kind)))?;
        Ok(self
            .overlay
            .as_mut()
            .map(|overlay| overlay.edit_patterns(kind, text, to_ms(now)).due_at() as f64))
    }

    /// Pattern list as panel text, one entry per line.
    #[wasm_bindgen(js_name = patternsText)]
    pub fn patterns_text(&self, kind: &str) -> String {
        let Some(kind) = FilterKind::parse(kind) else {
            return String::new();
        };
        self.overlay
            .as_ref()
            .and_then(|o| o.settings().patterns(kind))
            .map(|set| set.to_text())
            .unwrap_or_default()
    }

    pub fn status(&self) -> JsValue {
        match self.overlay.as_ref().and_then(|o| o.status()) {
            Some(report) => status_to_js(report),
            None => JsValue::NULL,
        }
    }

    /// New href for a link, or `undefined` when it should stay.
    #[wasm_bindgen(js_name = rewriteHref)]
    pub fn rewrite_href(&self, href: &str) -> Option<String> {
        self.rewriter.rewrite_href(href)
    }

    /// Stop reacting and return the ops that restore the page.
    pub fn dispose(&mut self) -> JsValue {
        if let Some(overlay) = self.overlay.take() {
            overlay.dispose(&mut self.host);
        }
        ops_to_js(&self.host.take_ops()).into()
    }
}

impl FilterOverlay {
    fn pass_result(&mut self, report: Option<StatusReport>) -> JsValue {
        let obj = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&obj, &"ran".into(), &JsValue::from(report.is_some()));
        let _ = js_sys::Reflect::set(&obj, &"ops".into(), &ops_to_js(&self.host.take_ops()));
        let status = report.as_ref().map_or(JsValue::NULL, status_to_js);
        let _ = js_sys::Reflect::set(&obj, &"status".into(), &status);
        obj.into()
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    fn candidate(id: u32, title: &str, group_key: &str, hidden: bool) -> JsValue {
        let obj = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&obj, &"id".into(), &JsValue::from(id));
        let _ = js_sys::Reflect::set(&obj, &"title".into(), &JsValue::from_str(title));
        let _ = js_sys::Reflect::set(&obj, &"groupKey".into(), &JsValue::from_str(group_key));
        let _ = js_sys::Reflect::set(&obj, &"hidden".into(), &JsValue::from(hidden));
        obj.into()
    }

    fn field(value: &JsValue, name: &str) -> JsValue {
        js_sys::Reflect::get(value, &name.into()).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_parse_items_reads_fields() {
        let items = js_sys::Array::new();
        items.push(&candidate(4, "Heute", "ZDF", true));
        items.push(&candidate(5, "", "", false));

        let parsed = parse_items(&items.into(), "sv-filter-hidden").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].group_key, "ZDF");
        assert!(parsed[0].classes.contains("sv-filter-hidden"));
        assert!(parsed[1].classes.is_empty());
    }

    #[wasm_bindgen_test]
    fn test_parse_items_requires_id() {
        let items = js_sys::Array::new();
        items.push(&js_sys::Object::new());
        assert!(parse_items(&items.into(), "x").is_err());
    }

    #[wasm_bindgen_test]
    fn test_scheduled_pass_returns_ops() {
        let mut overlay = FilterOverlay::new("search", 0.0).unwrap();
        overlay.set_patterns("channel", "ZDF", 0.0).unwrap();

        let items = js_sys::Array::new();
        items.push(&candidate(1, "Heute", "ZDF", false));
        items.push(&candidate(2, "Tagesschau", "ARD", false));
        overlay.set_candidates(items.into()).unwrap();

        let due = overlay.next_due().unwrap();
        let result = overlay.run_due(due);
        assert_eq!(field(&result, "ran").as_bool(), Some(true));

        let ops = js_sys::Array::from(&field(&result, "ops"));
        assert_eq!(ops.length(), 1);
        assert_eq!(field(&ops.get(0), "op").as_string().as_deref(), Some("addClass"));
        assert_eq!(field(&field(&result, "status"), "pill").as_string().as_deref(), Some("1/2"));

        let restore = js_sys::Array::from(&overlay.dispose());
        assert_eq!(field(&restore.get(0), "op").as_string().as_deref(), Some("removeClass"));
    }

    #[wasm_bindgen_test]
    fn test_rewrite_href() {
        let overlay = FilterOverlay::new("title", 0.0).unwrap();
        assert_eq!(overlay.rewrite_href("/channels/dmax").as_deref(), Some("/channels/dmax#alles"));
        assert_eq!(overlay.rewrite_href("/serien/tatort"), None);
    }
}
