//! Filter settings and the durable settings store
//!
//! Settings are persisted as one free-text value per filter kind plus a
//! boolean-as-string for the panel state, under keys namespaced per script
//! (`<namespace>_<suffix>`). Persistence is best-effort: the in-memory
//! [`Settings`] stay authoritative for the current page life.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::patterns::{parse_pattern_list_with_stats, PatternSet, Separators};
use crate::types::{FilterKind, KindMask};

const PANEL_OPEN_SUFFIX: &str = "panel_open";

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable")]
    Unavailable,
    #[error("Failed to read '{key}': {message}")]
    Read { key: String, message: String },
    #[error("Failed to write '{key}': {message}")]
    Write { key: String, message: String },
}

/// Synchronous string key/value persistence.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// In-memory backend. Clones share the same map, so a "fresh" store built
/// from a clone sees everything written through the original.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value for a key, bypassing the store.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Pattern lists per filter kind plus the panel state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    patterns: BTreeMap<FilterKind, PatternSet>,
    pub panel_open: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            patterns: BTreeMap::new(),
            panel_open: true,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper mostly used by tests and fixtures.
    pub fn with_text(mut self, kind: FilterKind, text: &str) -> Self {
        self.set_text(kind, text);
        self
    }

    pub fn patterns(&self, kind: FilterKind) -> Option<&PatternSet> {
        self.patterns.get(&kind)
    }

    pub fn pattern_count(&self, kind: FilterKind) -> usize {
        self.patterns.get(&kind).map_or(0, PatternSet::len)
    }

    /// Replace a pattern list with the parsed free text.
    pub fn set_text(&mut self, kind: FilterKind, text: &str) {
        let (set, _) = parse_pattern_list_with_stats(text, kind.separators());
        if set.is_empty() {
            self.patterns.remove(&kind);
        } else {
            self.patterns.insert(kind, set);
        }
    }

    /// Append one pattern. Returns false if nothing new was stored.
    ///
    /// Values with line breaks are rejected. For comma-separated kinds a value
    /// containing commas is added as one entry per part, as the list editor
    /// would, so the stored text reads back the same.
    pub fn add_pattern(&mut self, kind: FilterKind, value: &str) -> bool {
        if value.trim().is_empty() || value.contains(&['\n', '\r'][..]) {
            return false;
        }
        let set = self.patterns.entry(kind).or_default();
        let added = if kind.separators() == Separators::LinesAndCommas {
            value.split(',').fold(false, |added, part| set.insert(part) || added)
        } else {
            set.insert(value)
        };
        if set.is_empty() {
            self.patterns.remove(&kind);
        }
        added
    }

    /// Clear every pattern list. The panel state is kept.
    pub fn reset(&mut self) {
        self.patterns.clear();
    }

    pub fn set_panel_open(&mut self, open: bool) {
        self.panel_open = open;
    }

    pub fn has_patterns(&self, kinds: KindMask) -> bool {
        kinds.kinds().any(|kind| self.pattern_count(kind) > 0)
    }

    /// Order-independent comparison of the pattern collections.
    pub fn equivalent(&self, other: &Settings) -> bool {
        self.panel_open == other.panel_open
            && FilterKind::ALL.iter().all(|kind| match (self.patterns(*kind), other.patterns(*kind)) {
                (Some(a), Some(b)) => a.equivalent(b),
                (None, None) => true,
                _ => false,
            })
    }
}

// =============================================================================
// Settings Store
// =============================================================================

/// Loads and saves [`Settings`] through a [`StorageBackend`].
pub struct SettingsStore<B> {
    backend: B,
    namespace: String,
    kinds: KindMask,
}

impl<B: StorageBackend> SettingsStore<B> {
    pub fn new(backend: B, namespace: impl Into<String>, kinds: KindMask) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
            kinds,
        }
    }

    pub fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.namespace, suffix)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Load settings. Never fails: missing or unreadable entries become
    /// empty lists and an unreadable panel flag defaults to open.
    pub fn load(&self) -> Settings {
        let mut settings = Settings::default();

        for kind in self.kinds.kinds() {
            if let Some(text) = self.read(&self.key(kind.storage_suffix())) {
                settings.set_text(kind, &text);
            }
        }

        settings.panel_open = match self.read(&self.key(PANEL_OPEN_SUFFIX)).as_deref() {
            Some("false") => false,
            Some("true") | None => true,
            Some(other) => {
                log::warn!("Ignoring corrupt panel state {:?} in {}", other, self.namespace);
                true
            }
        };

        settings
    }

    /// Persist settings. Failures are logged and swallowed.
    pub fn save(&mut self, settings: &Settings) {
        for kind in self.kinds.kinds() {
            let text = settings.patterns(kind).map(PatternSet::to_text).unwrap_or_default();
            let key = self.key(kind.storage_suffix());
            self.write(&key, &text);
        }
        let key = self.key(PANEL_OPEN_SUFFIX);
        self.write(&key, if settings.panel_open { "true" } else { "false" });
    }

    fn read(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("Settings read failed, using defaults: {}", e);
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.backend.set(key, value) {
            log::warn!("Settings write failed, keeping in-memory state: {}", e);
        }
    }
}
