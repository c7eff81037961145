//! Async event driver
//!
//! Feeds timed actions into an overlay over a [`VirtualDom`] and wakes up
//! for scheduled passes. Time is measured from the driver's start instant,
//! so runs on a paused tokio clock are deterministic.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use veil_core::extract::Extractor;
use veil_core::{Overlay, StatusReport, StorageBackend, Tree, VirtualDom};

use crate::fixture::{Action, ScriptEvent};

/// A pass the driver observed.
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub at: u64,
    pub cause: &'static str,
    pub report: StatusReport,
}

pub struct Driver<B: StorageBackend, E: Extractor> {
    overlay: Overlay<B, E>,
    dom: VirtualDom,
    start: Instant,
    passes: Vec<PassRecord>,
}

impl<B: StorageBackend, E: Extractor> Driver<B, E> {
    pub fn new(overlay: Overlay<B, E>, dom: VirtualDom, start: Instant) -> Self {
        Self {
            overlay,
            dom,
            start,
            passes: Vec::new(),
        }
    }

    pub fn overlay(&self) -> &Overlay<B, E> {
        &self.overlay
    }

    pub fn dom(&self) -> &VirtualDom {
        &self.dom
    }

    pub fn passes(&self) -> &[PassRecord] {
        &self.passes
    }

    pub fn into_parts(self) -> (Overlay<B, E>, VirtualDom, Vec<PassRecord>) {
        (self.overlay, self.dom, self.passes)
    }

    fn now(&self) -> u64 {
        Instant::now().saturating_duration_since(self.start).as_millis() as u64
    }

    fn deadline(&self) -> Option<Instant> {
        self.overlay
            .next_due()
            .map(|due| self.start + Duration::from_millis(due))
    }

    fn record(&mut self, at: u64, cause: &'static str, report: Option<StatusReport>) {
        if let Some(report) = report {
            log::debug!("Pass at {}ms ({}): {}", at, cause, report);
            self.passes.push(PassRecord { at, cause, report });
        }
    }

    fn tick(&mut self) {
        let now = self.now();
        let report = self.overlay.tick(&mut self.dom, now);
        self.record(now, "scheduled", report);
    }

    /// Apply one action at the current time.
    pub fn handle(&mut self, action: Action) {
        let now = self.now();
        log::trace!("{}ms: {:?}", now, action);

        match action {
            Action::Append { element } => {
                let root = self.dom.root();
                self.dom.append(root, element.into());
                self.overlay.observe(&mut self.dom, now);
            }
            Action::Remove { index } => {
                let shape = self.overlay.config().shape.clone();
                match self.dom.candidates(&shape).get(index) {
                    Some(&node) => {
                        self.dom.remove(node);
                        self.overlay.observe(&mut self.dom, now);
                    }
                    None => log::warn!("No candidate #{} to remove", index),
                }
            }
            Action::Signal { signal } => {
                self.overlay.notify(signal, now);
            }
            Action::Edit { kind, text } => {
                self.overlay.edit_patterns(kind, &text, now);
            }
            Action::QuickAdd { value } => {
                let report = self.overlay.quick_add(&mut self.dom, &value, now);
                self.record(now, "quick-add", report);
            }
            Action::Apply => {
                let report = self.overlay.apply_now(&mut self.dom, now);
                self.record(now, "apply", report);
            }
            Action::Reset => {
                let report = self.overlay.reset(&mut self.dom, now);
                self.record(now, "reset", report);
            }
        }
    }

    /// Process actions until the sender is dropped, then run whatever is
    /// still scheduled.
    pub async fn run(&mut self, mut events: mpsc::Receiver<Action>) {
        loop {
            let deadline = self.deadline();
            tokio::select! {
                action = events.recv() => match action {
                    Some(action) => self.handle(action),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.tick();
                }
            }
        }

        while let Some(deadline) = self.deadline() {
            sleep_until(deadline).await;
            self.tick();
        }
    }
}

/// Send each event at its offset from `start`.
pub fn spawn_script(events: Vec<ScriptEvent>, start: Instant) -> mpsc::Receiver<Action> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        for event in events {
            sleep_until(start + Duration::from_millis(event.at)).await;
            if tx.send(event.action).await.is_err() {
                break;
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::ElementSpec;
    use std::collections::BTreeMap;
    use veil_core::{FilterKind, MemoryStorage, Preset};

    fn result(title: &str, channel: &str) -> ElementSpec {
        let mut attrs = BTreeMap::new();
        attrs.insert("data-test".to_string(), "search-result".to_string());
        let child = |tag: &str, text: String| ElementSpec {
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            class: None,
            text,
            children: Vec::new(),
        };
        ElementSpec {
            tag: "div".to_string(),
            attrs,
            class: None,
            text: String::new(),
            children: vec![
                child("h3", title.to_string()),
                child("p", format!("18.12.2025 | {}", channel)),
            ],
        }
    }

    fn at(at: u64, action: Action) -> ScriptEvent {
        ScriptEvent { at, action }
    }

    fn search_driver(storage: MemoryStorage) -> Driver<MemoryStorage, veil_core::PageExtractor> {
        let start = Instant::now();
        let overlay = Overlay::from_preset(Preset::SearchFilter, storage, 0);
        Driver::new(overlay, VirtualDom::new(), start)
    }

    #[tokio::test(start_paused = true)]
    async fn test_appends_10ms_apart_coalesce() {
        let storage = MemoryStorage::new();
        storage.insert_raw("sv_filter_channels", "ZDF");
        let mut driver = search_driver(storage);

        let events = vec![
            at(1000, Action::Append { element: result("A", "ZDF") }),
            at(1010, Action::Append { element: result("B", "ARD") }),
        ];
        let rx = spawn_script(events, driver.start);
        driver.run(rx).await;

        let times: Vec<u64> = driver.passes().iter().map(|p| p.at).collect();
        assert_eq!(times, vec![150, 1150]);
        assert_eq!(driver.passes()[1].report.pill(), "1/2");
        assert_eq!(driver.overlay().scheduler().stats().coalesced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_debounce_and_apply_is_immediate() {
        let mut driver = search_driver(MemoryStorage::new());
        let events = vec![
            at(0, Action::Append { element: result("Heute", "ZDF") }),
            at(500, Action::Edit { kind: FilterKind::Channel, text: "Z".to_string() }),
            at(520, Action::Edit { kind: FilterKind::Channel, text: "ZDF".to_string() }),
            at(2000, Action::Reset),
        ];
        let rx = spawn_script(events, driver.start);
        driver.run(rx).await;

        let summary: Vec<(u64, &str, String)> = driver
            .passes()
            .iter()
            .map(|p| (p.at, p.cause, p.report.pill()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (150, "scheduled", "0/1".to_string()),
                (650, "scheduled", "1/1".to_string()),
                (2000, "reset", "0/1".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_missing_candidate_is_ignored() {
        let mut driver = search_driver(MemoryStorage::new());
        let rx = spawn_script(vec![at(10, Action::Remove { index: 3 })], driver.start);
        driver.run(rx).await;
        assert_eq!(driver.passes().len(), 1);
    }
}
