//! End-to-end overlay scenarios over the virtual tree.

use veil_core::{
    ChangeFeed, Element, FilterKind, HostSignal, MatchReason, MemoryStorage, NodeId, Overlay, Preset,
    Tree, VirtualDom,
};

const HIDDEN: &str = "sv-filter-hidden";

fn result(title: &str, channel: &str) -> Element {
    Element::new("div")
        .attr("data-test", "search-result")
        .child(Element::new("h3").text(title))
        .child(Element::new("p").text(&format!("18.12.2025 | 20:15 | {}", channel)))
}

fn page(items: &[(&str, &str)]) -> (VirtualDom, Vec<NodeId>) {
    let mut dom = VirtualDom::new();
    let root = dom.root();
    let nodes = items
        .iter()
        .filter_map(|(title, channel)| dom.append(root, result(title, channel)))
        .collect();
    dom.take_records();
    (dom, nodes)
}

fn search_overlay(prefixes: &str, channels: &str) -> (Overlay<MemoryStorage>, MemoryStorage) {
    let storage = MemoryStorage::new();
    storage.insert_raw("sv_filter_prefixes", prefixes);
    storage.insert_raw("sv_filter_channels", channels);
    (Overlay::from_preset(Preset::SearchFilter, storage.clone(), 0), storage)
}

#[test]
fn prefix_scenario() {
    let (mut dom, nodes) = page(&[("Spielfilm: Die Brücke", "ARD"), ("Tagesschau", "ARD")]);
    let (mut overlay, _) = search_overlay("Spielfilm:", "");

    let report = overlay.tick(&mut dom, 150).unwrap();
    assert_eq!((report.hidden, report.total), (1, 2));
    assert_eq!(report.count_for(MatchReason::PrefixMatch), 1);
    assert!(dom.has_class(nodes[0], HIDDEN));
    assert!(!dom.has_class(nodes[1], HIDDEN));
}

#[test]
fn channel_exact_match_ignores_case() {
    let (mut dom, nodes) = page(&[("X", "ZDF")]);
    let (mut overlay, _) = search_overlay("", "zdf");

    let report = overlay.tick(&mut dom, 150).unwrap();
    assert_eq!(report.hidden, 1);
    assert_eq!(report.count_for(MatchReason::ExactMatch), 1);
    assert!(dom.has_class(nodes[0], HIDDEN));
}

#[test]
fn exact_match_wins_over_prefix() {
    let (mut dom, _) = page(&[("Spielfilm: Heat", "arte")]);
    let (mut overlay, _) = search_overlay("Spielfilm:", "ARTE");

    let report = overlay.tick(&mut dom, 150).unwrap();
    assert_eq!(report.breakdown(), vec![(MatchReason::ExactMatch, 1)]);
    assert_eq!(report.by_kind.get(&FilterKind::Channel), Some(&1));
}

#[test]
fn blank_candidates_stay_visible() {
    let mut dom = VirtualDom::new();
    let root = dom.root();
    let blank = dom
        .append(root, Element::new("div").attr("data-test", "search-result"))
        .unwrap();
    let (mut overlay, _) = search_overlay("S\nT\nX", "ZDF, ARD");

    let report = overlay.tick(&mut dom, 150).unwrap();
    assert_eq!((report.hidden, report.total), (0, 1));
    assert!(!dom.has_class(blank, HIDDEN));
}

#[test]
fn second_pass_changes_nothing() {
    let (mut dom, _) = page(&[("Spielfilm: A", "ARD"), ("B", "ZDF"), ("C", "NDR")]);
    let (mut overlay, _) = search_overlay("Spielfilm:", "ZDF");

    let first = overlay.tick(&mut dom, 150).unwrap();
    dom.take_records();
    let second = overlay.apply_now(&mut dom, 1000).unwrap();

    assert_eq!(first, second);
    assert!(dom.take_records().is_empty());
}

#[test]
fn triggers_10ms_apart_run_one_pass() {
    let (mut dom, _) = page(&[]);
    let (mut overlay, _) = search_overlay("", "ZDF");
    overlay.tick(&mut dom, 150);
    let root = dom.root();

    dom.append(root, result("A", "ZDF"));
    overlay.observe(&mut dom, 1000);
    dom.append(root, result("B", "ARD"));
    overlay.observe(&mut dom, 1010);

    let mut passes = 0;
    for now in (1000..1600).step_by(5) {
        if overlay.tick(&mut dom, now).is_some() {
            passes += 1;
            assert_eq!(now, 1150);
        }
    }
    assert_eq!(passes, 1);
}

#[test]
fn signals_rearm_the_scheduler() {
    let (mut dom, _) = page(&[("A", "ZDF")]);
    let (mut overlay, _) = search_overlay("", "ZDF");
    overlay.tick(&mut dom, 150);

    overlay.notify(HostSignal::HistoryTraversal, 2000);
    overlay.notify(HostSignal::VisibilityRestored, 2050);
    assert_eq!(overlay.next_due(), Some(2150));
    assert!(overlay.tick(&mut dom, 2150).is_some());
}

#[test]
fn settings_survive_a_fresh_instance() {
    let (mut dom, _) = page(&[("Doku: Meere", "arte")]);
    let (mut overlay, storage) = search_overlay("", "");

    overlay.edit_patterns(FilterKind::Prefix, "Doku:\nSpielfilm:, doku:", 10);
    overlay.edit_patterns(FilterKind::Channel, "ZDF", 20);
    overlay.set_panel_open(false);
    let before = overlay.dispose(&mut dom);

    let fresh = Overlay::from_preset(Preset::SearchFilter, storage, 5000);
    assert!(fresh.settings().equivalent(&before));
    assert_eq!(fresh.settings().pattern_count(FilterKind::Prefix), 2);
    assert!(!fresh.settings().panel_open);
}
