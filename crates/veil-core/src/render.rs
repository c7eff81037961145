//! Render pass
//!
//! Applies decisions to the tree. The pass only ever toggles the marker class
//! on candidate containers and adds/removes its own quick-add controls; it
//! never inserts or removes candidate containers, so its edits are never
//! mistaken for new content by the scheduler.

use crate::matcher::{decide, is_covered};
use crate::settings::Settings;
use crate::tree::{NodeId, Tree};
use crate::types::{CandidateItem, FilterKind, KindMask, MatchReason};

/// Class applied to hidden candidate containers by default.
pub const DEFAULT_MARKER_CLASS: &str = "veil-hidden";

/// Per-variant render options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub marker_class: String,
    pub kinds: KindMask,
    /// Kind a quick-add control appends to; `None` disables the controls
    pub quick_add: Option<FilterKind>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            marker_class: DEFAULT_MARKER_CLASS.to_string(),
            kinds: KindMask::ALL,
            quick_add: None,
        }
    }
}

/// A candidate the pass hid.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HiddenItem {
    pub node: NodeId,
    pub title: String,
    pub group_key: String,
    pub reason: MatchReason,
    pub kind: Option<FilterKind>,
}

/// Result of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderOutcome {
    pub hidden_count: usize,
    pub total_count: usize,
    pub hidden: Vec<HiddenItem>,
    /// Tree edits the pass actually made
    pub mutations: usize,
    /// Candidates that had already left the tree
    pub skipped: usize,
}

/// Value a quick-add control for `item` would append.
pub fn quick_add_value(item: &CandidateItem, kind: FilterKind) -> &str {
    match kind {
        FilterKind::Channel => item.group_key.trim(),
        FilterKind::Title | FilterKind::Prefix => item.title.trim(),
    }
}

/// Apply decisions for `candidates` to the tree, in order.
pub fn render<T: Tree + ?Sized>(
    tree: &mut T,
    candidates: &[CandidateItem],
    settings: &Settings,
    options: &RenderOptions,
) -> RenderOutcome {
    let mut outcome = RenderOutcome::default();

    for item in candidates {
        if !tree.contains(item.node) {
            outcome.skipped += 1;
            continue;
        }
        outcome.total_count += 1;

        let decision = decide(item, settings, options.kinds);

        if decision.hidden {
            if tree.set_class(item.node, &options.marker_class, true) {
                outcome.mutations += 1;
            }
            if tree.detach_affordance(item.node) {
                outcome.mutations += 1;
            }
            outcome.hidden_count += 1;
            outcome.hidden.push(HiddenItem {
                node: item.node,
                title: item.title.clone(),
                group_key: item.group_key.clone(),
                reason: decision.reason,
                kind: decision.kind,
            });
            continue;
        }

        if tree.set_class(item.node, &options.marker_class, false) {
            outcome.mutations += 1;
        }

        if let Some(kind) = options.quick_add {
            outcome.mutations += sync_affordance(tree, item, settings, kind);
        }
    }

    outcome
}

/// Ensure zero or one control keyed by the item's current value.
fn sync_affordance<T: Tree + ?Sized>(
    tree: &mut T,
    item: &CandidateItem,
    settings: &Settings,
    kind: FilterKind,
) -> usize {
    let value = quick_add_value(item, kind);
    let wanted = !value.is_empty() && !is_covered(settings, kind, value);

    if !wanted {
        return usize::from(tree.detach_affordance(item.node));
    }

    if tree.affordance(item.node).as_deref() == Some(value) {
        return 0;
    }
    tree.attach_affordance(item.node, value);
    1
}

/// Strip every marker and control the overlay owns from `candidates`.
pub fn clear<T: Tree + ?Sized>(tree: &mut T, candidates: &[NodeId], marker_class: &str) -> usize {
    let mut mutations = 0;
    for &node in candidates {
        if tree.set_class(node, marker_class, false) {
            mutations += 1;
        }
        if tree.detach_affordance(node) {
            mutations += 1;
        }
    }
    mutations
}
