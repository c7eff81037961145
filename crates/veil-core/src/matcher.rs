//! Predicate engine
//!
//! Maps a candidate and the current settings to a [`Decision`]. Rules are
//! checked in priority order and the first hit is reported:
//!
//! 1. Exact match of the group key against channel patterns, or of the
//!    whole title against title patterns
//! 2. Prefix match of the title against prefix patterns
//! 3. Keep
//!
//! Candidates with nothing extracted are always kept.

use crate::settings::Settings;
use crate::types::{CandidateItem, Decision, FilterKind, KindMask, MatchReason};

/// Decide whether a candidate is hidden, considering only `kinds`.
pub fn decide(item: &CandidateItem, settings: &Settings, kinds: KindMask) -> Decision {
    if item.is_blank() {
        return Decision::KEEP;
    }

    if kinds.contains(KindMask::CHANNEL) && exact_hit(settings, FilterKind::Channel, &item.group_key) {
        return Decision::hide(MatchReason::ExactMatch, FilterKind::Channel);
    }

    if kinds.contains(KindMask::TITLE) && exact_hit(settings, FilterKind::Title, &item.title) {
        return Decision::hide(MatchReason::ExactMatch, FilterKind::Title);
    }

    if kinds.contains(KindMask::PREFIX) {
        let hit = settings
            .patterns(FilterKind::Prefix)
            .and_then(|set| set.matches_prefix(&item.title));
        if hit.is_some() {
            return Decision::hide(MatchReason::PrefixMatch, FilterKind::Prefix);
        }
    }

    Decision::KEEP
}

fn exact_hit(settings: &Settings, kind: FilterKind, value: &str) -> bool {
    settings
        .patterns(kind)
        .map_or(false, |set| set.contains_exact(value))
}

/// Whether `value` is already covered by a stored pattern of `kind`.
pub fn is_covered(settings: &Settings, kind: FilterKind, value: &str) -> bool {
    match kind {
        FilterKind::Prefix => settings
            .patterns(kind)
            .and_then(|set| set.matches_prefix(value))
            .is_some(),
        FilterKind::Title | FilterKind::Channel => exact_hit(settings, kind, value),
    }
}
