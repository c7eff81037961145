//! Status projection
//!
//! A read-only summary of the last render pass for display. It holds no
//! state of its own and is rebuilt after every pass.

use std::collections::BTreeMap;
use std::fmt;

use crate::render::RenderOutcome;
use crate::settings::Settings;
use crate::types::{FilterKind, KindMask, MatchReason};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatusReport {
    pub hidden: usize,
    pub total: usize,
    pub by_reason: BTreeMap<MatchReason, usize>,
    pub by_kind: BTreeMap<FilterKind, usize>,
    /// Stored pattern count per supported kind
    pub patterns: BTreeMap<FilterKind, usize>,
}

impl StatusReport {
    pub fn from_outcome(outcome: &RenderOutcome, settings: &Settings, kinds: KindMask) -> Self {
        let mut by_reason = BTreeMap::new();
        let mut by_kind = BTreeMap::new();
        for item in &outcome.hidden {
            *by_reason.entry(item.reason).or_insert(0) += 1;
            if let Some(kind) = item.kind {
                *by_kind.entry(kind).or_insert(0) += 1;
            }
        }

        let patterns = kinds
            .kinds()
            .map(|kind| (kind, settings.pattern_count(kind)))
            .collect();

        Self {
            hidden: outcome.hidden_count,
            total: outcome.total_count,
            by_reason,
            by_kind,
            patterns,
        }
    }

    /// Compact `hidden/total` summary.
    pub fn pill(&self) -> String {
        format!("{}/{}", self.hidden, self.total)
    }

    /// Hidden count per reason, in priority order.
    pub fn breakdown(&self) -> Vec<(MatchReason, usize)> {
        self.by_reason.iter().map(|(reason, count)| (*reason, *count)).collect()
    }

    pub fn count_for(&self, reason: MatchReason) -> usize {
        self.by_reason.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hidden: {} of {}", self.hidden, self.total)?;
        if !self.patterns.is_empty() {
            let counts: Vec<String> = self
                .patterns
                .iter()
                .map(|(kind, count)| format!("{}: {}", kind, count))
                .collect();
            write!(f, " ({})", counts.join(", "))?;
        }
        Ok(())
    }
}
