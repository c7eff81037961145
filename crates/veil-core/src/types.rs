//! Core type definitions for Veil
//!
//! These types are shared by the predicate engine, the render pass and the
//! scheduler.

use crate::patterns::Separators;
use crate::tree::NodeId;

// =============================================================================
// Filter Kinds
// =============================================================================

/// Kind of pattern list a setting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum FilterKind {
    /// Full-title equality (case-insensitive)
    Title,
    /// Title starts with the pattern (case-insensitive)
    Prefix,
    /// Group key (channel, sender) equality (case-insensitive)
    Channel,
}

impl FilterKind {
    pub const ALL: [FilterKind; 3] = [FilterKind::Title, FilterKind::Prefix, FilterKind::Channel];

    /// Storage key suffix for this kind.
    pub const fn storage_suffix(self) -> &'static str {
        match self {
            Self::Title => "titles",
            Self::Prefix => "prefixes",
            Self::Channel => "channels",
        }
    }

    /// Whether a match of this kind is an exact match.
    pub const fn is_exact(self) -> bool {
        matches!(self, Self::Title | Self::Channel)
    }

    /// How the free-text list for this kind is split. Titles are compared
    /// whole, so commas stay part of the entry.
    pub const fn separators(self) -> Separators {
        match self {
            Self::Title => Separators::Lines,
            Self::Prefix | Self::Channel => Separators::LinesAndCommas,
        }
    }

    /// Parse from a user-facing name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "titles" => Some(Self::Title),
            "prefix" | "prefixes" => Some(Self::Prefix),
            "channel" | "channels" | "sender" => Some(Self::Channel),
            _ => None,
        }
    }

    pub const fn mask(self) -> KindMask {
        match self {
            Self::Title => KindMask::TITLE,
            Self::Prefix => KindMask::PREFIX,
            Self::Channel => KindMask::CHANNEL,
        }
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_suffix())
    }
}

bitflags::bitflags! {
    /// Set of filter kinds a script variant supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KindMask: u8 {
        const TITLE = 1 << 0;
        const PREFIX = 1 << 1;
        const CHANNEL = 1 << 2;
        const ALL = Self::TITLE.bits() | Self::PREFIX.bits() | Self::CHANNEL.bits();
    }
}

impl KindMask {
    /// Kinds in this mask, in priority order.
    pub fn kinds(self) -> impl Iterator<Item = FilterKind> {
        FilterKind::ALL.into_iter().filter(move |kind| self.contains(kind.mask()))
    }
}

// =============================================================================
// Feature Flags
// =============================================================================

bitflags::bitflags! {
    /// Optional behaviors of a script variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Features: u8 {
        /// Attach a quick-add control to every visible candidate
        const QUICK_ADD = 1 << 0;
        /// Re-check once more after a pass that hid new items
        const RECHECK = 1 << 1;
    }
}

// =============================================================================
// Candidates and Decisions
// =============================================================================

/// Ephemeral view over one candidate container in the tree.
///
/// Rebuilt on every render pass; only `node` identifies the item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub node: NodeId,
    pub title: String,
    pub group_key: String,
}

impl CandidateItem {
    pub fn new(node: NodeId, title: impl Into<String>, group_key: impl Into<String>) -> Self {
        Self {
            node,
            title: title.into(),
            group_key: group_key.into(),
        }
    }

    /// True when extraction produced nothing to classify.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.group_key.trim().is_empty()
    }
}

/// Why a candidate was hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum MatchReason {
    ExactMatch,
    PrefixMatch,
    None,
}

impl MatchReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ExactMatch => "exact-match",
            Self::PrefixMatch => "prefix-match",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for MatchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hide/keep verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Decision {
    pub hidden: bool,
    pub reason: MatchReason,
    /// Pattern list that produced the match
    pub kind: Option<FilterKind>,
}

impl Decision {
    pub const KEEP: Decision = Decision {
        hidden: false,
        reason: MatchReason::None,
        kind: None,
    };

    pub const fn hide(reason: MatchReason, kind: FilterKind) -> Self {
        Self {
            hidden: true,
            reason,
            kind: Some(kind),
        }
    }
}

impl Default for Decision {
    fn default() -> Self {
        Self::KEEP
    }
}

// =============================================================================
// Host Signals
// =============================================================================

/// Non-structural signals raised by the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum HostSignal {
    /// Back/forward navigation within the document
    HistoryTraversal,
    /// Programmatic same-document navigation (push/replace)
    HistoryPush,
    /// Page restored from a cached or suspended state
    VisibilityRestored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!(FilterKind::parse("Prefixes"), Some(FilterKind::Prefix));
        assert_eq!(FilterKind::parse(" sender "), Some(FilterKind::Channel));
        assert_eq!(FilterKind::parse("title"), Some(FilterKind::Title));
        assert_eq!(FilterKind::parse("genre"), None);
    }

    #[test]
    fn test_kind_mask_order() {
        let kinds: Vec<_> = (KindMask::CHANNEL | KindMask::PREFIX).kinds().collect();
        assert_eq!(kinds, vec![FilterKind::Prefix, FilterKind::Channel]);
    }

    #[test]
    fn test_blank_candidate() {
        assert!(CandidateItem::new(NodeId(1), "  ", "").is_blank());
        assert!(!CandidateItem::new(NodeId(1), "", "ZDF").is_blank());
    }
}
