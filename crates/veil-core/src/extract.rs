//! Item extraction
//!
//! Extractors read a title and a group key from a candidate container.
//! Missing data degrades to empty strings, which the predicate engine treats
//! as "keep".

use crate::tree::{CandidateShape, NodeId, Tree};
use crate::types::CandidateItem;

/// Reads candidate attributes from the tree.
pub trait Extractor {
    fn title<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String;

    fn group_key<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String;

    fn extract<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> CandidateItem {
        CandidateItem::new(node, self.title(tree, node), self.group_key(tree, node))
    }
}

/// Extract every candidate currently in the tree, in encounter order.
pub fn collect_candidates<T, E>(tree: &T, shape: &CandidateShape, extractor: &E) -> Vec<CandidateItem>
where
    T: Tree + ?Sized,
    E: Extractor,
{
    tree.candidates(shape)
        .into_iter()
        .map(|node| extractor.extract(tree, node))
        .collect()
}

// =============================================================================
// Aria Label
// =============================================================================

/// Title from the `aria-label` of a nested card, cut at the first `.`.
///
/// Card labels look like `"<title>. <genre>. <description>"`. There is no
/// group key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AriaLabelExtractor {
    pub card: CandidateShape,
}

impl AriaLabelExtractor {
    pub fn new(card: CandidateShape) -> Self {
        Self { card }
    }
}

/// Text up to the first `.`, trimmed.
pub fn title_from_aria(label: &str) -> &str {
    match label.find('.') {
        Some(pos) => label[..pos].trim(),
        None => label.trim(),
    }
}

impl Extractor for AriaLabelExtractor {
    fn title<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        let card = if tree.matches(node, &self.card) {
            Some(node)
        } else {
            tree.query(node, &self.card)
        };
        card.and_then(|card| tree.attribute(card, "aria-label"))
            .map(|label| title_from_aria(&label).to_string())
            .unwrap_or_default()
    }

    fn group_key<T: Tree + ?Sized>(&self, _tree: &T, _node: NodeId) -> String {
        String::new()
    }
}

// =============================================================================
// Heading + Metadata Line
// =============================================================================

/// Title from the first heading; group key from a `date | channel` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMetaExtractor {
    pub heading: CandidateShape,
    pub meta: CandidateShape,
}

impl HeadingMetaExtractor {
    pub fn new(heading: CandidateShape, meta: CandidateShape) -> Self {
        Self { heading, meta }
    }
}

impl Default for HeadingMetaExtractor {
    fn default() -> Self {
        Self::new(CandidateShape::tag("h3"), CandidateShape::tag("p"))
    }
}

/// Last non-empty `|` segment of a metadata line, if it has at least two.
///
/// `"18.12.2025 | ZDF"` yields `"ZDF"`.
pub fn group_from_meta(line: &str) -> Option<String> {
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.contains('|') {
        return None;
    }
    let parts: Vec<&str> = collapsed
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if parts.len() >= 2 {
        parts.last().map(|part| part.to_string())
    } else {
        None
    }
}

impl Extractor for HeadingMetaExtractor {
    fn title<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        tree.query(node, &self.heading)
            .map(|heading| tree.text(heading).trim().to_string())
            .unwrap_or_default()
    }

    fn group_key<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        tree.query_all(node, &self.meta)
            .into_iter()
            .find_map(|meta| group_from_meta(&tree.text(meta)))
            .unwrap_or_default()
    }
}

// =============================================================================
// Plain Attributes
// =============================================================================

/// Title and group key read straight from container attributes.
///
/// Used when the host has already extracted the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeExtractor {
    pub title_attr: String,
    pub group_attr: String,
}

impl AttributeExtractor {
    pub fn new(title_attr: &str, group_attr: &str) -> Self {
        Self {
            title_attr: title_attr.to_string(),
            group_attr: group_attr.to_string(),
        }
    }
}

impl Extractor for AttributeExtractor {
    fn title<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        tree.attribute(node, &self.title_attr)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    fn group_key<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        tree.attribute(node, &self.group_attr)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }
}

/// The extractors shipped with the presets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageExtractor {
    AriaLabel(AriaLabelExtractor),
    HeadingMeta(HeadingMetaExtractor),
    Attributes(AttributeExtractor),
}

impl Extractor for PageExtractor {
    fn title<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        match self {
            Self::AriaLabel(e) => e.title(tree, node),
            Self::HeadingMeta(e) => e.title(tree, node),
            Self::Attributes(e) => e.title(tree, node),
        }
    }

    fn group_key<T: Tree + ?Sized>(&self, tree: &T, node: NodeId) -> String {
        match self {
            Self::AriaLabel(e) => e.group_key(tree, node),
            Self::HeadingMeta(e) => e.group_key(tree, node),
            Self::Attributes(e) => e.group_key(tree, node),
        }
    }
}
