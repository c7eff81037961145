//! Tree and change-feed abstractions
//!
//! The overlay never talks to a browser directly. It reads and edits the page
//! through [`Tree`] and learns about structural changes through
//! [`ChangeFeed`]; a browser binding, a polling adapter or the in-memory
//! [`VirtualDom`](crate::dom::VirtualDom) can sit behind both.

use std::collections::BTreeMap;

/// Identity of a node within one tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Candidate Shape
// =============================================================================

/// How an attribute value is compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrMatch {
    Present,
    Equals(String),
    Prefix(String),
}

/// A minimal element selector: optional tag, class and attribute test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateShape {
    pub tag: Option<String>,
    pub class: Option<String>,
    pub attribute: Option<(String, AttrMatch)>,
}

impl CandidateShape {
    /// Shape matching any element.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attribute = Some((name.to_string(), AttrMatch::Equals(value.to_string())));
        self
    }

    pub fn with_attr_prefix(mut self, name: &str, prefix: &str) -> Self {
        self.attribute = Some((name.to_string(), AttrMatch::Prefix(prefix.to_string())));
        self
    }

    pub fn with_attr_present(mut self, name: &str) -> Self {
        self.attribute = Some((name.to_string(), AttrMatch::Present));
        self
    }

    /// Test an element given its tag and attributes.
    pub fn matches(&self, tag: &str, attributes: &BTreeMap<String, String>) -> bool {
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }

        if let Some(class) = &self.class {
            let has_class = attributes
                .get("class")
                .map_or(false, |value| value.split_whitespace().any(|c| c == class));
            if !has_class {
                return false;
            }
        }

        if let Some((name, test)) = &self.attribute {
            let Some(value) = attributes.get(name) else {
                return false;
            };
            let ok = match test {
                AttrMatch::Present => true,
                AttrMatch::Equals(expected) => value == expected,
                AttrMatch::Prefix(prefix) => value.starts_with(prefix.as_str()),
            };
            if !ok {
                return false;
            }
        }

        true
    }
}

// =============================================================================
// Tree
// =============================================================================

/// Read/write access to the page tree.
///
/// Marker and affordance edits report whether they changed anything so the
/// render pass can stay a no-op when the tree is already in the desired state.
pub trait Tree {
    /// Candidate containers in encounter order.
    fn candidates(&self, shape: &CandidateShape) -> Vec<NodeId>;

    fn contains(&self, node: NodeId) -> bool;

    fn matches(&self, node: NodeId, shape: &CandidateShape) -> bool;

    /// First descendant of `node` (excluding itself) matching `shape`.
    fn query(&self, node: NodeId, shape: &CandidateShape) -> Option<NodeId> {
        self.query_all(node, shape).into_iter().next()
    }

    /// All descendants of `node` (excluding itself) matching `shape`, in order.
    fn query_all(&self, node: NodeId, shape: &CandidateShape) -> Vec<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Set an attribute. Returns true if the value changed.
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> bool;

    /// Concatenated text content of `node` and its descendants.
    fn text(&self, node: NodeId) -> String;

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    /// Add or remove a class. Returns true if the tree changed.
    fn set_class(&mut self, node: NodeId, class: &str, on: bool) -> bool;

    /// Value carried by the quick-add control attached to `node`, if any.
    fn affordance(&self, node: NodeId) -> Option<String>;

    /// Attach a quick-add control carrying `value`, replacing any existing one.
    fn attach_affordance(&mut self, node: NodeId, value: &str);

    /// Remove the quick-add control. Returns true if one was removed.
    fn detach_affordance(&mut self, node: NodeId) -> bool;
}

// =============================================================================
// Change Feed
// =============================================================================

/// Tag and attributes of an element that has left the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSummary {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
}

impl ElementSummary {
    pub fn matches(&self, shape: &CandidateShape) -> bool {
        shape.matches(&self.tag, &self.attributes)
    }
}

/// One observed tree change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    /// Children were added or removed. Removed subtrees are flattened into
    /// summaries since they can no longer be queried.
    ChildList {
        parent: NodeId,
        added: Vec<NodeId>,
        removed: Vec<ElementSummary>,
    },
    /// An attribute changed on `target`.
    Attribute { target: NodeId, name: String },
}

/// Source of batched tree changes.
pub trait ChangeFeed {
    /// Drain the records observed since the last call.
    fn take_records(&mut self) -> Vec<MutationRecord>;

    /// Stop observing. Later changes produce no records.
    fn disconnect(&mut self);
}

/// Whether a record adds or removes at least one candidate container.
///
/// Attribute changes and insertions of non-candidate nodes (such as the
/// overlay's own controls) never count.
pub fn is_structural<T: Tree + ?Sized>(record: &MutationRecord, tree: &T, shape: &CandidateShape) -> bool {
    match record {
        MutationRecord::Attribute { .. } => false,
        MutationRecord::ChildList { added, removed, .. } => {
            let added_hit = added.iter().any(|&node| {
                tree.contains(node) && (tree.matches(node, shape) || tree.query(node, shape).is_some())
            });
            added_hit || removed.iter().any(|summary| summary.matches(shape))
        }
    }
}
