//! In-memory tree
//!
//! An arena-backed element tree implementing [`Tree`] and [`ChangeFeed`].
//! It stands in for a browser document in tests, the CLI harness and
//! benchmarks, and records mutations the way a mutation observer would.

use std::collections::BTreeMap;

use crate::tree::{CandidateShape, ChangeFeed, ElementSummary, MutationRecord, NodeId, Tree};

/// Class carried by quick-add controls.
pub const AFFORDANCE_CLASS: &str = "veil-quick";
/// Attribute holding the value a quick-add control would add.
pub const AFFORDANCE_VALUE_ATTR: &str = "data-veil-value";

/// Detached element description used to build subtrees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.attr("class", class)
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

/// Arena-backed element tree with mutation recording.
#[derive(Debug, Clone)]
pub struct VirtualDom {
    nodes: Vec<Option<Node>>,
    records: Vec<MutationRecord>,
    observing: bool,
}

impl Default for VirtualDom {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualDom {
    /// Create a tree containing only a `body` root. Observation is on.
    pub fn new() -> Self {
        let root = Node {
            tag: "body".to_string(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
        };
        Self {
            nodes: vec![Some(root)],
            records: Vec::new(),
            observing: true,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Resume recording after [`ChangeFeed::disconnect`].
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Number of records waiting to be drained.
    pub fn pending_records(&self) -> usize {
        self.records.len()
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    fn record(&mut self, record: MutationRecord) {
        if self.observing {
            self.records.push(record);
        }
    }

    fn insert_subtree(&mut self, parent: NodeId, element: Element) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(Node {
            tag: element.tag,
            attributes: element.attributes,
            text: element.text,
            children: Vec::new(),
            parent: Some(parent),
        }));
        for child in element.children {
            let child_id = self.insert_subtree(id, child);
            if let Some(node) = self.node_mut(id) {
                node.children.push(child_id);
            }
        }
        id
    }

    /// Append a subtree under `parent`. Returns `None` if `parent` is gone.
    pub fn append(&mut self, parent: NodeId, element: Element) -> Option<NodeId> {
        self.node(parent)?;
        let id = self.insert_subtree(parent, element);
        self.node_mut(parent)?.children.push(id);
        self.record(MutationRecord::ChildList {
            parent,
            added: vec![id],
            removed: Vec::new(),
        });
        Some(id)
    }

    /// Remove `node` and its subtree. The root cannot be removed.
    pub fn remove(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.node(node).and_then(|n| n.parent) else {
            return false;
        };

        let mut removed = Vec::new();
        self.take_subtree(node, &mut removed);

        if let Some(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|&child| child != node);
        }
        self.record(MutationRecord::ChildList {
            parent,
            added: Vec::new(),
            removed,
        });
        true
    }

    fn take_subtree(&mut self, node: NodeId, out: &mut Vec<ElementSummary>) {
        let Some(taken) = self.nodes.get_mut(node.0 as usize).and_then(Option::take) else {
            return;
        };
        out.push(ElementSummary {
            tag: taken.tag,
            attributes: taken.attributes,
        });
        for child in taken.children {
            self.take_subtree(child, out);
        }
    }

    /// Remove every child of `node`, as a client-side route change would.
    pub fn clear_children(&mut self, node: NodeId) {
        let children = self.node(node).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            self.remove(child);
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        let removed = self
            .node_mut(node)
            .map_or(false, |target| target.attributes.remove(name).is_some());
        if removed {
            self.record(MutationRecord::Attribute {
                target: node,
                name: name.to_string(),
            });
        }
        removed
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.node(node).map(|n| n.tag.as_str())
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }

    /// Descendants of `node` in document order, excluding `node`.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(node, &mut out);
        out
    }

    fn collect_descendants(&self, node: NodeId, out: &mut Vec<NodeId>) {
        for &child in self.children(node) {
            out.push(child);
            self.collect_descendants(child, out);
        }
    }

    /// Document-order nodes anywhere in the tree matching `shape`.
    pub fn select_all(&self, shape: &CandidateShape) -> Vec<NodeId> {
        let root = self.root();
        let mut out: Vec<NodeId> = if self.matches(root, shape) { vec![root] } else { Vec::new() };
        out.extend(self.query_all(root, shape));
        out
    }

    fn affordance_node(&self, node: NodeId) -> Option<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .find(|&child| self.has_class(child, AFFORDANCE_CLASS))
    }
}

impl Tree for VirtualDom {
    fn candidates(&self, shape: &CandidateShape) -> Vec<NodeId> {
        self.select_all(shape)
    }

    fn contains(&self, node: NodeId) -> bool {
        self.node(node).is_some()
    }

    fn matches(&self, node: NodeId, shape: &CandidateShape) -> bool {
        self.node(node)
            .map_or(false, |n| shape.matches(&n.tag, &n.attributes))
    }

    fn query_all(&self, node: NodeId, shape: &CandidateShape) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|&id| self.matches(id, shape))
            .collect()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node).and_then(|n| n.attributes.get(name).cloned())
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> bool {
        let Some(target) = self.node_mut(node) else {
            return false;
        };
        if target.attributes.get(name).map(String::as_str) == Some(value) {
            return false;
        }
        target.attributes.insert(name.to_string(), value.to_string());
        self.record(MutationRecord::Attribute {
            target: node,
            name: name.to_string(),
        });
        true
    }

    fn text(&self, node: NodeId) -> String {
        let Some(n) = self.node(node) else {
            return String::new();
        };
        let mut out = n.text.clone();
        for &child in &n.children {
            out.push_str(&self.text(child));
        }
        out
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map_or(false, |value| value.split_whitespace().any(|c| c == class))
    }

    fn set_class(&mut self, node: NodeId, class: &str, on: bool) -> bool {
        if !self.contains(node) || self.has_class(node, class) == on {
            return false;
        }
        let current = self.attribute(node, "class").unwrap_or_default();
        let mut classes: Vec<&str> = current.split_whitespace().filter(|c| *c != class).collect();
        if on {
            classes.push(class);
        }
        let next = classes.join(" ");
        self.set_attribute(node, "class", &next)
    }

    fn affordance(&self, node: NodeId) -> Option<String> {
        let control = self.affordance_node(node)?;
        self.attribute(control, AFFORDANCE_VALUE_ATTR)
    }

    fn attach_affordance(&mut self, node: NodeId, value: &str) {
        if !self.contains(node) {
            return;
        }
        self.detach_affordance(node);
        let control = Element::new("button")
            .class(AFFORDANCE_CLASS)
            .attr("type", "button")
            .attr(AFFORDANCE_VALUE_ATTR, value)
            .text(&format!("Hide: {}", value));
        self.append(node, control);
    }

    fn detach_affordance(&mut self, node: NodeId) -> bool {
        match self.affordance_node(node) {
            Some(control) => self.remove(control),
            None => false,
        }
    }
}

impl ChangeFeed for VirtualDom {
    fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn disconnect(&mut self) {
        self.observing = false;
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_card(title: &str, meta: &str) -> Element {
        Element::new("div")
            .attr("data-test", "search-result")
            .child(Element::new("h3").text(title))
            .child(Element::new("p").text(meta))
    }

    #[test]
    fn test_append_and_select() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let a = dom.append(root, result_card("A", "1.1.2025 | ZDF")).unwrap();
        let b = dom.append(root, result_card("B", "1.1.2025 | ARD")).unwrap();

        let shape = CandidateShape::any().with_attr("data-test", "search-result");
        assert_eq!(dom.candidates(&shape), vec![a, b]);
        assert_eq!(dom.text(a), "A1.1.2025 | ZDF");
        assert_eq!(dom.query(a, &CandidateShape::tag("h3")).map(|h| dom.text(h)), Some("A".to_string()));
    }

    #[test]
    fn test_remove_records_subtree() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let card = dom.append(root, result_card("A", "x")).unwrap();
        dom.take_records();

        assert!(dom.remove(card));
        assert!(!dom.contains(card));
        let records = dom.take_records();
        assert_eq!(records.len(), 1);
        match &records[0] {
            MutationRecord::ChildList { removed, .. } => {
                let tags: Vec<_> = removed.iter().map(|s| s.tag.as_str()).collect();
                assert_eq!(tags, vec!["div", "h3", "p"]);
            }
            other => panic!("unexpected record {:?}", other),
        }
        assert!(!dom.remove(root));
    }

    #[test]
    fn test_set_class_is_idempotent() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let node = dom.append(root, Element::new("li").class("item")).unwrap();
        dom.take_records();

        assert!(dom.set_class(node, "veil-hidden", true));
        assert!(!dom.set_class(node, "veil-hidden", true));
        assert_eq!(dom.attribute(node, "class").as_deref(), Some("item veil-hidden"));
        assert_eq!(dom.take_records().len(), 1);

        assert!(dom.set_class(node, "veil-hidden", false));
        assert!(!dom.set_class(node, "veil-hidden", false));
        assert_eq!(dom.attribute(node, "class").as_deref(), Some("item"));
    }

    #[test]
    fn test_affordance_attach_replace_detach() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        let node = dom.append(root, Element::new("li")).unwrap();

        dom.attach_affordance(node, "Baywatch");
        assert_eq!(dom.affordance(node).as_deref(), Some("Baywatch"));
        dom.attach_affordance(node, "Tatort");
        assert_eq!(dom.affordance(node).as_deref(), Some("Tatort"));
        assert_eq!(dom.children(node).len(), 1);

        assert!(dom.detach_affordance(node));
        assert!(!dom.detach_affordance(node));
        assert_eq!(dom.affordance(node), None);
    }

    #[test]
    fn test_disconnect_stops_recording() {
        let mut dom = VirtualDom::new();
        let root = dom.root();
        dom.append(root, Element::new("li"));
        dom.disconnect();
        assert_eq!(dom.pending_records(), 0);
        dom.append(root, Element::new("li"));
        assert!(dom.take_records().is_empty());

        dom.observe();
        dom.append(root, Element::new("li"));
        assert_eq!(dom.take_records().len(), 1);
    }
}
