//! Host tree backed by a snapshot of the page's candidates
//!
//! The page script locates candidate containers itself and hands over one
//! [`HostItem`] per container. Every edit a render pass makes is recorded as
//! a [`HostOp`] for the script to replay against the live page.

use std::collections::{BTreeSet, HashMap};

use veil_core::tree::{CandidateShape, ChangeFeed, MutationRecord, NodeId, Tree};

/// Attribute names the host exposes the extracted values under.
pub const TITLE_ATTR: &str = "title";
pub const GROUP_ATTR: &str = "group";

/// One candidate as reported by the page script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostItem {
    pub id: u32,
    pub title: String,
    pub group_key: String,
    pub classes: BTreeSet<String>,
    pub affordance: Option<String>,
}

/// An edit for the page script to replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOp {
    AddClass { id: u32, class: String },
    RemoveClass { id: u32, class: String },
    Attach { id: u32, value: String },
    Detach { id: u32 },
}

impl HostOp {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddClass { .. } => "addClass",
            Self::RemoveClass { .. } => "removeClass",
            Self::Attach { .. } => "attach",
            Self::Detach { .. } => "detach",
        }
    }

    pub fn id(&self) -> u32 {
        match self {
            Self::AddClass { id, .. }
            | Self::RemoveClass { id, .. }
            | Self::Attach { id, .. }
            | Self::Detach { id } => *id,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::AddClass { class, .. } | Self::RemoveClass { class, .. } => Some(class),
            Self::Attach { value, .. } => Some(value),
            Self::Detach { .. } => None,
        }
    }
}

#[derive(Debug)]
pub struct HostTree {
    items: Vec<HostItem>,
    /// Item id to position in `items`
    index: HashMap<u32, usize>,
    ops: Vec<HostOp>,
    connected: bool,
}

impl Default for HostTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTree {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
            ops: Vec::new(),
            connected: true,
        }
    }

    /// Replace the snapshot. Ops from the previous snapshot are dropped.
    /// A repeated id keeps its first item.
    pub fn load(&mut self, items: Vec<HostItem>) {
        self.index.clear();
        self.items.clear();
        for item in items {
            if self.index.contains_key(&item.id) {
                log::warn!("Ignoring duplicate candidate id {}", item.id);
                continue;
            }
            self.index.insert(item.id, self.items.len());
            self.items.push(item);
        }
        self.ops.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    fn item(&self, node: NodeId) -> Option<&HostItem> {
        self.index.get(&node.0).and_then(|&pos| self.items.get(pos))
    }

    fn item_mut(&mut self, node: NodeId) -> Option<&mut HostItem> {
        let pos = *self.index.get(&node.0)?;
        self.items.get_mut(pos)
    }
}

impl Tree for HostTree {
    fn candidates(&self, _shape: &CandidateShape) -> Vec<NodeId> {
        self.items.iter().map(|item| NodeId(item.id)).collect()
    }

    fn contains(&self, node: NodeId) -> bool {
        self.item(node).is_some()
    }

    fn matches(&self, node: NodeId, _shape: &CandidateShape) -> bool {
        self.contains(node)
    }

    fn query_all(&self, _node: NodeId, _shape: &CandidateShape) -> Vec<NodeId> {
        Vec::new()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let item = self.item(node)?;
        match name {
            TITLE_ATTR => Some(item.title.clone()),
            GROUP_ATTR => Some(item.group_key.clone()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, _node: NodeId, _name: &str, _value: &str) -> bool {
        false
    }

    fn text(&self, node: NodeId) -> String {
        self.item(node).map(|item| item.title.clone()).unwrap_or_default()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.item(node).map_or(false, |item| item.classes.contains(class))
    }

    fn set_class(&mut self, node: NodeId, class: &str, on: bool) -> bool {
        let Some(item) = self.item_mut(node) else {
            return false;
        };
        let changed = if on {
            item.classes.insert(class.to_string())
        } else {
            item.classes.remove(class)
        };
        if changed {
            let class = class.to_string();
            self.ops.push(if on {
                HostOp::AddClass { id: node.0, class }
            } else {
                HostOp::RemoveClass { id: node.0, class }
            });
        }
        changed
    }

    fn affordance(&self, node: NodeId) -> Option<String> {
        self.item(node).and_then(|item| item.affordance.clone())
    }

    fn attach_affordance(&mut self, node: NodeId, value: &str) {
        let Some(item) = self.item_mut(node) else {
            return;
        };
        item.affordance = Some(value.to_string());
        self.ops.push(HostOp::Attach {
            id: node.0,
            value: value.to_string(),
        });
    }

    fn detach_affordance(&mut self, node: NodeId) -> bool {
        let Some(item) = self.item_mut(node) else {
            return false;
        };
        if item.affordance.take().is_none() {
            return false;
        }
        self.ops.push(HostOp::Detach { id: node.0 });
        true
    }
}

impl ChangeFeed for HostTree {
    /// The page script filters structural changes before notifying, so the
    /// host never has records of its own.
    fn take_records(&mut self) -> Vec<MutationRecord> {
        Vec::new()
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}
