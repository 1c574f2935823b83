//! Binding Registry - side table from host nodes to binding nodes.
//!
//! Hosts never carry engine state themselves. Every hydrated host has exactly
//! one entry here; an element with a region attribute but no entry is
//! "not initialized" as far as the reconciler is concerned.

use std::cell::RefCell;
use std::collections::HashMap;

use super::document::Document;
use crate::regions::binding::BindingNode;
use crate::types::NodeId;

// =============================================================================
// Registry
// =============================================================================

#[derive(Default)]
pub struct Registry {
    nodes: RefCell<HashMap<NodeId, BindingNode>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding node for its host. Returns the node it replaced.
    pub fn insert(&self, node: BindingNode) -> Option<BindingNode> {
        self.nodes.borrow_mut().insert(node.host(), node)
    }

    pub fn get(&self, host: NodeId) -> Option<BindingNode> {
        self.nodes.borrow().get(&host).cloned()
    }

    pub fn remove(&self, host: NodeId) -> Option<BindingNode> {
        self.nodes.borrow_mut().remove(&host)
    }

    pub fn contains(&self, host: NodeId) -> bool {
        self.nodes.borrow().contains_key(&host)
    }

    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Nearest strict ancestor of `host` that has a binding node.
    pub fn nearest_ancestor(&self, doc: &Document, host: NodeId) -> Option<BindingNode> {
        let nodes = self.nodes.borrow();
        doc.ancestors(host)
            .into_iter()
            .find_map(|ancestor| nodes.get(&ancestor).cloned())
    }

    /// Remove every entry. Used on teardown to break reference cycles.
    pub fn drain(&self) -> Vec<BindingNode> {
        self.nodes.borrow_mut().drain().map(|(_, node)| node).collect()
    }
}
