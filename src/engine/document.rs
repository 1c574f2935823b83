//! Live document arena.
//!
//! Element and text nodes live in a slot vector with a free pool for O(1)
//! reuse. Each slot carries a generation counter so a [`NodeId`] issued for a
//! released node never resolves to whatever later reuses the slot.
//!
//! Siblings form a doubly linked list (parent, first/last child, prev/next
//! sibling), which keeps the reconcilers' cursor walks and splices O(1).

use indexmap::IndexMap;

use super::vnode::{VElement, VNode};
use crate::error::EngineError;
use crate::types::NodeId;

// =============================================================================
// Node Storage
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element {
        tag: String,
        attrs: IndexMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

/// The live document tree.
#[derive(Debug)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
    mutations: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an empty `body` root element.
    pub fn new() -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
            mutations: 0,
        };
        doc.root = doc.allocate(NodeKind::Element {
            tag: "body".to_string(),
            attrs: IndexMap::new(),
        });
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Total number of mutations applied since creation.
    pub fn mutation_count(&self) -> u64 {
        self.mutations
    }

    /// Number of live (allocated) nodes, attached or not.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.node.is_some()).count()
    }

    // =========================================================================
    // Allocation
    // =========================================================================

    fn allocate(&mut self, kind: NodeKind) -> NodeId {
        let data = NodeData::new(kind);
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(data);
            NodeId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(data),
            });
            NodeId {
                index,
                generation: 0,
            }
        }
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Element {
            tag: tag.into(),
            attrs: IndexMap::new(),
        })
    }

    pub fn create_text(&mut self, content: impl Into<String>) -> NodeId {
        self.allocate(NodeKind::Text(content.into()))
    }

    /// Release a node and its whole subtree back to the pool.
    ///
    /// The node is detached first. Releasing the root is refused.
    pub fn release(&mut self, id: NodeId) -> Result<(), EngineError> {
        if id == self.root {
            return Err(EngineError::IllegalState("cannot release the document root".into()));
        }
        self.detach(id)?;
        for node in self.descendants(id) {
            let slot = &mut self.slots[node.index()];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        Ok(())
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut NodeData, EngineError> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(EngineError::StaleNode(id))
    }

    fn node(&self, id: NodeId) -> Result<&NodeData, EngineError> {
        self.get(id).ok_or(EngineError::StaleNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Whether the node is reachable from the document root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.get(node).and_then(|data| data.parent);
        }
        false
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|data| &data.kind)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Text(_)))
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn attrs(&self, id: NodeId) -> Option<&IndexMap<String, String>> {
        match self.kind(id)? {
            NodeKind::Element { attrs, .. } => Some(attrs),
            NodeKind::Text(_) => None,
        }
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)?.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attr(id, "class")
            .map(|class| class.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).contains(&class)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cursor = self.first_child(id);
        while let Some(child) = cursor {
            out.push(child);
            cursor = self.next_sibling(child);
        }
        out
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .into_iter()
            .filter(|child| self.is_element(*child))
            .collect()
    }

    /// Strict ancestors, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(node) = current {
            out.push(node);
            current = self.parent(node);
        }
        out
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// The node and every descendant in document (pre-)order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let mut children = self.children(node);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// First descendant (excluding `id` itself) matching the predicate.
    pub fn find_descendant(
        &self,
        id: NodeId,
        predicate: impl Fn(&Document, NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .skip(1)
            .find(|node| predicate(self, *node))
    }

    /// First direct element child with the given tag.
    pub fn child_by_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.children(id)
            .into_iter()
            .find(|child| self.tag(*child).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    // =========================================================================
    // Content Mutation
    // =========================================================================

    /// Overwrite a text node's content. Returns whether anything changed.
    pub fn set_text(&mut self, id: NodeId, content: &str) -> Result<bool, EngineError> {
        let data = self.get_mut(id)?;
        let NodeKind::Text(text) = &mut data.kind else {
            return Err(EngineError::IllegalState(format!("{id} is not a text node")));
        };
        if text == content {
            return Ok(false);
        }
        *text = content.to_string();
        self.mutations += 1;
        Ok(true)
    }

    /// Replace an element's children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, content: &str) -> Result<bool, EngineError> {
        let children = self.children(id);
        if let [only] = children.as_slice()
            && self.is_text(*only)
        {
            return self.set_text(*only, content);
        }
        for child in children {
            self.release(child)?;
        }
        let text = self.create_text(content);
        self.append_child(id, text)?;
        Ok(true)
    }

    fn attrs_mut(&mut self, id: NodeId) -> Result<&mut IndexMap<String, String>, EngineError> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Element { attrs, .. } => Ok(attrs),
            NodeKind::Text(_) => Err(EngineError::IllegalState(format!(
                "{id} is a text node and has no attributes"
            ))),
        }
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> Result<bool, EngineError> {
        let attrs = self.attrs_mut(id)?;
        if attrs.get(name).is_some_and(|current| current == value) {
            return Ok(false);
        }
        attrs.insert(name.to_string(), value.to_string());
        self.mutations += 1;
        Ok(true)
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Result<bool, EngineError> {
        let removed = self.attrs_mut(id)?.shift_remove(name).is_some();
        if removed {
            self.mutations += 1;
        }
        Ok(removed)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<bool, EngineError> {
        if self.has_class(id, class) {
            return Ok(false);
        }
        let mut classes: Vec<String> = self.classes(id).into_iter().map(String::from).collect();
        classes.push(class.to_string());
        self.set_attr(id, "class", &classes.join(" "))
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<bool, EngineError> {
        if !self.has_class(id, class) {
            return Ok(false);
        }
        let remaining: Vec<String> = self
            .classes(id)
            .into_iter()
            .filter(|c| *c != class)
            .map(String::from)
            .collect();
        if remaining.is_empty() {
            self.remove_attr(id, "class")
        } else {
            self.set_attr(id, "class", &remaining.join(" "))
        }
    }

    // =========================================================================
    // Structural Mutation
    // =========================================================================

    /// Unlink a node from its parent. No-op when already detached.
    pub fn detach(&mut self, id: NodeId) -> Result<(), EngineError> {
        let data = self.node(id)?;
        let Some(parent) = data.parent else {
            return Ok(());
        };
        let (prev, next) = (data.prev_sibling, data.next_sibling);

        match prev {
            Some(prev) => self.get_mut(prev)?.next_sibling = next,
            None => self.get_mut(parent)?.first_child = next,
        }
        match next {
            Some(next) => self.get_mut(next)?.prev_sibling = prev,
            None => self.get_mut(parent)?.last_child = prev,
        }

        let data = self.get_mut(id)?;
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
        self.mutations += 1;
        Ok(())
    }

    /// Insert `child` under `parent` before `reference` (append when `None`).
    ///
    /// The child is detached from wherever it currently lives.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), EngineError> {
        if !self.is_element(parent) {
            return Err(EngineError::IllegalState(format!(
                "{parent} cannot have children"
            )));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(EngineError::IllegalState(format!(
                "inserting {child} under {parent} would create a cycle"
            )));
        }
        if reference == Some(child) {
            return Ok(());
        }
        if let Some(reference) = reference
            && self.parent(reference) != Some(parent)
        {
            return Err(EngineError::IllegalState(format!(
                "{reference} is not a child of {parent}"
            )));
        }

        self.detach(child)?;

        let prev = match reference {
            Some(reference) => self.node(reference)?.prev_sibling,
            None => self.node(parent)?.last_child,
        };

        {
            let data = self.get_mut(child)?;
            data.parent = Some(parent);
            data.prev_sibling = prev;
            data.next_sibling = reference;
        }
        match prev {
            Some(prev) => self.get_mut(prev)?.next_sibling = Some(child),
            None => self.get_mut(parent)?.first_child = Some(child),
        }
        match reference {
            Some(reference) => self.get_mut(reference)?.prev_sibling = Some(child),
            None => self.get_mut(parent)?.last_child = Some(child),
        }
        self.mutations += 1;
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), EngineError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` directly after `reference` under the same parent.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) -> Result<(), EngineError> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| EngineError::IllegalState(format!("{reference} has no parent")))?;
        let next = self.next_sibling(reference);
        self.insert_before(parent, child, next)
    }

    /// Put `replacement` where `old` is and detach `old` (without releasing it).
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> Result<(), EngineError> {
        let parent = self
            .parent(old)
            .ok_or_else(|| EngineError::IllegalState(format!("{old} has no parent")))?;
        self.insert_before(parent, replacement, Some(old))?;
        self.detach(old)
    }

    /// Move every child of `from` in front of `reference` under `to`.
    pub fn move_children(
        &mut self,
        from: NodeId,
        to: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), EngineError> {
        for child in self.children(from) {
            self.insert_before(to, child, reference)?;
        }
        Ok(())
    }

    // =========================================================================
    // Subtree Conversion
    // =========================================================================

    /// Build detached live nodes from a rendered description.
    pub fn materialize(&mut self, vnode: &VNode) -> Result<NodeId, EngineError> {
        match vnode {
            VNode::Text(text) => Ok(self.create_text(text.as_str())),
            VNode::Element(el) => {
                let id = self.allocate(NodeKind::Element {
                    tag: el.tag.clone(),
                    attrs: el.attrs.clone(),
                });
                for child in &el.children {
                    let child = self.materialize(child)?;
                    self.append_child(id, child)?;
                }
                Ok(id)
            }
        }
    }

    /// Snapshot a live subtree.
    pub fn to_vnode(&self, id: NodeId) -> Result<VNode, EngineError> {
        match &self.node(id)?.kind {
            NodeKind::Text(text) => Ok(VNode::Text(text.clone())),
            NodeKind::Element { tag, attrs } => {
                let children = self
                    .children(id)
                    .into_iter()
                    .map(|child| self.to_vnode(child))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(VNode::Element(VElement {
                    tag: tag.clone(),
                    attrs: attrs.clone(),
                    children,
                }))
            }
        }
    }

    /// Deep-copy a subtree into new detached nodes.
    pub fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId, EngineError> {
        let snapshot = self.to_vnode(id)?;
        self.materialize(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Document {
        Document::new()
    }

    #[test]
    fn test_append_and_navigate() {
        let mut doc = setup();
        let root = doc.root();
        let a = doc.create_element("p");
        let b = doc.create_text("hi");
        let c = doc.create_element("span");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();
        doc.insert_before(root, c, Some(b)).unwrap();

        assert_eq!(doc.children(root), vec![a, c, b]);
        assert_eq!(doc.prev_sibling(b), Some(c));
        assert_eq!(doc.next_sibling(a), Some(c));
        assert_eq!(doc.last_child(root), Some(b));
        assert!(doc.is_attached(c));
    }

    #[test]
    fn test_release_invalidates_handles() {
        let mut doc = setup();
        let root = doc.root();
        let el = doc.create_element("div");
        let inner = doc.create_text("x");
        doc.append_child(el, inner).unwrap();
        doc.append_child(root, el).unwrap();

        doc.release(el).unwrap();
        assert!(!doc.contains(el));
        assert!(!doc.contains(inner));
        assert!(doc.children(root).is_empty());

        // Slot is reused with a new generation
        let reused = doc.create_element("div");
        assert!(reused.index() == el.index() || reused.index() == inner.index());
        assert_ne!(reused, el);
        assert_eq!(doc.set_attr(el, "a", "b"), Err(EngineError::StaleNode(el)));
    }

    #[test]
    fn test_attr_changes_are_counted_once() {
        let mut doc = setup();
        let el = doc.create_element("div");
        let before = doc.mutation_count();
        assert!(doc.set_attr(el, "data-prop", "title").unwrap());
        assert!(!doc.set_attr(el, "data-prop", "title").unwrap());
        assert_eq!(doc.mutation_count(), before + 1);

        assert!(doc.add_class(el, "errored").unwrap());
        assert!(!doc.add_class(el, "errored").unwrap());
        assert!(doc.remove_class(el, "errored").unwrap());
        assert_eq!(doc.attr(el, "class"), None);
    }

    #[test]
    fn test_insert_cycle_rejected() {
        let mut doc = setup();
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(outer, inner).unwrap();
        assert!(doc.append_child(inner, outer).is_err());
    }

    #[test]
    fn test_materialize_and_snapshot() {
        let mut doc = setup();
        let vnode = VNode::element("ul")
            .attr("class", "list")
            .child(VNode::element("li").child(VNode::text("one")))
            .child(VNode::element("li").child(VNode::text("two")));
        let id = doc.materialize(&vnode).unwrap();
        assert_eq!(doc.to_vnode(id).unwrap(), vnode);
        assert_eq!(doc.text_content(id), "onetwo");

        let copy = doc.clone_subtree(id).unwrap();
        assert_ne!(copy, id);
        assert_eq!(doc.to_vnode(copy).unwrap(), vnode);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut doc = setup();
        let root = doc.root();
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        let c = doc.create_element("c");
        doc.append_child(root, a).unwrap();
        doc.append_child(root, b).unwrap();
        doc.replace(a, c).unwrap();
        assert_eq!(doc.children(root), vec![c, b]);
        assert_eq!(doc.parent(a), None);
    }

    #[test]
    fn test_set_text_content_reuses_single_text() {
        let mut doc = setup();
        let el = doc.materialize(&VNode::element("p").child(VNode::text("a"))).unwrap();
        let text = doc.first_child(el).unwrap();
        doc.set_text_content(el, "b").unwrap();
        assert_eq!(doc.first_child(el), Some(text));
        assert_eq!(doc.text(text), Some("b"));
    }
}
