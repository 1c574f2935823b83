//! List reconciliation.
//!
//! Brings the item children of a list host in line with an external entry
//! sequence. Unkeyed lists reuse child N for entry N. Keyed lists splice:
//!
//! ```text
//! live:     [a] [b] [c]
//! marked:   [a] (0) [b] (1) [c] (2)      placeholder after every child
//! entries:  c a b                        take first unconsumed match per slot
//! result:   [c] [a] [b]                  3 moves, 0 creates, 0 removes
//! ```
//!
//! The reconciler only edits the document. Removed children are detached and
//! reported, never released, so the caller can dehydrate them first.

use indexmap::IndexMap;

use crate::config::EngineConfig;
use crate::engine::Document;
use crate::engine::attrs;
use crate::engine::vnode::VNode;
use crate::error::EngineError;
use crate::renderer::diagnostics::Diagnostic;
use crate::types::{NodeId, RegionKind};

/// Stand-in element for an entry that could not be materialized, and the
/// slot marker used during keyed splicing.
pub const PLACEHOLDER_TAG: &str = "array-placeholder";

/// One external entry as the list sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListEntry {
    /// Identity used for keyed matching.
    pub id: Option<String>,
    /// Renderer key chosen by `data-component-key`, if any.
    pub component: Option<String>,
}

/// List host configuration relevant to reconciliation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions<'a> {
    pub keyed: bool,
    /// `data-component` of the list, the fallback renderer for every item.
    pub component: Option<&'a str>,
    /// `data-component-key` of the list, for diagnostics.
    pub component_key: Option<&'a str>,
}

/// What one pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListReport {
    pub created: usize,
    pub moved: usize,
    pub removed: usize,
    /// The child occupying each entry slot, in entry order.
    pub placements: Vec<NodeId>,
    pub created_nodes: Vec<NodeId>,
    /// Detached children, still allocated.
    pub removed_nodes: Vec<NodeId>,
}

/// Item templates declared as `<template>` children of the host.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    pub keyed: IndexMap<String, VNode>,
    pub unkeyed: Option<VNode>,
}

impl Templates {
    pub fn is_empty(&self) -> bool {
        self.keyed.is_empty() && self.unkeyed.is_none()
    }
}

// =============================================================================
// Discovery
// =============================================================================

/// Item children owned by a list host, in document order.
///
/// Array items and placeholders at any depth count, except inside templates,
/// ignored subtrees, or other regions.
pub fn item_children(doc: &Document, host: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(host).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        let (Some(tag), Some(attributes)) = (doc.tag(node), doc.attrs(node)) else {
            continue;
        };
        if tag.eq_ignore_ascii_case(attrs::TEMPLATE_TAG) || attributes.contains_key(attrs::IGNORE) {
            continue;
        }
        if tag.eq_ignore_ascii_case(PLACEHOLDER_TAG) {
            out.push(node);
            continue;
        }
        if let Some(kind) = attrs::region_kind(tag, attributes) {
            if kind == Ok(RegionKind::ArrayItem) {
                out.push(node);
            }
            continue;
        }
        stack.extend(doc.children(node).into_iter().rev());
    }
    out
}

/// Collect templates. A template with exactly one element child uses that
/// child; anything else is wrapped in a bare item.
pub fn templates(doc: &Document, host: NodeId) -> Result<Templates, EngineError> {
    let mut found = Templates::default();
    for child in doc.children(host) {
        let is_template = doc
            .tag(child)
            .is_some_and(|tag| tag.eq_ignore_ascii_case(attrs::TEMPLATE_TAG));
        if !is_template || doc.has_attr(child, attrs::IGNORE) {
            continue;
        }
        let elements = doc.element_children(child);
        let template = match elements.as_slice() {
            [only] => doc.to_vnode(*only)?,
            _ => {
                let content = doc
                    .children(child)
                    .into_iter()
                    .map(|node| doc.to_vnode(node))
                    .collect::<Result<Vec<_>, _>>()?;
                VNode::element(attrs::ARRAY_ITEM_TAG).children(content)
            }
        };
        match doc.attr(child, attrs::ID) {
            Some(id) => {
                found.keyed.insert(id.to_string(), template);
            }
            None => found.unkeyed = Some(template),
        }
    }
    Ok(found)
}

/// Deep-copy an item without ignored children (controls and the like).
pub fn clone_item(doc: &mut Document, item: NodeId) -> Result<NodeId, EngineError> {
    let mut snapshot = doc.to_vnode(item)?;
    strip_ignored(&mut snapshot);
    doc.materialize(&snapshot)
}

fn strip_ignored(node: &mut VNode) {
    if let VNode::Element(el) = node {
        el.children
            .retain(|child| child.get_attr(attrs::IGNORE).is_none());
        for child in &mut el.children {
            strip_ignored(child);
        }
    }
}

fn from_template(doc: &mut Document, template: &VNode) -> Result<NodeId, EngineError> {
    let node = doc.materialize(template)?;
    doc.set_attr(node, attrs::EDITABLE, RegionKind::ArrayItem.as_str())?;
    Ok(node)
}

fn child_id(doc: &Document, child: NodeId) -> Option<String> {
    doc.attr(child, attrs::ID)
        .or_else(|| doc.attr(child, attrs::COMPONENT))
        .map(String::from)
}

// =============================================================================
// Reconciliation
// =============================================================================

pub fn reconcile_list(
    doc: &mut Document,
    config: &EngineConfig,
    host: NodeId,
    options: ListOptions<'_>,
    entries: &[ListEntry],
) -> Result<ListReport, EngineError> {
    let templates = templates(doc, host)?;
    let children = item_children(doc, host);
    let report = if options.keyed {
        reconcile_keyed(doc, config, host, options, entries, &templates, &children)?
    } else {
        reconcile_unkeyed(doc, config, host, options, entries.len(), &templates, &children)?
    };
    tracing::trace!(
        %host,
        keyed = options.keyed,
        created = report.created,
        moved = report.moved,
        removed = report.removed,
        "reconciled list"
    );
    Ok(report)
}

fn set_item_attrs(
    doc: &mut Document,
    item: NodeId,
    index: usize,
    len: usize,
    id: Option<&str>,
    component: Option<&str>,
) -> Result<(), EngineError> {
    if let Some(id) = id {
        doc.set_attr(item, attrs::ID, id)?;
    }
    if let Some(component) = component {
        doc.set_attr(item, attrs::COMPONENT, component)?;
    }
    doc.set_attr(item, attrs::PROP, &index.to_string())?;
    doc.set_attr(item, attrs::LENGTH, &len.to_string())?;
    Ok(())
}

fn insert_item(
    doc: &mut Document,
    host: NodeId,
    previous: Option<NodeId>,
    item: NodeId,
) -> Result<(), EngineError> {
    match previous {
        Some(previous) => doc.insert_after(previous, item),
        None => doc.append_child(host, item),
    }
}

fn reconcile_unkeyed(
    doc: &mut Document,
    config: &EngineConfig,
    host: NodeId,
    options: ListOptions<'_>,
    len: usize,
    templates: &Templates,
    children: &[NodeId],
) -> Result<ListReport, EngineError> {
    let mut report = ListReport::default();
    let mut kept: Vec<NodeId> = children.to_vec();
    while kept.len() > len {
        if let Some(extra) = kept.pop() {
            doc.detach(extra)?;
            report.removed_nodes.push(extra);
        }
    }

    for index in 0..len {
        let item = match kept.get(index) {
            Some(existing) => *existing,
            None => {
                let item = if let Some(template) = &templates.unkeyed {
                    from_template(doc, template)?
                } else if options.component.is_some() {
                    doc.create_element(attrs::ARRAY_ITEM_TAG)
                } else if let Some(sample) = children.first() {
                    clone_item(doc, *sample)?
                } else {
                    missing_item(doc, config, options, None)?
                };
                insert_item(doc, host, report.placements.last().copied(), item)?;
                report.created_nodes.push(item);
                item
            }
        };
        set_item_attrs(doc, item, index, len, None, options.component)?;
        report.placements.push(item);
    }

    report.created = report.created_nodes.len();
    report.removed = report.removed_nodes.len();
    Ok(report)
}

fn reconcile_keyed(
    doc: &mut Document,
    config: &EngineConfig,
    host: NodeId,
    options: ListOptions<'_>,
    entries: &[ListEntry],
    templates: &Templates,
    children: &[NodeId],
) -> Result<ListReport, EngineError> {
    let mut report = ListReport::default();
    let len = entries.len();
    let child_ids: Vec<Option<String>> = children.iter().map(|c| child_id(doc, *c)).collect();
    let entry_ids: Vec<Option<String>> = entries.iter().map(|e| e.id.clone()).collect();

    if child_ids == entry_ids {
        for (index, (child, entry)) in children.iter().zip(entries).enumerate() {
            let component = entry.component.as_deref().or(options.component);
            set_item_attrs(doc, *child, index, len, entry.id.as_deref(), component)?;
            report.placements.push(*child);
        }
        return Ok(report);
    }

    let mut placeholders = Vec::with_capacity(children.len());
    for child in children {
        let placeholder = doc.create_element(PLACEHOLDER_TAG);
        doc.insert_after(*child, placeholder)?;
        placeholders.push(placeholder);
    }

    let mut consumed = vec![false; children.len()];
    for (index, entry) in entries.iter().enumerate() {
        let component = entry.component.as_deref().or(options.component);
        // Entries without an id never claim a live child.
        let matched = entry.id.as_ref().and_then(|_| {
            (0..children.len()).find(|j| !consumed[*j] && child_ids[*j] == entry.id)
        });

        let item = match matched {
            Some(j) => {
                consumed[j] = true;
                children[j]
            }
            None => {
                let item = materialize_keyed(
                    doc, config, options, entry, component, templates, children, &child_ids,
                )?;
                report.created_nodes.push(item);
                item
            }
        };
        set_item_attrs(doc, item, index, len, entry.id.as_deref(), component)?;

        let relocated = match placeholders.get(index) {
            Some(placeholder) if children[index] == item => {
                doc.release(*placeholder)?;
                false
            }
            Some(placeholder) => {
                doc.replace(*placeholder, item)?;
                doc.release(*placeholder)?;
                true
            }
            None => {
                insert_item(doc, host, report.placements.last().copied(), item)?;
                true
            }
        };
        if relocated && matched.is_some() {
            report.moved += 1;
        }
        report.placements.push(item);
    }

    for (j, child) in children.iter().enumerate() {
        if !consumed[j] {
            doc.detach(*child)?;
            report.removed_nodes.push(*child);
        }
    }
    for placeholder in placeholders.into_iter().skip(len) {
        doc.release(placeholder)?;
    }

    report.created = report.created_nodes.len();
    report.removed = report.removed_nodes.len();
    Ok(report)
}

#[allow(clippy::too_many_arguments)]
fn materialize_keyed(
    doc: &mut Document,
    config: &EngineConfig,
    options: ListOptions<'_>,
    entry: &ListEntry,
    component: Option<&str>,
    templates: &Templates,
    children: &[NodeId],
    child_ids: &[Option<String>],
) -> Result<NodeId, EngineError> {
    let keyed = entry.id.as_ref().and_then(|id| templates.keyed.get(id));
    if let Some(template) = keyed.or(templates.unkeyed.as_ref()) {
        return from_template(doc, template);
    }
    let sample = children
        .iter()
        .zip(child_ids)
        .find(|(_, id)| **id == entry.id)
        .map(|(child, _)| *child);
    if let Some(sample) = sample {
        return clone_item(doc, sample);
    }
    if component.is_some() {
        return Ok(doc.create_element(attrs::ARRAY_ITEM_TAG));
    }
    missing_item(doc, config, options, entry.id.as_deref())
}

/// A placeholder carrying a card that explains why the entry has no item.
fn missing_item(
    doc: &mut Document,
    config: &EngineConfig,
    options: ListOptions<'_>,
    id: Option<&str>,
) -> Result<NodeId, EngineError> {
    let id = id.unwrap_or_default();
    let diagnostic = match options.component_key {
        Some(component_key) => Diagnostic::new(
            "Failed to render array item",
            "Array editable region has no child with a matching 'data-id' value for this element and the value has no key matching the 'data-component-key' attribute. Please check that the 'data-component-key' attribute for this element is correct and that each element has an entry for that key, or provide a fallback 'data-component' attribute.",
        )
        .with_hint(format!(
            "This may mean that the value for 'data-component-key' is incorrect or that your array data is incorrectly formatted. The current value for 'data-component-key' is '{component_key}' and the current value for 'data-id' is '{id}'."
        )),
        None => Diagnostic::new(
            "Failed to render array item",
            "Array editable region has no child with a matching 'data-id' value for this element and no 'data-component' or 'data-component-key' attribute. Please save and rebuild to see your changes or add a 'data-component' or 'data-component-key' attribute to this element.",
        )
        .with_hint(format!("The full value of \"data-id\" for this item is \"{id}\"")),
    };
    tracing::warn!(id, "no item available for list entry");
    let placeholder =
        VNode::element(PLACEHOLDER_TAG).child(diagnostic.to_vnode(config.stack_lines));
    doc.materialize(&placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> VNode {
        VNode::element("li")
            .attr("data-editable", "array-item")
            .attr("data-id", id)
            .child(VNode::text(id))
    }

    fn setup(children: Vec<VNode>) -> (Document, NodeId, EngineConfig) {
        let mut doc = Document::new();
        let host = doc
            .materialize(&VNode::element("ul").attr("data-editable", "array").children(children))
            .unwrap();
        let root = doc.root();
        doc.append_child(root, host).unwrap();
        (doc, host, EngineConfig::default())
    }

    fn keyed(ids: &[&str]) -> Vec<ListEntry> {
        ids.iter()
            .map(|id| ListEntry {
                id: Some(id.to_string()),
                component: None,
            })
            .collect()
    }

    fn ids(doc: &Document, host: NodeId) -> Vec<String> {
        item_children(doc, host)
            .into_iter()
            .map(|c| doc.attr(c, "data-id").unwrap_or_default().to_string())
            .collect()
    }

    const KEYED: ListOptions<'static> = ListOptions {
        keyed: true,
        component: None,
        component_key: None,
    };

    #[test]
    fn test_keyed_rotation_only_moves() {
        let (mut doc, host, config) = setup(vec![item("a"), item("b"), item("c")]);
        let before = item_children(&doc, host);

        let report =
            reconcile_list(&mut doc, &config, host, KEYED, &keyed(&["c", "a", "b"])).unwrap();

        assert_eq!(ids(&doc, host), vec!["c", "a", "b"]);
        assert_eq!((report.created, report.removed), (0, 0));
        assert_eq!(report.moved, 3);
        assert_eq!(report.placements, vec![before[2], before[0], before[1]]);
        assert!(doc.children(host).iter().all(|c| doc.tag(*c) != Some(PLACEHOLDER_TAG)));
    }

    #[test]
    fn test_keyed_replace_tail() {
        let (mut doc, host, config) = setup(vec![item("a"), item("b")]);
        let a = item_children(&doc, host)[0];
        let mutations = doc.mutation_count();

        let report = reconcile_list(&mut doc, &config, host, KEYED, &keyed(&["a", "c"])).unwrap();

        assert_eq!((report.created, report.removed, report.moved), (1, 1, 0));
        assert_eq!(report.placements[0], a);
        assert_eq!(ids(&doc, host), vec!["a", "c"]);
        assert!(doc.mutation_count() > mutations);
        assert_eq!(doc.attr(report.placements[1], "data-prop"), Some("1"));
    }

    #[test]
    fn test_keyed_identical_only_sets_attributes() {
        let (mut doc, host, config) = setup(vec![item("a"), item("b")]);
        let report = reconcile_list(&mut doc, &config, host, KEYED, &keyed(&["a", "b"])).unwrap();
        assert_eq!((report.created, report.removed, report.moved), (0, 0, 0));
        let second = report.placements[1];
        assert_eq!(doc.attr(second, "data-length"), Some("2"));
    }

    #[test]
    fn test_keyed_duplicates_are_stable() {
        let (mut doc, host, config) = setup(vec![item("a"), item("a"), item("b")]);
        let before = item_children(&doc, host);
        let report =
            reconcile_list(&mut doc, &config, host, KEYED, &keyed(&["b", "a", "a"])).unwrap();
        assert_eq!(report.placements, vec![before[2], before[0], before[1]]);
    }

    #[test]
    fn test_keyed_entry_without_id_does_not_claim_idless_child() {
        let plain = VNode::element("li")
            .attr("data-editable", "array-item")
            .child(VNode::text("plain"));
        let (mut doc, host, config) = setup(vec![item("a"), plain]);
        let before = item_children(&doc, host);
        let entries = vec![
            ListEntry::default(),
            ListEntry {
                id: Some("a".into()),
                component: None,
            },
        ];

        let report = reconcile_list(&mut doc, &config, host, KEYED, &entries).unwrap();

        assert_eq!((report.created, report.moved, report.removed), (1, 1, 1));
        assert_eq!(report.placements[1], before[0]);
        assert_ne!(report.placements[0], before[1]);
        assert_eq!(report.removed_nodes, vec![before[1]]);
        assert_eq!(doc.text_content(report.placements[0]), "plain");
        assert_eq!(item_children(&doc, host), report.placements);
    }

    #[test]
    fn test_unkeyed_extends_from_template() {
        let template =
            VNode::element("template").child(VNode::element("li").child(VNode::text("new")));
        let (mut doc, host, config) = setup(vec![
            template,
            VNode::element("li").attr("data-editable", "array-item"),
            VNode::element("li").attr("data-editable", "array-item"),
        ]);
        let entries = vec![ListEntry::default(); 3];
        let report =
            reconcile_list(&mut doc, &config, host, ListOptions::default(), &entries).unwrap();

        assert_eq!(report.created, 1);
        let third = report.placements[2];
        assert_eq!(doc.text_content(third), "new");
        assert_eq!(doc.attr(third, "data-prop"), Some("2"));
        assert_eq!(doc.attr(third, "data-length"), Some("3"));
        assert_eq!(doc.attr(third, "data-editable"), Some("array-item"));
    }

    #[test]
    fn test_unkeyed_truncates() {
        let (mut doc, host, config) = setup(vec![item("a"), item("b"), item("c")]);
        let entries = [ListEntry::default()];
        let report =
            reconcile_list(&mut doc, &config, host, ListOptions::default(), &entries).unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(item_children(&doc, host).len(), 1);
        assert!(report.removed_nodes.iter().all(|n| doc.contains(*n) && !doc.is_attached(*n)));
    }

    #[test]
    fn test_missing_item_becomes_placeholder_card() {
        let (mut doc, host, config) = setup(vec![item("a")]);
        let report = reconcile_list(&mut doc, &config, host, KEYED, &keyed(&["a", "z"])).unwrap();
        let placeholder = report.placements[1];
        assert_eq!(doc.tag(placeholder), Some(PLACEHOLDER_TAG));
        let card = doc.first_child(placeholder).unwrap();
        assert_eq!(doc.attr(card, "heading"), Some("Failed to render array item"));
        assert_eq!(ids(&doc, host), vec!["a", "z"]);
    }

    #[test]
    fn test_item_children_skip_nested_regions_and_templates() {
        let nested = VNode::element("div")
            .attr("data-editable", "array")
            .child(VNode::element("li").attr("data-editable", "array-item"));
        let wrapper = VNode::element("div").child(item("deep"));
        let template = VNode::element("template").child(item("t"));
        let (doc, host, _) = setup(vec![item("a"), nested, wrapper, template]);
        assert_eq!(ids(&doc, host), vec!["a", "deep"]);
    }
}
