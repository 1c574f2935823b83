//! Tree reconciliation.
//!
//! Patches the live children of a host against a rendered [`VNode`] list
//! with a paired walk over both sibling sequences. Plain elements are synced
//! in place and recursed into; regions are kept whenever their configuration
//! is unchanged so their bindings (and any focused editor) survive a
//! re-render.
//!
//! Re-running a patch against the output it was just patched to performs no
//! mutations.

use crate::config::EngineConfig;
use crate::engine::Document;
use crate::engine::attrs;
use crate::engine::env::Env;
use crate::engine::vnode::{VElement, VNode};
use crate::error::EngineError;
use crate::types::NodeId;

/// What the reconciler needs to know about live regions.
pub trait ReconcileContext {
    /// The node is hydrated (has a binding node).
    fn is_bound(&self, node: NodeId) -> bool;
    fn is_focused(&self, node: NodeId) -> bool;
}

impl ReconcileContext for Env {
    fn is_bound(&self, node: NodeId) -> bool {
        self.registry().contains(node)
    }

    fn is_focused(&self, node: NodeId) -> bool {
        self.focus().is_focused(node)
    }
}

/// Outcome of one patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub mutations: u64,
    /// Newly materialized subtrees, still to be hydrated.
    pub inserted: Vec<NodeId>,
    /// Detached subtrees, still to be dehydrated and released.
    pub removed: Vec<NodeId>,
    /// Kept regions whose listeners should receive the current value.
    pub forwards: Vec<NodeId>,
}

pub fn patch_children(
    doc: &mut Document,
    config: &EngineConfig,
    ctx: &dyn ReconcileContext,
    parent: NodeId,
    rendered: &[VNode],
) -> Result<PatchReport, EngineError> {
    let before = doc.mutation_count();
    let mut report = PatchReport::default();
    Patcher {
        doc,
        config,
        ctx,
        report: &mut report,
    }
    .children(parent, rendered)?;
    report.mutations = doc.mutation_count() - before;
    Ok(report)
}

struct Patcher<'a> {
    doc: &'a mut Document,
    config: &'a EngineConfig,
    ctx: &'a dyn ReconcileContext,
    report: &'a mut PatchReport,
}

impl Patcher<'_> {
    fn children(&mut self, parent: NodeId, rendered: &[VNode]) -> Result<(), EngineError> {
        let live = self.doc.children(parent);
        let (mut li, mut ri) = (0, 0);

        loop {
            match (live.get(li).copied(), rendered.get(ri)) {
                (None, None) => return Ok(()),
                (Some(extra), None) => {
                    self.remove(extra)?;
                    li += 1;
                }
                (None, Some(missing)) => {
                    let node = self.doc.materialize(missing)?;
                    self.doc.append_child(parent, node)?;
                    self.report.inserted.push(node);
                    ri += 1;
                }
                (Some(target), Some(VNode::Text(text))) if self.doc.is_element(target) => {
                    let node = self.doc.create_text(text.as_str());
                    self.doc.insert_before(parent, node, Some(target))?;
                    ri += 1;
                }
                (Some(target), Some(VNode::Element(_))) if !self.doc.is_element(target) => {
                    self.remove(target)?;
                    li += 1;
                }
                (Some(target), Some(VNode::Text(text))) => {
                    self.doc.set_text(target, text)?;
                    li += 1;
                    ri += 1;
                }
                (Some(target), Some(render @ VNode::Element(el))) => {
                    self.element(target, render, el)?;
                    li += 1;
                    ri += 1;
                }
            }
        }
    }

    fn element(
        &mut self,
        target: NodeId,
        render: &VNode,
        el: &VElement,
    ) -> Result<(), EngineError> {
        let (same_tag, target_kind, same_config) = {
            let tag = self.doc.tag(target).unwrap_or_default();
            let live_attrs = self.doc.attrs(target).cloned().unwrap_or_default();
            (
                tag.eq_ignore_ascii_case(&el.tag),
                attrs::region_kind(tag, &live_attrs),
                attrs::same_config(&live_attrs, &el.attrs),
            )
        };
        if !same_tag {
            return self.replace(target, render);
        }

        let render_kind = attrs::region_kind(&el.tag, &el.attrs);
        if target_kind.is_none() && render_kind.is_none() {
            self.sync_exact(target, el)?;
            return self.children(target, &el.children);
        }

        if target_kind != render_kind || !same_config || !self.ctx.is_bound(target) {
            return self.replace(target, render);
        }

        let text_like = matches!(target_kind, Some(Ok(kind)) if kind.is_text_like());
        if text_like && !self.ctx.is_focused(target) && !self.content_identical(target, render)? {
            return self.replace(target, render);
        }

        self.sync_region(target, el)?;
        self.report.forwards.push(target);
        tracing::trace!(node = %target, kind = ?target_kind, "kept region");
        Ok(())
    }

    fn remove(&mut self, node: NodeId) -> Result<(), EngineError> {
        self.doc.detach(node)?;
        self.report.removed.push(node);
        Ok(())
    }

    fn replace(&mut self, target: NodeId, render: &VNode) -> Result<(), EngineError> {
        let node = self.doc.materialize(render)?;
        self.doc.replace(target, node)?;
        self.report.removed.push(target);
        self.report.inserted.push(node);
        Ok(())
    }

    /// Make the live attributes exactly the rendered ones.
    fn sync_exact(&mut self, target: NodeId, el: &VElement) -> Result<(), EngineError> {
        for (name, value) in &el.attrs {
            self.doc.set_attr(target, name, value)?;
        }
        let stale: Vec<String> = self
            .doc
            .attrs(target)
            .map(|live| {
                live.keys()
                    .filter(|name| !el.attrs.contains_key(*name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for name in stale {
            self.doc.remove_attr(target, &name)?;
        }
        Ok(())
    }

    /// Sync a kept region, leaving editing and diagnostic state alone.
    fn sync_region(&mut self, target: NodeId, el: &VElement) -> Result<(), EngineError> {
        for (name, value) in &el.attrs {
            if name != attrs::CLASS {
                self.doc.set_attr(target, name, value)?;
            }
        }
        let stale: Vec<String> = self
            .doc
            .attrs(target)
            .map(|live| {
                live.keys()
                    .filter(|name| {
                        *name != attrs::CLASS
                            && !el.attrs.contains_key(*name)
                            && !self.config.is_transient_attribute(name)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for name in stale {
            self.doc.remove_attr(target, &name)?;
        }

        let rendered: Vec<&str> = el
            .attrs
            .get(attrs::CLASS)
            .map(|classes| classes.split_whitespace().collect())
            .unwrap_or_default();
        for class in &rendered {
            self.doc.add_class(target, class)?;
        }
        let stale: Vec<String> = self
            .doc
            .classes(target)
            .into_iter()
            .filter(|class| !rendered.contains(class) && !self.keeps_class(class))
            .map(String::from)
            .collect();
        for class in stale {
            self.doc.remove_class(target, &class)?;
        }
        Ok(())
    }

    fn keeps_class(&self, class: &str) -> bool {
        self.config.is_transient_class(class) || class == self.config.errored_class
    }

    fn content_identical(&self, target: NodeId, render: &VNode) -> Result<bool, EngineError> {
        let live = self.doc.to_vnode(target)?;
        Ok(normalized(live, self.config) == normalized(render.clone(), self.config))
    }
}

/// Drop transient attributes and classes throughout a subtree.
fn normalized(mut node: VNode, config: &EngineConfig) -> VNode {
    if let VNode::Element(el) = &mut node {
        el.attrs.retain(|name, _| !config.is_transient_attribute(name));
        if let Some(classes) = el.attrs.get(attrs::CLASS) {
            let kept: Vec<&str> = classes
                .split_whitespace()
                .filter(|class| !config.is_transient_class(class))
                .collect();
            if kept.is_empty() {
                el.attrs.shift_remove(attrs::CLASS);
            } else {
                let kept = kept.join(" ");
                el.attrs.insert(attrs::CLASS.to_string(), kept);
            }
        }
        el.children = std::mem::take(&mut el.children)
            .into_iter()
            .map(|child| normalized(child, config))
            .collect();
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    /// Context over explicit sets.
    #[derive(Default)]
    struct Fixed {
        bound: HashSet<NodeId>,
        focused: Option<NodeId>,
        all_bound: bool,
    }

    impl ReconcileContext for Fixed {
        fn is_bound(&self, node: NodeId) -> bool {
            self.all_bound || self.bound.contains(&node)
        }

        fn is_focused(&self, node: NodeId) -> bool {
            self.focused == Some(node)
        }
    }

    fn setup(children: Vec<VNode>) -> (Document, NodeId, EngineConfig) {
        let mut doc = Document::new();
        let host = doc
            .materialize(&VNode::element("section").children(children))
            .unwrap();
        let root = doc.root();
        doc.append_child(root, host).unwrap();
        (doc, host, EngineConfig::default())
    }

    fn text_region(prop: &str, content: &str) -> VNode {
        VNode::element("p")
            .attr("data-editable", "text")
            .attr("data-prop", prop)
            .child(VNode::text(content))
    }

    #[test]
    fn test_plain_elements_sync_and_recurse() {
        let (mut doc, host, config) = setup(vec![VNode::element("div")
            .attr("class", "old")
            .attr("title", "x")
            .child(VNode::text("before"))]);
        let div = doc.first_child(host).unwrap();

        let rendered = vec![VNode::element("div")
            .attr("class", "new")
            .child(VNode::text("after"))
            .child(VNode::element("span"))];
        let report = patch_children(&mut doc, &config, &Fixed::default(), host, &rendered).unwrap();

        assert_eq!(doc.first_child(host), Some(div));
        assert_eq!(doc.attr(div, "class"), Some("new"));
        assert_eq!(doc.attr(div, "title"), None);
        assert_eq!(doc.text_content(div), "after");
        assert_eq!(report.inserted.len(), 1);
        assert!(report.mutations > 0);
    }

    #[test]
    fn test_text_before_element_inserts_without_consuming() {
        let (mut doc, host, config) = setup(vec![VNode::element("b")]);
        let b = doc.first_child(host).unwrap();
        let rendered = vec![VNode::text("lead "), VNode::element("b")];
        patch_children(&mut doc, &config, &Fixed::default(), host, &rendered).unwrap();

        let children = doc.children(host);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.text(children[0]), Some("lead "));
        assert_eq!(children[1], b);
    }

    #[test]
    fn test_tag_change_replaces() {
        let (mut doc, host, config) = setup(vec![VNode::element("h1")]);
        let h1 = doc.first_child(host).unwrap();
        let rendered = [VNode::element("H2")];
        let report = patch_children(&mut doc, &config, &Fixed::default(), host, &rendered).unwrap();
        assert_eq!(report.removed, vec![h1]);
        assert_eq!(doc.tag(doc.first_child(host).unwrap()), Some("H2"));
    }

    #[test]
    fn test_unbound_region_is_replaced() {
        let (mut doc, host, config) = setup(vec![text_region("title", "a")]);
        let live = doc.first_child(host).unwrap();
        let rendered = [text_region("title", "a")];
        let report = patch_children(&mut doc, &config, &Fixed::default(), host, &rendered).unwrap();
        assert_eq!(report.removed, vec![live]);
    }

    #[test]
    fn test_focused_text_region_survives_content_change() {
        let (mut doc, host, config) = setup(vec![text_region("title", "typing")]);
        let live = doc.first_child(host).unwrap();
        doc.set_attr(live, "contenteditable", "true").unwrap();
        doc.add_class(live, "ProseMirror").unwrap();
        let ctx = Fixed {
            bound: HashSet::from([live]),
            focused: Some(live),
            ..Default::default()
        };

        let rendered = [text_region("title", "server")];
        let report = patch_children(&mut doc, &config, &ctx, host, &rendered).unwrap();

        assert_eq!(doc.first_child(host), Some(live));
        assert_eq!(doc.text_content(live), "typing");
        assert_eq!(doc.attr(live, "contenteditable"), Some("true"));
        assert!(doc.has_class(live, "ProseMirror"));
        assert_eq!(report.forwards, vec![live]);
    }

    #[test]
    fn test_unfocused_text_region_replaced_only_when_content_differs() {
        let (mut doc, host, config) = setup(vec![text_region("title", "same")]);
        let live = doc.first_child(host).unwrap();
        doc.set_attr(live, "contenteditable", "true").unwrap();
        let ctx = Fixed {
            bound: HashSet::from([live]),
            ..Default::default()
        };

        patch_children(&mut doc, &config, &ctx, host, &[text_region("title", "same")]).unwrap();
        assert_eq!(doc.first_child(host), Some(live));

        let rendered = [text_region("title", "changed")];
        let report = patch_children(&mut doc, &config, &ctx, host, &rendered).unwrap();
        assert_eq!(report.removed, vec![live]);
    }

    #[test]
    fn test_bound_region_keeps_errored_class() {
        let region = VNode::element("div")
            .attr("data-editable", "component")
            .attr("data-component", "Card")
            .attr("class", "card");
        let (mut doc, host, config) = setup(vec![region.clone()]);
        let live = doc.first_child(host).unwrap();
        doc.add_class(live, "errored").unwrap();
        let ctx = Fixed {
            all_bound: true,
            ..Default::default()
        };

        let rendered = [region.attr("class", "card wide")];
        let report = patch_children(&mut doc, &config, &ctx, host, &rendered).unwrap();
        assert!(doc.has_class(live, "errored"));
        assert!(doc.has_class(live, "wide"));
        assert_eq!(report.forwards, vec![live]);
    }

    // -------------------------------------------------------------------------
    // Idempotence
    // -------------------------------------------------------------------------

    fn arb_vnode() -> impl Strategy<Value = VNode> {
        let leaf = prop_oneof![
            "[a-z ]{0,6}".prop_map(VNode::text),
            prop::sample::select(vec!["p", "span", "em"]).prop_map(VNode::element),
            ("[a-z]{1,5}", "[a-z]{0,4}")
                .prop_map(|(prop, text)| text_region(&prop, &text)),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            (
                prop::sample::select(vec!["div", "ul", "li"]),
                prop::option::of("[a-z]{1,4}"),
                prop::collection::vec(inner, 0..4),
            )
                .prop_map(|(tag, class, children)| {
                    let mut node = VNode::element(tag).children(children);
                    if let Some(class) = class {
                        node = node.attr("class", class);
                    }
                    node
                })
        })
    }

    proptest! {
        #[test]
        fn prop_patch_is_idempotent(
            initial in prop::collection::vec(arb_vnode(), 0..4),
            rendered in prop::collection::vec(arb_vnode(), 0..4),
        ) {
            let (mut doc, host, config) = setup(initial);
            let ctx = Fixed { all_bound: true, ..Default::default() };

            patch_children(&mut doc, &config, &ctx, host, &rendered).unwrap();
            let snapshot = doc.to_vnode(host).unwrap();
            let second = patch_children(&mut doc, &config, &ctx, host, &rendered).unwrap();

            prop_assert_eq!(second.mutations, 0);
            prop_assert!(second.inserted.is_empty());
            prop_assert!(second.removed.is_empty());
            prop_assert_eq!(doc.to_vnode(host).unwrap(), snapshot);
        }
    }
}
