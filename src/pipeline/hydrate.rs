//! Hydration - attaching binding nodes to region hosts.
//!
//! Hydration walks a subtree in document order, creates one binding node per
//! region host, registers it in the environment's side table and connects it.
//! Dehydration undoes the registration and queues a disconnect; releasing
//! frees the detached subtree in the arena.
//!
//! Skipped while walking:
//! - elements carrying `data-cloudcannon-ignore`, with their subtree
//! - `template` contents, which stay inert until cloned
//! - diagnostic cards

use std::rc::Rc;

use crate::engine::attrs;
use crate::engine::env::Env;
use crate::regions::binding::BindingNode;
use crate::renderer::diagnostics::{self, Diagnostic};
use crate::types::{NodeId, RegionKind};

/// One step of the walk.
enum Visit {
    Region(RegionKind),
    Unsupported(String),
    Descend,
    Skip,
}

fn visit(env: &Env, node: NodeId) -> Visit {
    let doc = env.doc();
    let (Some(tag), Some(attributes)) = (doc.tag(node), doc.attrs(node)) else {
        return Visit::Skip;
    };
    if attributes.contains_key(attrs::IGNORE)
        || tag.eq_ignore_ascii_case(attrs::TEMPLATE_TAG)
        || diagnostics::is_card(&doc, node)
    {
        return Visit::Skip;
    }
    match attrs::region_kind(tag, attributes) {
        Some(Ok(kind)) => Visit::Region(kind),
        Some(Err(declared)) => Visit::Unsupported(declared),
        None => Visit::Descend,
    }
}

/// Create, register and connect binding nodes for every region host in the
/// subtree rooted at `root` (inclusive). Returns the new nodes in document
/// order. Hosts that already have a node keep it.
pub fn hydrate(env: &Rc<Env>, root: NodeId) -> Vec<BindingNode> {
    let mut created = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        match visit(env, node) {
            Visit::Skip => continue,
            Visit::Unsupported(declared) => {
                show_unsupported(env, node, &declared);
                continue;
            }
            Visit::Region(kind) if !env.registry().contains(node) => {
                let binding = BindingNode::new(env, node, kind);
                env.registry().insert(binding.clone());
                created.push(binding);
            }
            Visit::Region(_) | Visit::Descend => {}
        }
        let mut children = env.doc().element_children(node);
        children.reverse();
        stack.extend(children);
    }

    tracing::debug!(%root, regions = created.len(), "hydrated subtree");
    for binding in &created {
        drop(binding.connect());
    }
    created
}

fn show_unsupported(env: &Env, host: NodeId, declared: &str) {
    let diagnostic = Diagnostic::new(
        "Failed to render editable region",
        format!("Unsupported editable type: \"{declared}\""),
    )
    .with_hint(format!("Supported editable types are {}.", RegionKind::supported_list()));
    let result = diagnostics::show(&mut env.doc_mut(), host, &diagnostic, env.config());
    if let Err(err) = result {
        tracing::error!(%host, error = %err, "failed to show diagnostic");
    }
}

/// Remove every binding node in the subtree from the registry and queue its
/// disconnect. The hosts stay in the document.
pub fn dehydrate(env: &Env, root: NodeId) {
    let hosts = env.doc().descendants(root);
    let mut removed = 0usize;
    for host in hosts {
        if let Some(binding) = env.registry().remove(host) {
            drop(binding.disconnect());
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!(%root, regions = removed, "dehydrated subtree");
    }
}

/// Free a subtree that has left the tree. Dehydrate it first.
pub fn release(env: &Env, root: NodeId) {
    let mut doc = env.doc_mut();
    if !doc.contains(root) {
        return;
    }
    if let Err(err) = doc.release(root) {
        tracing::error!(%root, error = %err, "failed to release subtree");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vnode::VNode;
    use crate::store::MemoryStore;
    use futures::executor::LocalPool;
    use serde_json::json;

    fn setup(markup: VNode) -> (LocalPool, Rc<Env>, NodeId) {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({ "title": "Hello", "items": [] }));
        let env = Env::builder(store, Rc::new(pool.spawner())).build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc.materialize(&markup).unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        (pool, env, host)
    }

    fn text(prop: &str) -> VNode {
        VNode::element("span")
            .attr("data-editable", "text")
            .attr("data-prop", prop)
    }

    #[test]
    fn test_hydrate_in_document_order() {
        let markup = VNode::element("main")
            .child(text("title"))
            .child(VNode::element("section").child(text("subtitle")));
        let (_pool, env, host) = setup(markup);
        let nodes = hydrate(&env, host);
        let kinds: Vec<RegionKind> = nodes.iter().map(BindingNode::kind).collect();
        assert_eq!(kinds, vec![RegionKind::Text, RegionKind::Text]);
        assert_eq!(nodes[0].attr("data-prop").as_deref(), Some("title"));
        assert_eq!(env.registry().len(), 2);

        assert!(hydrate(&env, host).is_empty());
    }

    #[test]
    fn test_ignored_and_template_subtrees_are_skipped() {
        let markup = VNode::element("main")
            .child(VNode::element("div").attr("data-cloudcannon-ignore", "").child(text("a")))
            .child(VNode::element("template").child(text("b")))
            .child(text("c"));
        let (_pool, env, host) = setup(markup);
        let nodes = hydrate(&env, host);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].attr("data-prop").as_deref(), Some("c"));
    }

    #[test]
    fn test_unknown_kind_shows_diagnostic() {
        let markup = VNode::element("div")
            .attr("data-editable", "carousel")
            .child(text("inner"));
        let (_pool, env, host) = setup(markup);
        assert!(hydrate(&env, host).is_empty());
        let doc = env.doc();
        let card = doc.first_child(host).unwrap();
        assert!(diagnostics::is_card(&doc, card));
        assert_eq!(doc.attr(card, "message"), Some("Unsupported editable type: \"carousel\""));
        assert_eq!(doc.children(host).len(), 1);
    }

    #[test]
    fn test_dehydrate_disconnects_and_release_frees() {
        let (mut pool, env, host) = setup(VNode::element("main").child(text("title")));
        let nodes = hydrate(&env, host);
        env.ready().mark_ready();
        pool.run_until_stalled();
        assert!(nodes[0].has_flag(crate::types::NodeFlags::CONNECTED));

        dehydrate(&env, host);
        pool.run_until_stalled();
        assert_eq!(env.registry().len(), 0);
        assert!(!nodes[0].has_flag(crate::types::NodeFlags::CONNECTED));

        env.doc_mut().detach(host).unwrap();
        release(&env, host);
        assert!(!env.doc().contains(host));
    }
}
