//! Snippet regions.
//!
//! A snippet renders like a component, but the renderer is chosen by the
//! value's `_snippet_type` from the snippet namespace. Values that are not
//! snippets are ignored without a diagnostic; remote snippet objects are
//! checked when the update fetches them.

use super::binding::BindingNode;
use super::component;
use crate::engine::attrs;
use crate::engine::value::Value;
use crate::renderer::registry::Namespace;

pub const TYPE_KEY: &str = "_snippet_type";

pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    if matches!(value, Value::Null | Value::Remote(_)) {
        return Some(value);
    }
    let snippet_type = value
        .as_object()?
        .get(TYPE_KEY)
        .and_then(Value::as_str)?
        .to_string();
    let result = node
        .env()
        .doc_mut()
        .set_attr(node.host(), attrs::COMPONENT, &snippet_type);
    if let Err(err) = result {
        tracing::error!(host = %node.host(), error = %err, "failed to set snippet component");
        return None;
    }
    Some(value)
}

/// Remote snippet objects are checked once their data is fetched.
pub(crate) async fn update(node: &BindingNode) {
    if let Some(Value::Remote(remote)) = node.value() {
        match remote.expand().await {
            Ok(expanded) => {
                if validate_value(node, expanded).is_none() {
                    return;
                }
            }
            Err(err) => {
                tracing::error!(host = %node.host(), error = %err, "failed to fetch snippet");
                return;
            }
        }
    }
    component::render(node, Namespace::Snippet).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::env::Env;
    use crate::engine::vnode::VNode;
    use crate::pipeline::hydrate;
    use crate::renderer::registry::{RendererRegistry, renderer};
    use crate::store::MemoryStore;
    use futures::executor::LocalPool;
    use serde_json::json;
    use std::rc::Rc;

    fn setup() -> (LocalPool, Rc<Env>, BindingNode) {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({}));
        store.insert_snippet("s1", json!({ "_snippet_type": "youtube", "id": "abc" }));
        let renderers = Rc::new(RendererRegistry::new());
        renderers.register(
            Namespace::Snippet,
            "youtube",
            renderer(|value| async move {
                let id = value["id"].as_str().unwrap_or_default().to_string();
                Ok(VNode::element("root").child(VNode::element("iframe").attr("src", id)))
            }),
        );
        let env = Env::builder(store, Rc::new(pool.spawner()))
            .renderers(renderers)
            .build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc
                .materialize(
                    &VNode::element("div")
                        .attr("data-editable", "snippet")
                        .attr("data-prop", "@snippet[s1]"),
                )
                .unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        let node = hydrate::hydrate(&env, host).remove(0);
        env.ready().mark_ready();
        (pool, env, node)
    }

    #[test]
    fn test_snippet_renders_by_type() {
        let (mut pool, env, node) = setup();
        pool.run_until_stalled();
        let doc = env.doc();
        assert_eq!(doc.attr(node.host(), "data-component"), Some("youtube"));
        let iframe = doc.first_child(node.host()).unwrap();
        assert_eq!(doc.tag(iframe), Some("iframe"));
        assert_eq!(doc.attr(iframe, "src"), Some("abc"));
    }

    #[test]
    fn test_non_snippet_values_are_ignored() {
        let (_pool, _env, node) = setup();
        assert!(validate_value(&node, Value::from("text")).is_none());
        assert!(validate_value(&node, Value::Object(Default::default())).is_none());
        assert_eq!(validate_value(&node, Value::Null), Some(Value::Null));
    }
}
