//! Text regions.
//!
//! A text region hands its string value to the editing widget and reports
//! user edits back as `Set` commands on its own `data-prop`. While the host
//! holds focus, incoming values are refused so in-progress input is never
//! overwritten; the latest value is applied once focus leaves.

use std::rc::Rc;

use super::binding::BindingNode;
use crate::dispatch::Command;
use crate::engine::attrs;
use crate::engine::env::EditorOptions;
use crate::engine::value::Value;
use crate::renderer::diagnostics::Diagnostic;
use crate::state::focus::FocusCallbacks;
use crate::types::TextType;

const HEADING: &str = "Failed to render text editable region";

#[derive(Debug, Default)]
pub struct TextRegion {
    pub text_type: TextType,
}

/// Check `data-type`. `data-prop` is required for text regions only, source
/// regions address their file by `data-path`.
pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    if node.attr(attrs::PROP).is_none() {
        node.show_diagnostic(&Diagnostic::new(HEADING, "Missing required attribute data-prop"));
        return false;
    }
    match text_type(node, HEADING) {
        Some(text_type) => {
            if let super::Region::Text(region) = &mut *node.region_mut() {
                region.text_type = text_type;
            }
            true
        }
        None => false,
    }
}

/// Parse `data-type`, showing a diagnostic under `heading` when unsupported.
pub(crate) fn text_type(node: &BindingNode, heading: &str) -> Option<TextType> {
    let Some(declared) = node.attr(attrs::TYPE) else {
        return Some(TextType::default());
    };
    let parsed = TextType::from_attr(&declared);
    if parsed.is_none() {
        node.show_diagnostic(&Diagnostic::new(
            heading,
            format!(
                "Unsupported element type: \"{declared}\". Supported element types are span, text, and block."
            ),
        ));
    }
    parsed
}

pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    match value {
        Value::String(_) | Value::Null => Some(value),
        other => {
            node.show_diagnostic(&Diagnostic::new(
                HEADING,
                format!("Illegal value type: {}. Supported types are string.", other.type_name()),
            ));
            None
        }
    }
}

/// Shared by text and source regions.
pub(crate) fn should_update(node: &BindingNode, value: &Value) -> bool {
    !node.env().focus().is_focused(node.host()) && node.value().as_ref() != Some(value)
}

pub(crate) fn mount(node: &BindingNode) {
    let text_type = match &*node.region() {
        super::Region::Text(region) => region.text_type,
        _ => TextType::default(),
    };
    let weak = node.downgrade();
    node.env().editor().attach(
        node.host(),
        EditorOptions {
            text_type,
            source: false,
        },
        Rc::new(move |content| {
            if let Some(node) = weak.upgrade() {
                on_change(&node, content);
            }
        }),
    );
    watch_focus(node);
}

/// Re-apply values refused during focus once the host blurs.
pub(crate) fn watch_focus(node: &BindingNode) {
    let host = node.host();
    let weak = node.downgrade();
    let cleanup = node.env().focus().register_callbacks(
        host,
        FocusCallbacks {
            on_focus: Some(Box::new(move || tracing::trace!(%host, "text region focused"))),
            on_blur: Some(Box::new(move || {
                if let Some(node) = weak.upgrade() {
                    node.env().spawn(node.resync());
                }
            })),
        },
    );
    node.set_focus_cleanup(Box::new(cleanup));
}

fn on_change(node: &BindingNode, content: Option<String>) {
    let Some(path) = node.attr(attrs::PROP) else {
        tracing::error!(host = %node.host(), "text region lost its data-prop");
        return;
    };
    let value = content.map(Value::String).unwrap_or(Value::Null);
    let json = value.to_json_lossy();
    node.set_value(Some(value));
    node.dispatch_detached(Command::Set { path, value: json });
}

pub(crate) fn update(node: &BindingNode) {
    let content = match node.value() {
        Some(Value::String(content)) => content,
        _ => String::new(),
    };
    let env = node.env();
    let result = env
        .editor()
        .set_content(&mut env.doc_mut(), node.host(), &content);
    if let Err(err) = result {
        tracing::error!(host = %node.host(), error = %err, "failed to set editor content");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::env::{Env, PlainTextEditor};
    use crate::engine::vnode::VNode;
    use crate::pipeline::hydrate;
    use crate::store::{MemoryStore, StoreOp};
    use futures::executor::LocalPool;
    use serde_json::json;

    fn setup(
        markup: VNode,
    ) -> (LocalPool, Rc<MemoryStore>, Rc<PlainTextEditor>, Rc<Env>, BindingNode) {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({ "title": "Hello" }));
        store.set_current_file("index.md");
        let editor = Rc::new(PlainTextEditor::new());
        let env = Env::builder(store.clone(), Rc::new(pool.spawner()))
            .editor(editor.clone())
            .build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc.materialize(&markup).unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        let nodes = hydrate::hydrate(&env, host);
        env.ready().mark_ready();
        (pool, store, editor, env, nodes[0].clone())
    }

    fn title() -> VNode {
        VNode::element("h1")
            .attr("data-editable", "text")
            .attr("data-prop", "title")
    }

    #[test]
    fn test_value_reaches_editor() {
        let (mut pool, _store, editor, env, node) = setup(title());
        pool.run_until_stalled();
        assert!(editor.is_attached(node.host()));
        assert_eq!(env.doc().text_content(node.host()), "Hello");
    }

    #[test]
    fn test_edit_dispatches_set() {
        let (mut pool, store, editor, env, node) = setup(title());
        pool.run_until_stalled();
        store.clear_ops();

        editor.input(&env, node.host(), "Bonjour").unwrap();
        pool.run_until_stalled();

        assert_eq!(
            store.ops(),
            vec![StoreOp::Set {
                target: "@current".into(),
                path: "title".into(),
                value: json!("Bonjour"),
            }]
        );
        assert_eq!(store.file_data("index.md"), Some(json!({ "title": "Bonjour" })));
    }

    #[test]
    fn test_focused_region_refuses_then_applies_on_blur() {
        let (mut pool, store, _editor, env, node) = setup(title());
        pool.run_until_stalled();

        env.focus().focus(node.host());
        store.update_file("index.md", json!({ "title": "Remote" })).unwrap();
        pool.run_until_stalled();
        assert_eq!(env.doc().text_content(node.host()), "Hello");

        env.focus().blur(node.host());
        pool.run_until_stalled();
        assert_eq!(env.doc().text_content(node.host()), "Remote");
    }

    #[test]
    fn test_unsupported_type_shows_diagnostic() {
        let (mut pool, _store, editor, env, node) = setup(title().attr("data-type", "paragraph"));
        pool.run_until_stalled();
        assert!(!editor.is_attached(node.host()));
        let doc = env.doc();
        let card = doc.first_child(node.host()).unwrap();
        assert!(doc
            .attr(card, "message")
            .unwrap()
            .starts_with("Unsupported element type: \"paragraph\""));
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        let (mut pool, store, _editor, env, node) = setup(title());
        pool.run_until_stalled();
        store.update_file("index.md", json!({ "title": 4 })).unwrap();
        pool.run_until_stalled();
        let doc = env.doc();
        let card = doc.first_child(node.host()).unwrap();
        assert_eq!(
            doc.attr(card, "message"),
            Some("Illegal value type: number. Supported types are string.")
        );
    }
}
