//! Array regions.
//!
//! An array region owns the item children below it and keeps them in line
//! with its list value through the list reconciler. After each pass every
//! placed item is re-parented to the array, listens on its position and gets
//! its slice re-delivered.

use super::binding::{BindingNode, Listener};
use crate::dispatch::Command;
use crate::engine::attrs;
use crate::engine::value::{RemoteRef, Value};
use crate::error::DispatchError;
use crate::pipeline::hydrate;
use crate::reconcile::list::{self, ListEntry, ListOptions, ListReport};
use crate::renderer::diagnostics::Diagnostic;
use crate::types::{ArrayDirection, NodeFlags, NodeId};

pub(crate) use crate::reconcile::list::item_children;

const HEADING: &str = "Failed to render array editable";

/// Affordance shown while the list is empty.
pub const ADD_BUTTON_TAG: &str = "editable-region-button";

#[derive(Debug, Default)]
pub struct ArrayRegion {
    pub direction: ArrayDirection,
    pub add_button: Option<NodeId>,
}

pub(crate) fn validate_configuration(node: &BindingNode) -> bool {
    if node.attr(attrs::PROP).is_some() {
        return true;
    }
    node.show_diagnostic(&Diagnostic::new(
        HEADING,
        "Array editable regions require a 'data-prop' HTML attribute but none was provided. Please check that this element has a valid 'data-prop' attribute.",
    ));
    false
}

pub(crate) fn validate_value(node: &BindingNode, value: Value) -> Option<Value> {
    if matches!(value, Value::Array(_) | Value::Null | Value::Remote(_)) {
        return Some(value);
    }
    let hint = match node.context().full_path {
        Some(full_path) => format!(
            "This may mean that the 'data-prop' attribute is incorrectly set for this element, the full 'data-prop' path was '{full_path}'."
        ),
        None => "This may mean that the 'data-prop' attribute is incorrectly set for this element.".to_string(),
    };
    node.show_diagnostic(
        &Diagnostic::new(
            HEADING,
            format!(
                "Array editable regions expect to receive a value of type \"array\" but instead received a value of type '{}'.",
                value.type_name()
            ),
        )
        .with_hint(hint),
    );
    None
}

pub(crate) fn mount(node: &BindingNode) {
    let direction = node
        .attr(attrs::DIRECTION)
        .and_then(|declared| ArrayDirection::from_attr(&declared))
        .unwrap_or_default();
    if let super::Region::Array(region) = &mut *node.region_mut() {
        region.direction = direction;
    }
}

/// Entries as the list sees them: remote lists expand to their files, plain
/// arrays are used as they are, anything else is empty.
async fn entries(node: &BindingNode) -> Vec<Value> {
    let value = match node.value() {
        Some(Value::Remote(remote)) => match remote.expand().await {
            Ok(expanded) => expanded,
            Err(err) => {
                tracing::error!(host = %node.host(), error = %err, "failed to expand list");
                return Vec::new();
            }
        },
        Some(value) => value,
        None => return Vec::new(),
    };
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

async fn list_entry(item: &Value, id_key: Option<&str>, component_key: Option<&str>) -> ListEntry {
    let data = match item {
        Value::Remote(RemoteRef::File(file)) => file.data().await.unwrap_or_default(),
        other => other.clone(),
    };
    let id = id_key.and_then(|key| match data.get(key)? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    });
    let component = component_key
        .and_then(|key| data.get(key))
        .and_then(Value::as_str)
        .map(String::from);
    ListEntry { id, component }
}

pub(crate) async fn update(node: &BindingNode) {
    let env = node.env().clone();
    let host = node.host();
    let component = node.attr(attrs::COMPONENT);
    let component_key = node.attr(attrs::COMPONENT_KEY);
    let id_key = node.attr(attrs::ID_KEY).or_else(|| component_key.clone());

    let items = entries(node).await;
    let mut list_entries = Vec::with_capacity(items.len());
    for item in &items {
        list_entries.push(list_entry(item, id_key.as_deref(), component_key.as_deref()).await);
    }

    let unrenderable = {
        let doc = env.doc();
        let templates_empty = list::templates(&doc, host).map(|t| t.is_empty()).unwrap_or(true);
        item_children(&doc, host).is_empty()
            && component.is_none()
            && component_key.is_none()
            && templates_empty
    };
    if unrenderable && !list_entries.is_empty() {
        node.show_diagnostic_keeping(
            &Diagnostic::new(
                "Failed to render array editable region",
                "Array editable regions require at least one child array item, a 'data-component' or 'data-component-key' attribute, or a template to render new items from. Please check that this element has one of these.",
            ),
            |doc, child| {
                doc.tag(child)
                    .is_some_and(|tag| tag.eq_ignore_ascii_case(attrs::TEMPLATE_TAG))
            },
        );
        return;
    }

    let options = ListOptions {
        keyed: id_key.is_some(),
        component: component.as_deref(),
        component_key: component_key.as_deref(),
    };
    let result = {
        let mut doc = env.doc_mut();
        list::reconcile_list(&mut doc, env.config(), host, options, &list_entries)
    };
    let report = match result {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(%host, error = %err, "list reconciliation failed");
            return;
        }
    };
    tracing::debug!(
        %host,
        created = report.created,
        moved = report.moved,
        removed = report.removed,
        "array reconciled"
    );

    apply_report(node, &report).await;
    sync_add_button(node, list_entries.is_empty());
}

async fn apply_report(node: &BindingNode, report: &ListReport) {
    let env = node.env().clone();
    for removed in &report.removed_nodes {
        hydrate::dehydrate(&env, *removed);
        hydrate::release(&env, *removed);
    }
    for created in &report.created_nodes {
        hydrate::hydrate(&env, *created);
    }

    let Some(value) = node.value() else {
        return;
    };
    let context = node.context();
    for (index, placed) in report.placements.iter().enumerate() {
        // Unconnected items register with their new position on connect.
        let Some(child) = env
            .registry()
            .get(*placed)
            .filter(|child| child.has_flag(NodeFlags::CONNECTED))
        else {
            continue;
        };
        let position = index.to_string();
        child.set_parent(Some(node));
        node.upsert_listener(Listener::new(child.clone(), None, Some(position.clone())));
        child
            .push_value(value.clone(), None, Some(position), context.clone())
            .await;
    }
}

fn sync_add_button(node: &BindingNode, empty: bool) {
    let existing = match &*node.region() {
        super::Region::Array(region) => region.add_button,
        _ => None,
    };
    let env = node.env();
    let button = {
        let mut doc = env.doc_mut();
        match (empty, existing) {
            (true, Some(button)) if doc.contains(button) => Ok(Some(button)),
            (true, _) => {
                let button = doc.create_element(ADD_BUTTON_TAG);
                doc.set_attr(button, attrs::IGNORE, "")
                    .and_then(|_| doc.set_attr(button, "icon", "add"))
                    .and_then(|_| doc.set_attr(button, "text", "Add Item"))
                    .and_then(|_| doc.append_child(node.host(), button))
                    .map(|_| Some(button))
            }
            (false, Some(button)) if doc.contains(button) => doc.release(button).map(|_| None),
            (false, _) => Ok(None),
        }
    };
    match button {
        Ok(button) => {
            if let super::Region::Array(region) = &mut *node.region_mut() {
                region.add_button = button;
            }
        }
        Err(err) => tracing::error!(host = %node.host(), error = %err, "failed to sync add button"),
    }
}

impl BindingNode {
    /// Insert a new first entry. Used by the empty-list affordance.
    pub async fn add_first_item(&self) -> Result<(), DispatchError> {
        let Some(path) = self.attr(attrs::PROP) else {
            return Err(DispatchError::Unresolved(format!("{} has no data-prop", self.host())));
        };
        self.dispatch(Command::AddArrayItem {
            path,
            index: Some(0),
            value: None,
            source_index: None,
        })
        .await
        .map(|_| ())
    }

    /// Writing direction of an array region.
    pub fn direction(&self) -> Option<ArrayDirection> {
        match &*self.region() {
            super::Region::Array(region) => Some(region.direction),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::env::Env;
    use crate::engine::vnode::VNode;
    use crate::store::{MemoryStore, StoreOp};
    use futures::executor::LocalPool;
    use serde_json::json;
    use std::rc::Rc;

    fn setup(
        items: serde_json::Value,
        markup: VNode,
    ) -> (LocalPool, Rc<MemoryStore>, Rc<Env>, BindingNode) {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({ "items": items }));
        store.set_current_file("index.md");
        let env = Env::builder(store.clone(), Rc::new(pool.spawner())).build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc.materialize(&markup).unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        let node = hydrate::hydrate(&env, host).remove(0);
        env.ready().mark_ready();
        (pool, store, env, node)
    }

    fn list() -> VNode {
        VNode::element("ul")
            .attr("data-editable", "array")
            .attr("data-prop", "items")
    }

    fn item(text: &str) -> VNode {
        VNode::element("li")
            .attr("data-editable", "array-item")
            .child(VNode::text(text))
    }

    #[test]
    fn test_extends_from_template() {
        let markup = list()
            .child(VNode::element("template").child(item("new")))
            .child(item("x"))
            .child(item("y"));
        let (mut pool, store, env, node) = setup(json!(["x", "y"]), markup);
        pool.run_until_stalled();

        store.update_file("index.md", json!({ "items": ["x", "y", "z"] })).unwrap();
        pool.run_until_stalled();

        let doc = env.doc();
        let items = item_children(&doc, node.host());
        assert_eq!(items.len(), 3);
        assert_eq!(doc.text_content(items[2]), "new");
        assert_eq!(doc.attr(items[2], "data-prop"), Some("2"));
        assert_eq!(doc.attr(items[2], "data-length"), Some("3"));
        assert_eq!(doc.attr(items[0], "data-length"), Some("3"));
    }

    #[test]
    fn test_items_listen_on_their_position() {
        let markup = list().child(item("x")).child(item("y"));
        let (mut pool, _store, env, node) = setup(json!(["x", "y"]), markup);
        pool.run_until_stalled();

        let paths: Vec<Option<String>> = node.listeners().into_iter().map(|l| l.path).collect();
        assert_eq!(paths, vec![Some("0".to_string()), Some("1".to_string())]);
        let doc = env.doc();
        for child in item_children(&doc, node.host()) {
            let child = env.registry().get(child).unwrap();
            assert!(child.parent().unwrap().ptr_eq(&node));
        }
    }

    #[test]
    fn test_add_button_only_when_empty() {
        let markup = list().attr("data-component", "Card");
        let (mut pool, store, env, node) = setup(json!([]), markup);
        pool.run_until_stalled();
        assert!(env.doc().child_by_tag(node.host(), ADD_BUTTON_TAG).is_some());

        store.update_file("index.md", json!({ "items": [{}] })).unwrap();
        pool.run_until_stalled();
        assert!(env.doc().child_by_tag(node.host(), ADD_BUTTON_TAG).is_none());
    }

    #[test]
    fn test_add_first_item_dispatches() {
        let (mut pool, store, _env, node) = setup(json!([]), list().attr("data-component", "Card"));
        pool.run_until_stalled();
        store.clear_ops();

        futures::executor::block_on(node.add_first_item()).unwrap();
        assert_eq!(
            store.ops(),
            vec![StoreOp::AddArrayItem {
                target: "@current".into(),
                path: "items".into(),
                index: Some(0),
                value: None,
                source_index: None,
            }]
        );
    }

    #[test]
    fn test_wrong_value_type_shows_full_path() {
        let (mut pool, _store, env, node) = setup(json!("nope"), list());
        pool.run_until_stalled();
        let doc = env.doc();
        let card = doc.first_child(node.host()).unwrap();
        assert_eq!(
            doc.attr(card, "message"),
            Some("Array editable regions expect to receive a value of type \"array\" but instead received a value of type 'string'.")
        );
        assert!(doc.attr(card, "hint").unwrap().contains("@file[index.md].items"));
    }

    #[test]
    fn test_direction_from_attribute() {
        let markup = list().attr("data-direction", "row-reverse").child(item("x"));
        let (mut pool, _store, _env, node) = setup(json!(["x"]), markup);
        pool.run_until_stalled();
        assert_eq!(node.direction(), Some(ArrayDirection::RowReverse));
    }
}
