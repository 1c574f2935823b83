mod common;

use std::cell::RefCell;
use std::rc::Rc;

use editable_regions::pipeline::hydrate;
use editable_regions::{Namespace, VNode, renderer};
use futures::channel::oneshot;
use serde_json::json;

fn text(prop: &str) -> VNode {
    VNode::element("span")
        .attr("data-editable", "text")
        .attr("data-prop", prop)
}

fn component(key: &str, prop: &str) -> VNode {
    VNode::element("div")
        .attr("data-editable", "component")
        .attr("data-component", key)
        .attr("data-prop", prop)
}

#[test]
fn test_relative_coordinate_composes_through_parent() {
    let mut h = common::setup(json!({}));
    h.store.insert_file("x.md", json!({ "body": { "items": ["first", "second"] } }));
    h.register("Body", |_| {
        Ok(VNode::element("root").children(vec![
            text("items.0"),
            text("@file[y.md].title"),
        ]))
    });
    h.store.insert_file("y.md", json!({ "title": "Elsewhere" }));
    let (host, _handle) = h.mount(component("Body", "@file[x.md].body"));

    let spans = h.children_by_tag(host, "span");
    assert_eq!(h.text(spans[0]), "first");
    assert_eq!(h.text(spans[1]), "Elsewhere");

    let relative = h.env.registry().get(spans[0]).unwrap();
    assert_eq!(
        relative.resolve_coordinate("items.0").as_deref(),
        Some("@file[x.md].body.items.0")
    );
    let absolute = h.env.registry().get(spans[1]).unwrap();
    assert_eq!(
        absolute.resolve_coordinate("@file[y.md].title").as_deref(),
        Some("@file[y.md].title")
    );
}

#[test]
fn test_late_listener_gets_current_value() {
    let mut h = common::setup(json!({ "hero": { "title": "Hi" } }));
    h.register("Plain", |_| Ok(VNode::element("root").child(VNode::element("p"))));
    let (host, _handle) = h.mount(component("Plain", "hero"));
    let parent = h.env.registry().get(host).unwrap();
    assert!(parent.listeners().is_empty());

    let late = {
        let mut doc = h.env.doc_mut();
        let late = doc.materialize(&text("title")).unwrap();
        doc.append_child(host, late).unwrap();
        late
    };
    hydrate(&h.env, late);
    h.settle();

    assert_eq!(h.text(late), "Hi");
    assert_eq!(parent.listeners().len(), 1);
}

#[test]
fn test_updates_requested_mid_pass_coalesce() {
    let mut h = common::setup(json!({ "hero": { "title": "Hi" } }));
    let gate: Rc<RefCell<Option<oneshot::Receiver<()>>>> = Rc::default();
    let held = gate.clone();
    h.renderers.register(
        Namespace::Component,
        "Slow",
        renderer(move |_| {
            let waiting = held.borrow_mut().take();
            async move {
                if let Some(waiting) = waiting {
                    let _ = waiting.await;
                }
                Ok(VNode::element("root").child(VNode::element("p")))
            }
        }),
    );
    let (host, _handle) = h.mount(component("Slow", "hero"));
    let node = h.env.registry().get(host).unwrap();
    let settled = node.update_passes();

    let (open, waiting) = oneshot::channel();
    *gate.borrow_mut() = Some(waiting);
    node.schedule_update();
    h.settle();
    assert_eq!(node.update_passes(), settled + 1);

    node.schedule_update();
    node.schedule_update();
    h.settle();
    assert_eq!(node.update_passes(), settled + 1);

    open.send(()).unwrap();
    h.settle();
    assert_eq!(node.update_passes(), settled + 2);
}

#[test]
fn test_new_unkeyed_item_comes_from_template() {
    let mut h = common::setup(json!({ "items": ["x", "y"] }));
    let item = |label: &str| {
        VNode::element("li")
            .attr("data-editable", "array-item")
            .child(text("").child(VNode::text(label)))
    };
    let list = VNode::element("ul")
        .attr("data-editable", "array")
        .attr("data-prop", "items")
        .child(VNode::element("template").child(item("")))
        .child(item("x"))
        .child(item("y"));
    let (host, _handle) = h.mount(list);

    h.store
        .update_file("index.md", json!({ "items": ["x", "y", "z"] }))
        .unwrap();
    h.settle();

    let items = h.children_by_tag(host, "li");
    assert_eq!(items.len(), 3);
    assert_eq!(h.text(items[2]), "z");
    let doc = h.env.doc();
    assert_eq!(doc.attr(items[2], "data-prop"), Some("2"));
    assert_eq!(doc.attr(items[2], "data-length"), Some("3"));
}

#[test]
fn test_disconnect_releases_subscriptions() {
    let mut h = common::setup(json!({ "title": "Hi" }));
    let (_host, handle) = h.mount(VNode::element("main").child(text("title")));
    let current = editable_regions::StoreTarget::CurrentFile;
    assert_eq!(h.store.subscriber_count(&current), 1);

    handle.unmount();
    h.settle();
    assert_eq!(h.store.subscriber_count(&current), 0);
    assert_eq!(h.env.registry().len(), 0);
}

fn image_on(file: &str) -> VNode {
    VNode::element("figure")
        .attr("data-editable", "image")
        .attr("data-prop-src", format!("@file[{file}].src"))
        .attr("data-prop-alt", format!("@file[{file}].alt"))
        .child(VNode::element("img"))
}

/// Append markup under the root without mounting, so readiness stays off.
fn attach(h: &common::Harness, markup: VNode) -> editable_regions::NodeId {
    let mut doc = h.env.doc_mut();
    let host = doc.materialize(&markup).unwrap();
    let root = doc.root();
    doc.append_child(root, host).unwrap();
    host
}

#[test]
fn test_shared_store_object_gets_one_subscription() {
    let mut h = common::setup(json!({}));
    h.store.insert_file("x.md", json!({ "src": "/a.png", "alt": "A" }));
    let (host, handle) = h.mount(image_on("x.md"));
    let target = editable_regions::StoreTarget::File("x.md".into());

    let node = h.env.registry().get(host).unwrap();
    assert_eq!(node.store_subscriptions(), 1);
    assert_eq!(h.store.subscriber_count(&target), 1);

    handle.unmount();
    h.settle();
    assert_eq!(node.store_subscriptions(), 0);
    assert_eq!(h.store.subscriber_count(&target), 0);
}

#[test]
fn test_disconnect_queued_before_ready_waits_for_connect() {
    let mut h = common::setup(json!({}));
    h.store.insert_file("x.md", json!({ "src": "/a.png", "alt": "A" }));
    let host = attach(&h, image_on("x.md"));
    let target = editable_regions::StoreTarget::File("x.md".into());

    let node = hydrate(&h.env, host).remove(0);
    drop(node.disconnect());
    h.settle();
    assert!(!node.has_flag(editable_regions::NodeFlags::CONNECTED));
    assert_eq!(h.store.subscriber_count(&target), 0);

    h.env.ready().mark_ready();
    h.settle();
    assert!(!node.has_flag(editable_regions::NodeFlags::CONNECTED));
    assert_eq!(node.store_subscriptions(), 0);
    assert_eq!(h.store.subscriber_count(&target), 0);
}

#[test]
fn test_reconnect_queued_behind_disconnect_runs_last() {
    let mut h = common::setup(json!({}));
    h.store.insert_file("x.md", json!({ "src": "/a.png", "alt": "A" }));
    let host = attach(&h, image_on("x.md"));
    let target = editable_regions::StoreTarget::File("x.md".into());

    let node = hydrate(&h.env, host).remove(0);
    drop(node.disconnect());
    drop(node.connect());
    h.env.ready().mark_ready();
    h.settle();

    assert!(node.has_flag(editable_regions::NodeFlags::CONNECTED));
    assert_eq!(node.store_subscriptions(), 1);
    assert_eq!(h.store.subscriber_count(&target), 1);

    drop(node.disconnect());
    h.settle();
    assert_eq!(node.store_subscriptions(), 0);
    assert_eq!(h.store.subscriber_count(&target), 0);
}
