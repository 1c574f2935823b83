//! Shared harness for integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use editable_regions::engine::Env;
use editable_regions::pipeline::{MountHandle, mount};
use editable_regions::{
    MemoryStore, Namespace, NodeId, PlainTextEditor, RenderError, RendererRegistry, VNode, renderer,
};
use futures::executor::LocalPool;
use serde_json::Value as Json;

pub struct Harness {
    pub pool: LocalPool,
    pub store: Rc<MemoryStore>,
    pub editor: Rc<PlainTextEditor>,
    pub renderers: Rc<RendererRegistry>,
    pub env: Rc<Env>,
}

pub fn setup(page: Json) -> Harness {
    let pool = LocalPool::new();
    let store = Rc::new(MemoryStore::new());
    store.insert_file("index.md", page);
    store.set_current_file("index.md");
    let editor = Rc::new(PlainTextEditor::new());
    let renderers = Rc::new(RendererRegistry::new());
    let env = Env::builder(store.clone(), Rc::new(pool.spawner()))
        .editor(editor.clone())
        .renderers(renderers.clone())
        .build();
    Harness {
        pool,
        store,
        editor,
        renderers,
        env,
    }
}

impl Harness {
    /// Append markup under the document root and mount it.
    pub fn mount(&mut self, markup: VNode) -> (NodeId, MountHandle) {
        let host = {
            let mut doc = self.env.doc_mut();
            let host = doc.materialize(&markup).expect("materialize markup");
            let root = doc.root();
            doc.append_child(root, host).expect("append host");
            host
        };
        let handle = mount(&self.env, host);
        self.settle();
        (host, handle)
    }

    pub fn settle(&mut self) {
        self.pool.run_until_stalled();
    }

    pub fn register(
        &self,
        key: &str,
        render: impl Fn(Json) -> Result<VNode, RenderError> + 'static,
    ) {
        let render = Rc::new(render);
        self.renderers.register(
            Namespace::Component,
            key,
            renderer(move |value| {
                let render = render.clone();
                async move { render(value) }
            }),
        );
    }

    pub fn snapshot(&self, node: NodeId) -> VNode {
        self.env.doc().to_vnode(node).expect("snapshot")
    }

    pub fn text(&self, node: NodeId) -> String {
        self.env.doc().text_content(node)
    }

    /// Element children of `node` matching `tag`.
    pub fn children_by_tag(&self, node: NodeId, tag: &str) -> Vec<NodeId> {
        let doc = self.env.doc();
        doc.element_children(node)
            .into_iter()
            .filter(|child| doc.tag(*child) == Some(tag))
            .collect()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.env.teardown();
    }
}
