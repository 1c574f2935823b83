//! Mount API - editing session lifecycle.
//!
//! Mounting hydrates a subtree of the live document and flips the
//! environment to ready, which lets every queued connect proceed. The
//! returned handle dehydrates the subtree again when unmounted or dropped.
//!
//! # Example
//!
//! ```ignore
//! use editable_regions::pipeline::mount;
//!
//! let handle = mount::mount(&env, root);
//! pool.run_until_stalled();
//!
//! // Clean up
//! handle.unmount();
//! ```

use std::rc::Rc;

use super::hydrate;
use crate::engine::env::Env;
use crate::regions::binding::BindingNode;
use crate::types::NodeId;

// =============================================================================
// Mount Handle
// =============================================================================

/// Handle returned by [`mount`] that allows unmounting.
///
/// Holds references to:
/// - The environment the subtree lives in
/// - The mounted root
/// - The binding nodes hydration created
pub struct MountHandle {
    env: Rc<Env>,
    root: NodeId,
    nodes: Vec<BindingNode>,
    mounted: bool,
}

impl MountHandle {
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Binding nodes created when mounting, in document order.
    pub fn nodes(&self) -> &[BindingNode] {
        &self.nodes
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Dehydrate the subtree. Queued disconnects run on the executor.
    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        hydrate::dehydrate(&self.env, self.root);
        self.nodes.clear();
        tracing::debug!(root = %self.root, "unmounted");
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Mount Function
// =============================================================================

/// Hydrate `root` and mark the environment ready.
pub fn mount(env: &Rc<Env>, root: NodeId) -> MountHandle {
    let nodes = hydrate::hydrate(env, root);
    env.ready().mark_ready();
    tracing::debug!(%root, regions = nodes.len(), "mounted");
    MountHandle {
        env: env.clone(),
        root,
        nodes,
        mounted: true,
    }
}

/// Unmount and clean up.
pub fn unmount(handle: MountHandle) {
    handle.unmount();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vnode::VNode;
    use crate::store::{MemoryStore, StoreTarget};
    use futures::executor::LocalPool;
    use serde_json::json;

    fn setup() -> (LocalPool, Rc<MemoryStore>, Rc<Env>, NodeId) {
        let pool = LocalPool::new();
        let store = Rc::new(MemoryStore::new());
        store.insert_file("index.md", json!({ "title": "Hello" }));
        let env = Env::builder(store.clone(), Rc::new(pool.spawner())).build();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc
                .materialize(
                    &VNode::element("main").child(
                        VNode::element("h1")
                            .attr("data-editable", "text")
                            .attr("data-prop", "title"),
                    ),
                )
                .unwrap();
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        (pool, store, env, host)
    }

    #[test]
    fn test_mount_marks_ready_and_connects() {
        let (mut pool, store, env, host) = setup();
        let handle = mount(&env, host);
        assert!(env.ready().is_ready());
        pool.run_until_stalled();

        let title = env.doc().first_child(host).unwrap();
        assert_eq!(env.doc().text_content(title), "Hello");
        assert_eq!(handle.nodes().len(), 1);
        assert_eq!(store.subscriber_count(&StoreTarget::CurrentFile), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (mut pool, store, env, host) = setup();
        let handle = mount(&env, host);
        pool.run_until_stalled();

        drop(handle);
        pool.run_until_stalled();
        assert_eq!(env.registry().len(), 0);
        assert_eq!(store.subscriber_count(&StoreTarget::CurrentFile), 0);
    }
}
