//! Renderer registry.
//!
//! Maps component and snippet keys to async renderers. Registration may happen
//! after the tree is first hydrated, so lookups retry through the injected
//! clock for a bounded window and callers may ask to be told when a key
//! registers.

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;

use crate::config::RetryPolicy;
use crate::engine::env::Clock;
use crate::engine::vnode::VNode;
use crate::error::RenderError;

/// A black-box renderer: realized value in, subtree out.
pub type Renderer =
    Rc<dyn Fn(serde_json::Value) -> LocalBoxFuture<'static, Result<VNode, RenderError>>>;

/// Wrap an async closure as a [`Renderer`].
pub fn renderer<F, Fut>(render: F) -> Renderer
where
    F: Fn(serde_json::Value) -> Fut + 'static,
    Fut: Future<Output = Result<VNode, RenderError>> + 'static,
{
    Rc::new(move |value| render(value).boxed_local())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Component,
    Snippet,
}

#[derive(Default)]
pub struct RendererRegistry {
    components: RefCell<IndexMap<String, Renderer>>,
    snippets: RefCell<IndexMap<String, Renderer>>,
    waiting: RefCell<HashMap<(Namespace, String), Vec<Box<dyn FnOnce()>>>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, namespace: Namespace) -> &RefCell<IndexMap<String, Renderer>> {
        match namespace {
            Namespace::Component => &self.components,
            Namespace::Snippet => &self.snippets,
        }
    }

    /// Register (or replace) a renderer and fire pending one-shot callbacks.
    pub fn register(&self, namespace: Namespace, key: &str, renderer: Renderer) {
        self.table(namespace)
            .borrow_mut()
            .insert(key.to_string(), renderer);
        tracing::debug!(?namespace, key, "renderer registered");

        let callbacks = self
            .waiting
            .borrow_mut()
            .remove(&(namespace, key.to_string()))
            .unwrap_or_default();
        for callback in callbacks {
            callback();
        }
    }

    pub fn get(&self, namespace: Namespace, key: &str) -> Option<Renderer> {
        self.table(namespace).borrow().get(key).cloned()
    }

    pub fn keys(&self, namespace: Namespace) -> Vec<String> {
        self.table(namespace).borrow().keys().cloned().collect()
    }

    /// A registered key equal to `key` ignoring ASCII case.
    pub fn case_insensitive_match(&self, namespace: Namespace, key: &str) -> Option<String> {
        self.table(namespace)
            .borrow()
            .keys()
            .find(|candidate| candidate.eq_ignore_ascii_case(key))
            .cloned()
    }

    /// Run `callback` once, the next time `key` is registered.
    pub fn on_registered(
        &self,
        namespace: Namespace,
        key: &str,
        callback: impl FnOnce() + 'static,
    ) {
        self.waiting
            .borrow_mut()
            .entry((namespace, key.to_string()))
            .or_default()
            .push(Box::new(callback));
    }

    /// Look up a renderer, sleeping between attempts until the policy runs out.
    pub async fn resolve(
        &self,
        namespace: Namespace,
        key: &str,
        clock: &dyn Clock,
        policy: RetryPolicy,
    ) -> Option<Renderer> {
        if let Some(found) = self.get(namespace, key) {
            return Some(found);
        }
        for attempt in 0..policy.attempts {
            clock.sleep(policy.delay()).await;
            if let Some(found) = self.get(namespace, key) {
                tracing::debug!(key, attempt, "renderer found after retry");
                return Some(found);
            }
        }
        None
    }
}
