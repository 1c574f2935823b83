//! Engine environment.
//!
//! Everything a binding node talks to lives here: the live document, the
//! side-table registry, renderers, the remote store, readiness and focus
//! state, the clock, the executor and the text editing widget. Nothing is
//! global, so tests build isolated environments side by side.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};

use super::document::Document;
use super::registry::Registry;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::renderer::registry::RendererRegistry;
use crate::state::focus::FocusState;
use crate::state::ready::ReadyState;
use crate::store::RemoteStore;
use crate::types::{NodeId, TextType};

// =============================================================================
// Clock
// =============================================================================

/// Source of delays for retry loops.
pub trait Clock {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Clock whose sleeps complete immediately. Retries still yield to the
/// executor between attempts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateClock;

impl Clock for ImmediateClock {
    fn sleep(&self, _duration: Duration) -> LocalBoxFuture<'static, ()> {
        futures::future::ready(()).boxed_local()
    }
}

// =============================================================================
// Text Editor
// =============================================================================

/// How an editing widget should treat a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EditorOptions {
    pub text_type: TextType,
    /// Editing raw source rather than rendered text.
    pub source: bool,
}

/// Called by the widget with the new content after each user edit.
pub type ChangeHandler = Rc<dyn Fn(Option<String>)>;

/// The rich text editing widget.
pub trait TextEditor {
    fn attach(&self, host: NodeId, options: EditorOptions, on_change: ChangeHandler);
    fn detach(&self, host: NodeId);
    /// Replace the edited content without notifying the change handler.
    fn set_content(
        &self,
        doc: &mut Document,
        host: NodeId,
        content: &str,
    ) -> Result<(), EngineError>;
}

/// Editor that treats content as plain text.
#[derive(Default)]
pub struct PlainTextEditor {
    attached: RefCell<HashMap<NodeId, (EditorOptions, ChangeHandler)>>,
}

impl PlainTextEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, host: NodeId) -> bool {
        self.attached.borrow().contains_key(&host)
    }

    pub fn options(&self, host: NodeId) -> Option<EditorOptions> {
        self.attached.borrow().get(&host).map(|(options, _)| *options)
    }

    /// Apply user input to a host and report it to the change handler.
    pub fn input(&self, env: &Env, host: NodeId, content: &str) -> Result<(), EngineError> {
        env.doc_mut().set_text_content(host, content)?;
        let handler = self
            .attached
            .borrow()
            .get(&host)
            .map(|(_, handler)| handler.clone());
        if let Some(handler) = handler {
            handler(Some(content.to_string()));
        }
        Ok(())
    }
}

impl TextEditor for PlainTextEditor {
    fn attach(&self, host: NodeId, options: EditorOptions, on_change: ChangeHandler) {
        self.attached.borrow_mut().insert(host, (options, on_change));
    }

    fn detach(&self, host: NodeId) {
        self.attached.borrow_mut().remove(&host);
    }

    fn set_content(
        &self,
        doc: &mut Document,
        host: NodeId,
        content: &str,
    ) -> Result<(), EngineError> {
        doc.set_text_content(host, content).map(|_| ())
    }
}

// =============================================================================
// Environment
// =============================================================================

pub struct Env {
    config: EngineConfig,
    doc: RefCell<Document>,
    registry: Registry,
    renderers: Rc<RendererRegistry>,
    store: Rc<dyn RemoteStore>,
    ready: ReadyState,
    focus: FocusState,
    clock: Rc<dyn Clock>,
    spawner: Rc<dyn LocalSpawn>,
    editor: Rc<dyn TextEditor>,
}

impl Env {
    pub fn builder(store: Rc<dyn RemoteStore>, spawner: Rc<dyn LocalSpawn>) -> EnvBuilder {
        EnvBuilder {
            store,
            spawner,
            config: EngineConfig::default(),
            document: Document::new(),
            renderers: None,
            clock: None,
            editor: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Borrow the document. Never hold across an await.
    pub fn doc(&self) -> Ref<'_, Document> {
        self.doc.borrow()
    }

    /// Mutably borrow the document. Never hold across an await.
    pub fn doc_mut(&self) -> RefMut<'_, Document> {
        self.doc.borrow_mut()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn renderers(&self) -> &Rc<RendererRegistry> {
        &self.renderers
    }

    pub fn store(&self) -> &Rc<dyn RemoteStore> {
        &self.store
    }

    pub fn ready(&self) -> &ReadyState {
        &self.ready
    }

    pub fn focus(&self) -> &FocusState {
        &self.focus
    }

    pub fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }

    pub fn editor(&self) -> &Rc<dyn TextEditor> {
        &self.editor
    }

    /// Run a task on the executor.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(err) = self.spawner.spawn_local(task) {
            tracing::error!(error = %err, "failed to spawn task");
        }
    }

    /// Run a fallible task, logging its failure.
    pub fn spawn_fallible<E>(
        &self,
        label: &'static str,
        task: impl Future<Output = Result<(), E>> + 'static,
    ) where
        E: fmt::Display + 'static,
    {
        self.spawn(async move {
            if let Err(err) = task.await {
                tracing::error!(task = label, error = %err, "task failed");
            }
        });
    }

    /// Drop every binding node. Breaks the env/node reference cycle.
    pub fn teardown(&self) {
        let nodes = self.registry.drain();
        tracing::debug!(nodes = nodes.len(), "tearing down environment");
        for node in nodes {
            node.release_links();
        }
    }
}

pub struct EnvBuilder {
    store: Rc<dyn RemoteStore>,
    spawner: Rc<dyn LocalSpawn>,
    config: EngineConfig,
    document: Document,
    renderers: Option<Rc<RendererRegistry>>,
    clock: Option<Rc<dyn Clock>>,
    editor: Option<Rc<dyn TextEditor>>,
}

impl EnvBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn document(mut self, document: Document) -> Self {
        self.document = document;
        self
    }

    pub fn renderers(mut self, renderers: Rc<RendererRegistry>) -> Self {
        self.renderers = Some(renderers);
        self
    }

    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn editor(mut self, editor: Rc<dyn TextEditor>) -> Self {
        self.editor = Some(editor);
        self
    }

    pub fn build(self) -> Rc<Env> {
        Rc::new(Env {
            config: self.config,
            doc: RefCell::new(self.document),
            registry: Registry::new(),
            renderers: self.renderers.unwrap_or_default(),
            store: self.store,
            ready: ReadyState::new(),
            focus: FocusState::new(),
            clock: self.clock.unwrap_or_else(|| Rc::new(ImmediateClock)),
            spawner: self.spawner,
            editor: self.editor.unwrap_or_else(|| Rc::new(PlainTextEditor::new())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use futures::executor::LocalPool;
    use std::cell::Cell;

    fn setup() -> (LocalPool, Rc<Env>) {
        let pool = LocalPool::new();
        let env = Env::builder(Rc::new(MemoryStore::new()), Rc::new(pool.spawner())).build();
        (pool, env)
    }

    #[test]
    fn test_spawn_runs_on_pool() {
        let (mut pool, env) = setup();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        env.spawn(async move { counter.set(counter.get() + 1) });
        assert_eq!(hits.get(), 0);
        pool.run_until_stalled();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_plain_editor_reports_input() {
        let (_pool, env) = setup();
        let editor = PlainTextEditor::new();
        let host = {
            let mut doc = env.doc_mut();
            let host = doc.create_element("p");
            let root = doc.root();
            doc.append_child(root, host).unwrap();
            host
        };
        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        editor.attach(
            host,
            EditorOptions::default(),
            Rc::new(move |content| *sink.borrow_mut() = content),
        );

        editor.input(&env, host, "typed").unwrap();
        assert_eq!(env.doc().text_content(host), "typed");
        assert_eq!(seen.borrow().as_deref(), Some("typed"));

        editor.detach(host);
        assert!(!editor.is_attached(host));
    }
}
