//! Binding nodes.
//!
//! Every hydrated region host gets one [`BindingNode`]. The node receives
//! values from its parent (or straight from the store when its coordinate is
//! absolute), merges keyed and unkeyed slices into one effective value, and
//! hands it to its region for rendering. Children subscribe by registering a
//! [`Listener`]; a node's `update()` either forwards its value to them or lets
//! the region do something richer (render, reconcile a list, drive an editor).
//!
//! # Scheduling
//!
//! - `update()` is coalesced: at most one pass runs per node, and requests
//!   arriving mid-pass collapse into exactly one trailing pass.
//! - `connect()` and `disconnect()` go through a per-node queue, so a
//!   disconnect always runs after the connect before it, and a reconnect after
//!   that disconnect.
//!
//! Both are shared futures that are also spawned on the environment's
//! executor: awaiting them is optional.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::FutureExt;
use futures::future::{LocalBoxFuture, Shared};
use indexmap::IndexMap;

use super::{Region, capabilities, source};
use crate::dispatch::{self, Command, Reply};
use crate::engine::attrs;
use crate::engine::env::Env;
use crate::engine::path::{self, Coordinate, Fragments};
use crate::engine::value::{RemoteRef, Value, lookup_path};
use crate::error::{DispatchError, StoreError};
use crate::pipeline::hydrate;
use crate::renderer::diagnostics::{self, Diagnostic};
use crate::store::{StoreTarget, SubscriptionId};
use crate::types::{NodeFlags, NodeId, RegionKind};

/// A spawned, awaitable unit of node work.
pub type NodeTask = Shared<LocalBoxFuture<'static, ()>>;

// =============================================================================
// Listener
// =============================================================================

/// A child's subscription to a node's value.
#[derive(Clone)]
pub struct Listener {
    pub target: BindingNode,
    /// Field of the target's synthesized value this listener owns.
    pub key: Option<String>,
    /// Sub-path looked up inside the pushed value.
    pub path: Option<String>,
}

impl Listener {
    pub fn new(target: BindingNode, key: Option<String>, path: Option<String>) -> Self {
        Self { target, key, path }
    }

    fn same_slot(&self, other: &Listener) -> bool {
        self.target.host() == other.target.host() && self.key == other.key
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("target", &self.target.host())
            .field("key", &self.key)
            .field("path", &self.path)
            .finish()
    }
}

/// Where a pushed value came from, for diagnostic hints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushContext {
    /// Fully composed coordinate of the pushed value, when known.
    pub full_path: Option<String>,
}

impl PushContext {
    pub fn at(full_path: impl Into<String>) -> Self {
        Self {
            full_path: Some(full_path.into()),
        }
    }

    fn descend(&self, path: Option<&str>) -> Self {
        match (&self.full_path, path) {
            (Some(base), Some(path)) => Self::at(path::join(base, path)),
            (Some(base), None) => Self::at(base.as_str()),
            (None, _) => Self::default(),
        }
    }
}

// =============================================================================
// Node State
// =============================================================================

/// One change subscription per remote object, shared by every coordinate of
/// the node that reads from it.
struct StoreBinding {
    identity: String,
    object: RemoteRef,
    subscription: SubscriptionId,
    slots: Vec<(Option<String>, String)>,
}

#[derive(Default)]
struct NodeState {
    value: Option<Value>,
    parent: Option<Weak<NodeInner>>,
    listeners: Vec<Listener>,
    props: IndexMap<String, Value>,
    props_base: Option<Value>,
    context_base: PushContext,
    contexts: IndexMap<String, PushContext>,
    flags: NodeFlags,
    in_flight: Option<NodeTask>,
    lifecycle: Option<NodeTask>,
    lifecycle_seq: u64,
    store_bindings: Vec<StoreBinding>,
    focus_cleanup: Option<Box<dyn FnOnce()>>,
    update_passes: u64,
}

impl NodeState {
    /// Keyed slices laid over the unkeyed one.
    fn merged(&self) -> Option<Value> {
        if self.props.is_empty() {
            return self.props_base.clone();
        }
        let mut merged = match &self.props_base {
            Some(Value::Object(base)) => base.clone(),
            _ => IndexMap::new(),
        };
        for (key, value) in &self.props {
            merged.insert(key.clone(), value.clone());
        }
        Some(Value::Object(merged))
    }
}

pub(crate) struct NodeInner {
    host: NodeId,
    kind: RegionKind,
    env: Rc<Env>,
    region: RefCell<Region>,
    state: RefCell<NodeState>,
}

// =============================================================================
// Binding Node
// =============================================================================

#[derive(Clone)]
pub struct BindingNode(Rc<NodeInner>);

/// Non-owning handle, for callbacks stored outside the node.
#[derive(Clone)]
pub(crate) struct WeakBindingNode(Weak<NodeInner>);

impl WeakBindingNode {
    pub(crate) fn upgrade(&self) -> Option<BindingNode> {
        self.0.upgrade().map(BindingNode)
    }
}

impl fmt::Debug for BindingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingNode")
            .field("host", &self.host())
            .field("kind", &self.kind())
            .field("flags", &self.flags())
            .finish()
    }
}

impl BindingNode {
    pub fn new(env: &Rc<Env>, host: NodeId, kind: RegionKind) -> Self {
        Self(Rc::new(NodeInner {
            host,
            kind,
            env: env.clone(),
            region: RefCell::new(Region::new(kind)),
            state: RefCell::new(NodeState::default()),
        }))
    }

    pub fn host(&self) -> NodeId {
        self.0.host
    }

    pub fn kind(&self) -> RegionKind {
        self.0.kind
    }

    pub fn env(&self) -> &Rc<Env> {
        &self.0.env
    }

    pub fn ptr_eq(&self, other: &BindingNode) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn downgrade(&self) -> WeakBindingNode {
        WeakBindingNode(Rc::downgrade(&self.0))
    }

    /// Current effective value, if one has been accepted.
    pub fn value(&self) -> Option<Value> {
        self.0.state.borrow().value.clone()
    }

    pub fn flags(&self) -> NodeFlags {
        self.0.state.borrow().flags
    }

    pub fn has_flag(&self, flag: NodeFlags) -> bool {
        self.flags().contains(flag)
    }

    pub(crate) fn set_flag(&self, flag: NodeFlags, on: bool) {
        self.0.state.borrow_mut().flags.set(flag, on);
    }

    pub fn parent(&self) -> Option<BindingNode> {
        self.0
            .state
            .borrow()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(BindingNode)
    }

    pub(crate) fn set_parent(&self, parent: Option<&BindingNode>) {
        self.0.state.borrow_mut().parent = parent.map(|p| Rc::downgrade(&p.0));
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.0.state.borrow().listeners.clone()
    }

    /// Number of update passes that have started.
    pub fn update_passes(&self) -> u64 {
        self.0.state.borrow().update_passes
    }

    /// Context of the unkeyed slice.
    pub fn context(&self) -> PushContext {
        self.0.state.borrow().context_base.clone()
    }

    /// Context of a keyed slice.
    pub fn context_for(&self, key: &str) -> Option<PushContext> {
        self.0.state.borrow().contexts.get(key).cloned()
    }

    pub(crate) fn region(&self) -> Ref<'_, Region> {
        self.0.region.borrow()
    }

    pub(crate) fn region_mut(&self) -> RefMut<'_, Region> {
        self.0.region.borrow_mut()
    }

    pub(crate) fn set_focus_cleanup(&self, cleanup: Box<dyn FnOnce()>) {
        let previous = self.0.state.borrow_mut().focus_cleanup.replace(cleanup);
        if let Some(previous) = previous {
            previous();
        }
    }

    /// A host attribute, read fresh from the document.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.env().doc().attr(self.host(), name).map(String::from)
    }

    pub fn fragments(&self) -> Fragments {
        let doc = self.env().doc();
        doc.attrs(self.host())
            .map(Fragments::from_attrs)
            .unwrap_or_default()
    }

    /// Coordinate attributes as `(key, fragment)` pairs; `data-prop` has no key.
    fn coordinate_attrs(&self) -> Vec<(Option<String>, String)> {
        let doc = self.env().doc();
        let Some(attributes) = doc.attrs(self.host()) else {
            return Vec::new();
        };
        attributes
            .iter()
            .filter_map(|(name, value)| {
                if name == attrs::PROP {
                    Some((None, value.clone()))
                } else {
                    name.strip_prefix(attrs::PROP_PREFIX)
                        .map(|key| (Some(key.to_string()), value.clone()))
                }
            })
            .collect()
    }

    // =========================================================================
    // Value Propagation
    // =========================================================================

    /// Accept a value from a listener slot.
    ///
    /// Looks `path` up inside `value`, merges the result into the keyed or
    /// unkeyed slice, validates the merged value and, when the region accepts
    /// it, mounts (first time) and updates.
    pub fn push_value(
        &self,
        value: Value,
        key: Option<String>,
        path: Option<String>,
        context: PushContext,
    ) -> LocalBoxFuture<'static, ()> {
        let node = self.clone();
        async move {
            let looked_up = match path.as_deref() {
                Some(path) => match lookup_path(&value, path).await {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::error!(host = %node.host(), path, error = %err, "value lookup failed");
                        None
                    }
                },
                None => Some(value),
            };
            let context = context.descend(path.as_deref());

            let Some(merged) = node.merge_slice(key, looked_up, context) else {
                return;
            };
            if !node.has_flag(NodeFlags::CONNECTED) {
                return;
            }
            let Some(validated) = capabilities::validate_value(&node, merged) else {
                return;
            };

            if !node.has_flag(NodeFlags::MOUNTED) && capabilities::validate_configuration(&node) {
                node.mount();
            }
            let recovering = node.has_flag(NodeFlags::ERRORED);
            if node.has_flag(NodeFlags::MOUNTED)
                && (recovering || capabilities::should_update(&node, &validated))
            {
                node.clear_diagnostic();
                node.0.state.borrow_mut().value = Some(validated);
                node.update().await;
            }
        }
        .boxed_local()
    }

    fn merge_slice(
        &self,
        key: Option<String>,
        value: Option<Value>,
        context: PushContext,
    ) -> Option<Value> {
        let mut state = self.0.state.borrow_mut();
        match (key, value) {
            (None, value) => {
                state.props_base = value;
                state.context_base = context;
            }
            (Some(key), Some(value)) => {
                state.props.insert(key.clone(), value);
                state.contexts.insert(key, context);
            }
            (Some(key), None) => {
                state.props.shift_remove(&key);
                state.contexts.shift_remove(&key);
            }
        }

        state.merged()
    }

    /// Re-apply the latest merged slices. Values that arrived while the
    /// region refused updates (e.g. while focused) land now.
    pub(crate) fn resync(&self) -> LocalBoxFuture<'static, ()> {
        let node = self.clone();
        async move {
            let Some(merged) = node.0.state.borrow().merged() else {
                return;
            };
            if !node.has_flag(NodeFlags::MOUNTED) {
                return;
            }
            let Some(validated) = capabilities::validate_value(&node, merged) else {
                return;
            };
            if capabilities::should_update(&node, &validated) {
                node.0.state.borrow_mut().value = Some(validated);
                node.update().await;
            }
        }
        .boxed_local()
    }

    /// Store a value without validation. Used for optimistic local edits.
    pub(crate) fn set_value(&self, value: Option<Value>) {
        self.0.state.borrow_mut().value = value;
    }

    fn mount(&self) {
        if self.has_flag(NodeFlags::MOUNTED) {
            return;
        }
        self.set_flag(NodeFlags::MOUNTED, true);
        tracing::debug!(host = %self.host(), kind = %self.kind(), "mounting region");
        capabilities::mount(self);
    }

    /// Run (or join) an update pass.
    pub fn update(&self) -> NodeTask {
        let mut state = self.0.state.borrow_mut();
        if let Some(in_flight) = state.in_flight.clone() {
            state.flags.insert(NodeFlags::PENDING_UPDATE);
            return in_flight;
        }

        let node = self.clone();
        let task = async move {
            loop {
                {
                    let mut state = node.0.state.borrow_mut();
                    state.flags.remove(NodeFlags::PENDING_UPDATE);
                    state.update_passes += 1;
                }
                tracing::debug!(host = %node.host(), kind = %node.kind(), "update pass");
                capabilities::run_update(&node).await;

                let mut state = node.0.state.borrow_mut();
                if !state.flags.contains(NodeFlags::PENDING_UPDATE) {
                    state.in_flight = None;
                    return;
                }
            }
        }
        .boxed_local()
        .shared();

        state.in_flight = Some(task.clone());
        drop(state);
        self.env().spawn(task.clone());
        task
    }

    /// Request an update pass without waiting for it.
    pub fn schedule_update(&self) {
        drop(self.update());
    }

    /// Push the current value to every listener, in registration order.
    pub(crate) async fn forward_to_listeners(&self) {
        let (value, listeners, context) = {
            let state = self.0.state.borrow();
            (state.value.clone(), state.listeners.clone(), state.context_base.clone())
        };
        let Some(value) = value else {
            return;
        };
        for listener in listeners {
            listener
                .target
                .push_value(value.clone(), listener.key, listener.path, context.clone())
                .await;
        }
    }

    /// Push the current value to the listeners bound to one host.
    pub(crate) async fn forward_to_host(&self, host: NodeId) {
        let (value, listeners, context) = {
            let state = self.0.state.borrow();
            let listeners: Vec<Listener> = state
                .listeners
                .iter()
                .filter(|listener| listener.target.host() == host)
                .cloned()
                .collect();
            (state.value.clone(), listeners, state.context_base.clone())
        };
        let Some(value) = value else {
            return;
        };
        for listener in listeners {
            listener
                .target
                .push_value(value.clone(), listener.key, listener.path, context.clone())
                .await;
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Subscribe a child. Ignored when the same host already listens on the
    /// same key. The current value, if any, is replayed on the next tick.
    pub fn register_listener(&self, mut listener: Listener) {
        if self.kind() == RegionKind::Array && listener.path.is_none() {
            let doc = self.env().doc();
            listener.path = super::array::item_children(&doc, self.host())
                .iter()
                .position(|child| *child == listener.target.host())
                .map(|index| index.to_string());
        }

        let replay = {
            let mut state = self.0.state.borrow_mut();
            if state.listeners.iter().any(|existing| existing.same_slot(&listener)) {
                return;
            }
            state.listeners.push(listener.clone());
            state
                .value
                .clone()
                .map(|value| (value, state.context_base.clone()))
        };
        tracing::debug!(host = %self.host(), listener = %listener.target.host(), "listener registered");

        if let Some((value, context)) = replay {
            self.env().spawn(listener.target.push_value(
                value,
                listener.key,
                listener.path,
                context,
            ));
        }
    }

    /// Register or re-point a listener without replaying.
    pub(crate) fn upsert_listener(&self, listener: Listener) {
        let mut state = self.0.state.borrow_mut();
        match state
            .listeners
            .iter_mut()
            .find(|existing| existing.same_slot(&listener))
        {
            Some(existing) => existing.path = listener.path,
            None => state.listeners.push(listener),
        }
    }

    /// Remove every listener bound to `host`. Idempotent.
    pub fn deregister_listener(&self, host: NodeId) {
        self.0
            .state
            .borrow_mut()
            .listeners
            .retain(|listener| listener.target.host() != host);
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    fn enqueue<F>(&self, op: F) -> NodeTask
    where
        F: FnOnce(BindingNode) -> LocalBoxFuture<'static, ()> + 'static,
    {
        let (previous, seq) = {
            let mut state = self.0.state.borrow_mut();
            state.lifecycle_seq += 1;
            (state.lifecycle.take(), state.lifecycle_seq)
        };
        let node = self.clone();
        let task = async move {
            if let Some(previous) = previous {
                previous.await;
            }
            op(node.clone()).await;
            let mut state = node.0.state.borrow_mut();
            if state.lifecycle_seq == seq {
                state.lifecycle = None;
            }
        }
        .boxed_local()
        .shared();

        self.0.state.borrow_mut().lifecycle = Some(task.clone());
        self.env().spawn(task.clone());
        task
    }

    /// Wire the node into the graph once the environment is ready.
    pub fn connect(&self) -> NodeTask {
        self.enqueue(|node| async move { node.run_connect().await }.boxed_local())
    }

    /// Unwire the node: parent listener, store subscriptions, editor.
    pub fn disconnect(&self) -> NodeTask {
        self.enqueue(|node| async move { node.run_disconnect() }.boxed_local())
    }

    async fn run_connect(&self) {
        if self.has_flag(NodeFlags::CONNECTED) {
            return;
        }
        let env = self.env().clone();
        env.ready().wait().await;

        let registered = env
            .registry()
            .get(self.host())
            .is_some_and(|node| node.ptr_eq(self));
        if !registered {
            tracing::debug!(host = %self.host(), "skipping connect of dehydrated node");
            return;
        }

        let parent = {
            let doc = env.doc();
            env.registry().nearest_ancestor(&doc, self.host())
        };
        self.set_parent(parent.as_ref());
        self.set_flag(NodeFlags::CONNECTED, true);
        tracing::debug!(
            host = %self.host(),
            kind = %self.kind(),
            parent = ?parent.as_ref().map(BindingNode::host),
            "connecting region"
        );

        let coordinates = self.coordinate_attrs();
        for (key, fragment) in &coordinates {
            if path::is_absolute(fragment) || fragment.starts_with("@snippet[") {
                self.bind_store(key.clone(), fragment).await;
            } else if let Some(parent) = &parent {
                let listener = Listener::new(self.clone(), key.clone(), Some(fragment.clone()));
                parent.register_listener(listener);
            } else {
                self.bind_current_file(key.clone(), fragment.clone()).await;
            }
        }

        if coordinates.is_empty() {
            match (self.kind(), &parent) {
                (RegionKind::ArrayItem, Some(parent)) => {
                    parent.register_listener(Listener::new(self.clone(), None, None));
                }
                (RegionKind::Component, _) => {
                    self.env().spawn(self.push_value(
                        Value::Object(IndexMap::new()),
                        None,
                        None,
                        PushContext::default(),
                    ));
                }
                _ => {}
            }
        }

        if self.kind() == RegionKind::Source {
            source::connect(self).await;
        }

        if capabilities::validate_configuration(self) && self.value().is_some() {
            self.mount();
            self.update().await;
        }
    }

    fn run_disconnect(&self) {
        if !self.has_flag(NodeFlags::CONNECTED) {
            return;
        }
        tracing::debug!(host = %self.host(), kind = %self.kind(), "disconnecting region");
        if let Some(parent) = self.parent() {
            parent.deregister_listener(self.host());
        }
        self.release_store_bindings();
        capabilities::unmount(self);

        let cleanup = {
            let mut state = self.0.state.borrow_mut();
            state.parent = None;
            state.flags.remove(NodeFlags::CONNECTED | NodeFlags::MOUNTED);
            state.focus_cleanup.take()
        };
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        self.env().focus().forget(self.host());
    }

    /// Drop every strong link this node holds. Used on environment teardown.
    pub(crate) fn release_links(&self) {
        self.release_store_bindings();
        let mut state = self.0.state.borrow_mut();
        state.listeners.clear();
        state.parent = None;
        state.in_flight = None;
        state.lifecycle = None;
        state.focus_cleanup = None;
    }

    fn release_store_bindings(&self) {
        let bindings = std::mem::take(&mut self.0.state.borrow_mut().store_bindings);
        for binding in bindings {
            binding.object.unsubscribe(binding.subscription);
        }
    }

    // =========================================================================
    // Store Bindings
    // =========================================================================

    async fn bind_store(&self, key: Option<String>, fragment: &str) {
        let coordinate = match Coordinate::parse(fragment) {
            Ok(coordinate) => coordinate,
            Err(err) => {
                self.show_diagnostic(&Diagnostic::new(
                    "Failed to resolve data coordinate",
                    err.to_string(),
                ));
                return;
            }
        };
        let identity = StoreTarget::from_coordinate(&coordinate).to_string();
        match self.resolve_object(&coordinate).await {
            Ok(object) => self.attach_store(identity, object, key, coordinate.path),
            Err(err) => {
                tracing::error!(host = %self.host(), coordinate = fragment, error = %err, "store binding failed");
            }
        }
    }

    async fn bind_current_file(&self, key: Option<String>, fragment: String) {
        match self.env().store().current_file().await {
            Ok(file) => {
                self.attach_store("@current".to_string(), RemoteRef::File(file), key, fragment)
            }
            Err(err) => {
                tracing::error!(host = %self.host(), error = %err, "current file unavailable");
            }
        }
    }

    async fn resolve_object(&self, coordinate: &Coordinate) -> Result<RemoteRef, StoreError> {
        let store = self.env().store().clone();
        if let Some(id) = coordinate.snippets.last() {
            return Ok(RemoteRef::File(store.snippet(id).await?));
        }
        Ok(match &coordinate.anchor {
            path::Anchor::Collection(key) => RemoteRef::Collection(store.collection(key).await?),
            path::Anchor::File(file) => RemoteRef::File(store.file(file).await?),
            path::Anchor::Dataset(key) => RemoteRef::Dataset(store.dataset(key).await?),
            path::Anchor::CurrentFile => RemoteRef::File(store.current_file().await?),
        })
    }

    /// Subscribe once per remote object and push its handle into the slot.
    pub(crate) fn attach_store(
        &self,
        identity: String,
        object: RemoteRef,
        key: Option<String>,
        path: String,
    ) {
        let existing = self
            .0
            .state
            .borrow()
            .store_bindings
            .iter()
            .any(|binding| binding.identity == identity);

        if existing {
            let mut state = self.0.state.borrow_mut();
            if let Some(binding) = state
                .store_bindings
                .iter_mut()
                .find(|binding| binding.identity == identity)
            {
                binding.slots.push((key.clone(), path.clone()));
            }
        } else {
            let weak = Rc::downgrade(&self.0);
            let changed = identity.clone();
            let subscription = object.subscribe(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    BindingNode(inner).refresh_store(&changed);
                }
            }));
            tracing::debug!(host = %self.host(), object = %identity, "subscribed to store object");
            self.0.state.borrow_mut().store_bindings.push(StoreBinding {
                identity,
                object: object.clone(),
                subscription,
                slots: vec![(key.clone(), path.clone())],
            });
        }

        let context = PushContext::at(object.describe());
        self.env().spawn(self.push_value(Value::Remote(object), key, Some(path), context));
    }

    fn refresh_store(&self, identity: &str) {
        let found = {
            let state = self.0.state.borrow();
            state
                .store_bindings
                .iter()
                .find(|binding| binding.identity == identity)
                .map(|binding| (binding.object.clone(), binding.slots.clone()))
        };
        let Some((object, slots)) = found else {
            return;
        };
        tracing::debug!(host = %self.host(), object = identity, "store object changed");
        let context = PushContext::at(object.describe());
        for (key, path) in slots {
            self.env().spawn(self.push_value(
                Value::Remote(object.clone()),
                key,
                Some(path),
                context.clone(),
            ));
        }
    }

    /// Number of distinct store objects this node is subscribed to.
    pub fn store_subscriptions(&self) -> usize {
        self.0.state.borrow().store_bindings.len()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Route a command up the parent chain to the store.
    pub async fn dispatch(&self, command: Command) -> Result<Reply, DispatchError> {
        dispatch::route(self, command).await
    }

    /// Dispatch without waiting, logging failures.
    pub(crate) fn dispatch_detached(&self, command: Command) {
        let node = self.clone();
        self.env()
            .spawn_fallible("dispatch", async move { node.dispatch(command).await.map(|_| ()) });
    }

    /// Compose a local fragment through this node's ancestors into the
    /// coordinate it addresses. `None` while some ancestor cannot contribute.
    pub fn resolve_coordinate(&self, local: &str) -> Option<String> {
        let mut coordinate = local.to_string();
        let mut current = self.parent();
        while let Some(node) = current {
            if path::is_absolute(&coordinate) {
                break;
            }
            coordinate = node.fragments().extend(&coordinate)?;
            current = node.parent();
        }
        Some(coordinate)
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub(crate) fn show_diagnostic(&self, diagnostic: &Diagnostic) {
        self.show_diagnostic_keeping(diagnostic, |_, _| false);
    }

    /// Replace the host's content with a card, keeping matching children.
    pub(crate) fn show_diagnostic_keeping(
        &self,
        diagnostic: &Diagnostic,
        keep: impl Fn(&crate::engine::Document, NodeId) -> bool,
    ) {
        self.set_flag(NodeFlags::ERRORED, true);
        let env = self.env().clone();
        let doomed: Vec<NodeId> = {
            let doc = env.doc();
            doc.children(self.host())
                .into_iter()
                .filter(|child| !keep(&doc, *child))
                .collect()
        };
        for child in &doomed {
            hydrate::dehydrate(&env, *child);
        }
        let result = diagnostics::show_keeping(
            &mut env.doc_mut(),
            self.host(),
            diagnostic,
            env.config(),
            |_, child| !doomed.contains(&child),
        );
        if let Err(err) = result {
            tracing::error!(host = %self.host(), error = %err, "failed to show diagnostic");
        }
    }

    pub(crate) fn clear_diagnostic(&self) {
        if !self.has_flag(NodeFlags::ERRORED) {
            return;
        }
        self.set_flag(NodeFlags::ERRORED, false);
        let env = self.env();
        let result = diagnostics::clear(&mut env.doc_mut(), self.host(), env.config());
        if let Err(err) = result {
            tracing::error!(host = %self.host(), error = %err, "failed to clear diagnostic");
        }
    }
}
