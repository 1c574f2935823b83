//! Focus tracking for editable text.
//!
//! The editing widget reports focus and blur on host nodes. The engine only
//! needs to know which host currently holds focus so that reconciliation
//! never replaces it and incoming values never overwrite in-progress input.
//!
//! - `focused` signal (currently focused host, if any)
//! - Focus callbacks (on_focus/on_blur) registered per host
//!
//! # Example
//!
//! ```ignore
//! let cleanup = env.focus().register_callbacks(host, FocusCallbacks {
//!     on_focus: Some(Box::new(|| println!("Focused!"))),
//!     on_blur: Some(Box::new(|| println!("Blurred!"))),
//! });
//! env.focus().focus(host);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use spark_signals::{Signal, signal};

use crate::types::NodeId;

/// Callbacks fired when focus changes.
#[derive(Default)]
pub struct FocusCallbacks {
    pub on_focus: Option<Box<dyn Fn()>>,
    pub on_blur: Option<Box<dyn Fn()>>,
}

type CallbackRegistry = HashMap<NodeId, Vec<(u64, Rc<FocusCallbacks>)>>;

/// Focus state of one environment.
pub struct FocusState {
    focused: Signal<Option<NodeId>>,
    callbacks: Rc<RefCell<CallbackRegistry>>,
    next_callback: Cell<u64>,
}

impl Default for FocusState {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusState {
    pub fn new() -> Self {
        Self {
            focused: signal(None),
            callbacks: Rc::new(RefCell::new(HashMap::new())),
            next_callback: Cell::new(0),
        }
    }

    /// The reactive focused-host signal.
    pub fn signal(&self) -> Signal<Option<NodeId>> {
        self.focused.clone()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused.get()
    }

    pub fn is_focused(&self, host: NodeId) -> bool {
        self.focused() == Some(host)
    }

    /// Register focus callbacks for a host.
    /// Returns cleanup function to unregister.
    pub fn register_callbacks(
        &self,
        host: NodeId,
        callbacks: FocusCallbacks,
    ) -> impl FnOnce() + use<> {
        let id = self.next_callback.get();
        self.next_callback.set(id + 1);
        self.callbacks
            .borrow_mut()
            .entry(host)
            .or_default()
            .push((id, Rc::new(callbacks)));

        let registry = Rc::downgrade(&self.callbacks);
        move || {
            let Some(registry) = registry.upgrade() else {
                return;
            };
            let mut registry = registry.borrow_mut();
            if let Some(list) = registry.get_mut(&host) {
                list.retain(|(other, _)| *other != id);
                if list.is_empty() {
                    registry.remove(&host);
                }
            }
        }
    }

    fn callbacks_for(&self, host: NodeId) -> Vec<Rc<FocusCallbacks>> {
        self.callbacks
            .borrow()
            .get(&host)
            .map(|list| list.iter().map(|(_, cb)| cb.clone()).collect())
            .unwrap_or_default()
    }

    /// Move focus to `host`, blurring the previous host first.
    pub fn focus(&self, host: NodeId) {
        let previous = self.focused();
        if previous == Some(host) {
            return;
        }
        if let Some(previous) = previous {
            for cb in self.callbacks_for(previous) {
                if let Some(on_blur) = &cb.on_blur {
                    on_blur();
                }
            }
        }

        self.focused.set(Some(host));
        tracing::trace!(%host, "focus");

        for cb in self.callbacks_for(host) {
            if let Some(on_focus) = &cb.on_focus {
                on_focus();
            }
        }
    }

    /// Blur `host` if it holds focus. A stale blur for another host is ignored.
    pub fn blur(&self, host: NodeId) {
        if !self.is_focused(host) {
            return;
        }
        self.focused.set(None);
        tracing::trace!(%host, "blur");
        for cb in self.callbacks_for(host) {
            if let Some(on_blur) = &cb.on_blur {
                on_blur();
            }
        }
    }

    /// Drop any focus and callbacks held for a host that left the tree.
    pub fn forget(&self, host: NodeId) {
        if self.is_focused(host) {
            self.focused.set(None);
        }
        self.callbacks.borrow_mut().remove(&host);
    }
}
