//! # editable-regions
//!
//! Hierarchical editable-region engine.
//!
//! Hosts in a live document declare regions with attributes (`data-editable`,
//! `data-prop`, ...). Each host gets a binding node; nodes form a graph that
//! carries remote values down to renderers and editors, and carries edits up
//! to the remote store as commands.
//!
//! ## Architecture
//!
//! ```text
//! RemoteStore ──▶ BindingNode (absolute coordinate)
//!                   │ listeners
//!                   ▼
//!                 BindingNode ──▶ Region::update ──▶ tree / list reconcile ──▶ Document
//!                   ▲
//!   edit ───────────┘ dispatch (up the parent chain) ──▶ RemoteStore
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Core types (NodeId, RegionKind, NodeFlags, ...)
//! - [`engine`] - Document, coordinates, values, registry, environment
//! - [`regions`] - Binding nodes and the region kinds
//! - [`reconcile`] - Tree and list reconcilers
//! - [`dispatch`] - Edit commands routed to the store
//! - [`pipeline`] - Hydration and mounting
//! - [`renderer`] - Renderer registry and diagnostics
//! - [`state`] - Focus and readiness
//! - [`store`] - Remote store adapter and an in-memory implementation

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod regions;
pub mod renderer;
pub mod state;
pub mod store;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use config::{EngineConfig, RetryPolicy};

pub use dispatch::{Command, Reply};

pub use engine::{
    Clock, Document, EditorOptions, Env, EnvBuilder, ImmediateClock, PlainTextEditor, TextEditor,
    VElement, VNode, Value,
};

pub use error::{DispatchError, EngineError, PathError, RenderError, StoreError};

pub use pipeline::{MountHandle, dehydrate, hydrate, mount, unmount};

pub use regions::{BindingNode, Listener, NodeTask, PushContext, Region};

pub use renderer::{Diagnostic, Namespace, Renderer, RendererRegistry, renderer};

pub use state::{FocusCallbacks, FocusState, ReadyState};

pub use store::{
    InputConfig, MemoryStore, RemoteCollection, RemoteDataset, RemoteFile, RemoteStore, StoreOp,
    StoreTarget,
};
