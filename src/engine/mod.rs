//! Engine - the live document and everything binding nodes stand on.
//!
//! - Document: arena tree of element/text nodes with generation-checked ids
//! - VNode: owned subtree description produced by renderers
//! - Path: data coordinate grammar and composition
//! - Value: JSON-like values with lazy remote handles
//! - Registry: side table from host nodes to binding nodes
//! - Env: injected collaborators (store, renderers, clock, executor, editor)
//!
//! # Architecture
//!
//! Hosts are plain nodes. Engine state is never stored on them; a binding
//! node is found by looking its host up in the registry:
//!
//! ```text
//! Document            Registry              Binding nodes
//! body                                       
//!  └ div[data-prop=@file[a.md]]  ─ n3v0 ──▶  Component (value, listeners)
//!     └ h1[data-prop=title]      ─ n4v0 ──▶  Text      (parent: n3v0)
//! ```

pub mod attrs;
pub mod document;
pub mod env;
pub mod path;
pub mod registry;
pub mod value;
pub mod vnode;

pub use document::{Document, NodeKind};
pub use env::{Clock, EditorOptions, Env, EnvBuilder, ImmediateClock, PlainTextEditor, TextEditor};
pub use path::{Anchor, Coordinate, Fragments};
pub use registry::Registry;
pub use value::{RemoteRef, Value, lookup_path};
pub use vnode::{VElement, VNode};
