//! Reconcilers.
//!
//! - [`tree`]: patches a live subtree against rendered output, preserving
//!   focused and bound regions
//! - [`list`]: keeps list children in step with a list value, keyed or by
//!   position

pub mod list;
pub mod tree;

pub use list::{ListEntry, ListOptions, ListReport, reconcile_list};
pub use tree::{PatchReport, ReconcileContext, patch_children};
