//! Hydration Pipeline
//!
//! Connects the live document to the binding graph.
//!
//! ```text
//! Document subtree → hydrate → BindingNode::connect → listeners → update
//! ```
//!
//! ## Data Flow
//!
//! 1. **hydrate** - Finds region hosts, creates and registers binding nodes
//! 2. **mount** - Hydrates a root and releases the readiness gate
//! 3. **dehydrate** - Unregisters nodes and queues their disconnect

pub mod hydrate;
pub mod mount;

pub use hydrate::{dehydrate, hydrate, release};
pub use mount::{MountHandle, mount, unmount};
