//! Renderer - component renderers and inline diagnostics.
//!
//! - [`registry`]: keyed async renderers per namespace, with retrying lookup
//! - [`diagnostics`]: error cards shown inside a region's host

pub mod diagnostics;
pub mod registry;

pub use diagnostics::{Diagnostic, ERROR_CARD_TAG};
pub use registry::{Namespace, Renderer, RendererRegistry, renderer};
