//! State Module - per-environment runtime state
//!
//! - **Focus** - focused host signal, per-host focus/blur callbacks
//! - **Ready** - one-way readiness gate every connect awaits

pub mod focus;
pub mod ready;

pub use focus::{FocusCallbacks, FocusState};
pub use ready::ReadyState;
