//! Remote store adapter.
//!
//! The engine never talks to a transport directly. Hosts provide a
//! [`RemoteStore`] that resolves anchors to remote objects, exposes their
//! data and change subscriptions, and applies write operations.
//!
//! All futures are `!Send`: the engine runs on a single threaded executor.

pub mod memory;

use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::engine::path::{Anchor, Coordinate};
use crate::engine::value::Value;
use crate::error::StoreError;

pub use memory::{MemoryStore, StoreOp};

/// Handle returned by `subscribe`, used to remove exactly that registration.
pub type SubscriptionId = u64;

/// Change notification. Called synchronously by the store.
pub type ChangeCallback = Rc<dyn Fn()>;

// =============================================================================
// Remote Objects
// =============================================================================

/// Change subscriptions shared by every remote object.
pub trait Subscribable {
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// A single document-like object: a file, the current file, or a snippet.
pub trait RemoteFile: Subscribable {
    fn path(&self) -> &str;
    fn data(&self) -> LocalBoxFuture<'_, Result<Value, StoreError>>;
    /// Raw source text of the file.
    fn source(&self) -> LocalBoxFuture<'_, Result<String, StoreError>>;
    fn set_source(&self, source: String) -> LocalBoxFuture<'_, Result<(), StoreError>>;
}

/// A named, ordered set of files.
pub trait RemoteCollection: Subscribable {
    fn key(&self) -> &str;
    fn items(&self) -> LocalBoxFuture<'_, Result<Vec<Rc<dyn RemoteFile>>, StoreError>>;
}

/// What a dataset resolves to.
pub enum DatasetItems {
    Single(Rc<dyn RemoteFile>),
    Many(Vec<Rc<dyn RemoteFile>>),
}

pub trait RemoteDataset: Subscribable {
    fn key(&self) -> &str;
    fn items(&self) -> LocalBoxFuture<'_, Result<DatasetItems, StoreError>>;
}

// =============================================================================
// Write Targets
// =============================================================================

/// The remote object a write operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreTarget {
    Collection(String),
    File(String),
    Dataset(String),
    CurrentFile,
    /// A snippet addressed inside another target.
    Snippet { within: Box<StoreTarget>, id: String },
}

impl StoreTarget {
    /// Anchor first, then snippet ids wrap it in order.
    pub fn from_coordinate(coordinate: &Coordinate) -> Self {
        let base = match &coordinate.anchor {
            Anchor::Collection(key) => Self::Collection(key.clone()),
            Anchor::File(path) => Self::File(path.clone()),
            Anchor::Dataset(key) => Self::Dataset(key.clone()),
            Anchor::CurrentFile => Self::CurrentFile,
        };
        coordinate
            .snippets
            .iter()
            .fold(base, |within, id| Self::Snippet {
                within: Box::new(within),
                id: id.clone(),
            })
    }
}

impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collection(key) => write!(f, "@collections[{key}]"),
            Self::File(path) => write!(f, "@file[{path}]"),
            Self::Dataset(key) => write!(f, "@data[{key}]"),
            Self::CurrentFile => f.write_str("@current"),
            Self::Snippet { within, id } => write!(f, "{within}.@snippet[{id}]"),
        }
    }
}

/// Input configuration for a coordinate, as reported by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub options: InputOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputOptions {
    #[serde(default)]
    pub disable_reorder: bool,
    #[serde(default)]
    pub disable_remove: bool,
    #[serde(default)]
    pub disable_add: bool,
}

impl InputConfig {
    /// Answer used when a coordinate cannot be resolved: no reordering, no
    /// removal.
    pub fn restricted() -> Self {
        Self {
            options: InputOptions {
                disable_reorder: true,
                disable_remove: true,
                disable_add: false,
            },
        }
    }
}

// =============================================================================
// Store Adapter
// =============================================================================

pub trait RemoteStore {
    fn collection(
        &self,
        key: &str,
    ) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteCollection>, StoreError>>;
    fn file(&self, path: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>>;
    fn dataset(&self, key: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteDataset>, StoreError>>;
    fn current_file(&self) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>>;
    fn snippet(&self, id: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>>;

    fn set(
        &self,
        target: &StoreTarget,
        path: &str,
        value: serde_json::Value,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>>;

    /// Insert at `index` (append when `None`). A missing value lets the store
    /// build a default entry, optionally modeled on `source_index`.
    fn add_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        index: Option<usize>,
        value: Option<serde_json::Value>,
        source_index: Option<usize>,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>>;

    fn remove_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        index: usize,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>>;

    /// Move within one array, or from another array when `from_path` is set.
    fn move_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        from: usize,
        to: usize,
        from_path: Option<&str>,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>>;

    /// Open the host editor at a coordinate.
    fn edit(&self, target: &StoreTarget, path: &str) -> LocalBoxFuture<'_, Result<(), StoreError>>;

    fn input_config(
        &self,
        target: &StoreTarget,
        path: &str,
    ) -> LocalBoxFuture<'_, Result<InputConfig, StoreError>>;

    /// URL the host can display for an asset path (e.g. an image upload).
    fn preview_url(&self, asset: &str) -> LocalBoxFuture<'_, Result<String, StoreError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_coordinate_wraps_snippets() {
        let coord = Coordinate::parse("@file[a.md].@snippet[s1].@snippet[s2].title").unwrap();
        let target = StoreTarget::from_coordinate(&coord);
        assert_eq!(target.to_string(), "@file[a.md].@snippet[s1].@snippet[s2]");

        let coord = Coordinate::parse("title").unwrap();
        assert_eq!(StoreTarget::from_coordinate(&coord), StoreTarget::CurrentFile);
    }

    #[test]
    fn test_input_config_defaults() {
        let config: InputConfig =
            serde_json::from_str(r#"{"options":{"disable_add":true}}"#).unwrap();
        assert!(config.options.disable_add);
        assert!(!config.options.disable_reorder);

        let restricted = InputConfig::restricted();
        assert!(restricted.options.disable_reorder && restricted.options.disable_remove);
    }
}
