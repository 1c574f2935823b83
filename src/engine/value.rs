//! Values flowing through binding nodes.
//!
//! A [`Value`] is JSON shaped but may also hold lazy handles to remote
//! objects. Handles are expanded one level at a time while a path is looked
//! up, and fully realized into `serde_json::Value` before a renderer sees them.

use std::fmt;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;

use crate::error::StoreError;
use crate::store::{
    ChangeCallback, DatasetItems, RemoteCollection, RemoteDataset, RemoteFile, SubscriptionId,
};

// =============================================================================
// Remote Handles
// =============================================================================

/// A lazy reference to a remote object.
#[derive(Clone)]
pub enum RemoteRef {
    Collection(Rc<dyn RemoteCollection>),
    File(Rc<dyn RemoteFile>),
    Dataset(Rc<dyn RemoteDataset>),
}

impl RemoteRef {
    /// Stable identity of the referenced object, e.g. `@file[about.md]`.
    pub fn describe(&self) -> String {
        match self {
            Self::Collection(c) => format!("@collections[{}]", c.key()),
            Self::File(f) => format!("@file[{}]", f.path()),
            Self::Dataset(d) => format!("@data[{}]", d.key()),
        }
    }

    pub fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        match self {
            Self::Collection(c) => c.subscribe(callback),
            Self::File(f) => f.subscribe(callback),
            Self::Dataset(d) => d.subscribe(callback),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        match self {
            Self::Collection(c) => c.unsubscribe(id),
            Self::File(f) => f.unsubscribe(id),
            Self::Dataset(d) => d.unsubscribe(id),
        }
    }

    /// Expand one level: collections and multi-file datasets become arrays of
    /// file handles, files become their data.
    pub async fn expand(&self) -> Result<Value, StoreError> {
        match self {
            Self::Collection(c) => Ok(files_to_array(c.items().await?)),
            Self::File(f) => f.data().await,
            Self::Dataset(d) => match d.items().await? {
                DatasetItems::Many(files) => Ok(files_to_array(files)),
                DatasetItems::Single(file) => file.data().await,
            },
        }
    }

    fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Collection(a), Self::Collection(b)) => Rc::ptr_eq(a, b),
            (Self::File(a), Self::File(b)) => Rc::ptr_eq(a, b),
            (Self::Dataset(a), Self::Dataset(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn files_to_array(files: Vec<Rc<dyn RemoteFile>>) -> Value {
    Value::Array(
        files
            .into_iter()
            .map(|file| Value::Remote(RemoteRef::File(file)))
            .collect(),
    )
}

impl fmt::Debug for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RemoteRef({})", self.describe())
    }
}

// =============================================================================
// Value
// =============================================================================

#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Remote(RemoteRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            (Self::Remote(a), Self::Remote(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Object(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(serde_json::Number::from(n))
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteRef> {
        match self {
            Self::Remote(remote) => Some(remote),
            _ => None,
        }
    }

    /// Shallow, synchronous child access. Remote handles are not expanded.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(map) => map.get(key),
            Self::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Name of the value's type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Remote(RemoteRef::Collection(_)) => "collection",
            Self::Remote(RemoteRef::File(_)) => "file",
            Self::Remote(RemoteRef::Dataset(_)) => "dataset",
        }
    }

    /// Whether any remote handle is reachable without expansion.
    pub fn contains_remote(&self) -> bool {
        match self {
            Self::Remote(_) => true,
            Self::Array(items) => items.iter().any(Value::contains_remote),
            Self::Object(map) => map.values().any(Value::contains_remote),
            _ => false,
        }
    }

    /// Convert without touching remote handles, which become `null`.
    pub fn to_json_lossy(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Remote(_) => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json_lossy).collect())
            }
            Self::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_lossy()))
                    .collect(),
            ),
        }
    }

    /// Expand every remote handle and convert to plain JSON.
    pub fn realize(&self) -> LocalBoxFuture<'_, Result<serde_json::Value, StoreError>> {
        async move {
            match self {
                Self::Remote(remote) => {
                    let expanded = remote.expand().await?;
                    expanded.realize().await
                }
                Self::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(item.realize().await?);
                    }
                    Ok(serde_json::Value::Array(out))
                }
                Self::Object(map) => {
                    let mut out = serde_json::Map::new();
                    for (key, item) in map {
                        out.insert(key.clone(), item.realize().await?);
                    }
                    Ok(serde_json::Value::Object(out))
                }
                plain => Ok(plain.to_json_lossy()),
            }
        }
        .boxed_local()
    }
}

/// Look up a dot separated path, expanding remote handles on the way.
///
/// `Ok(None)` means the path does not exist ("undefined"). An empty path
/// returns the value itself.
pub async fn lookup_path(value: &Value, path: &str) -> Result<Option<Value>, StoreError> {
    let mut current = value.clone();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if let Value::Remote(remote) = &current {
            current = remote.expand().await?;
        }
        match current.get(segment) {
            Some(next) => current = next.clone(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RemoteStore};
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_lookup_plain_path() {
        let value = Value::from(json!({"items": [{"title": "a"}, {"title": "b"}]}));
        let found = block_on(lookup_path(&value, "items.1.title")).unwrap();
        assert_eq!(found, Some(Value::from("b")));
        assert_eq!(block_on(lookup_path(&value, "items.5")).unwrap(), None);
        assert_eq!(block_on(lookup_path(&value, "")).unwrap(), Some(value.clone()));
    }

    #[test]
    fn test_lookup_expands_remote_handles() {
        let store = MemoryStore::new();
        store.insert_file("a.md", json!({"title": "A"}));
        store.insert_file("b.md", json!({"title": "B"}));
        store.insert_collection("posts", &["a.md", "b.md"]);

        let collection = block_on(store.collection("posts")).unwrap();
        let value = Value::Remote(RemoteRef::Collection(collection));
        let found = block_on(lookup_path(&value, "1.title")).unwrap();
        assert_eq!(found, Some(Value::from("B")));

        let realized = block_on(value.realize()).unwrap();
        assert_eq!(realized, json!([{"title": "A"}, {"title": "B"}]));
    }

    #[test]
    fn test_remote_equality_is_identity() {
        let store = MemoryStore::new();
        store.insert_file("a.md", json!({}));
        let a = block_on(store.file("a.md")).unwrap();
        let same = Value::Remote(RemoteRef::File(a.clone()));
        assert_eq!(same, Value::Remote(RemoteRef::File(a)));
        assert!(same.contains_remote());
        assert_eq!(same.type_name(), "file");
    }
}
