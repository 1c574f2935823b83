//! In-memory store.
//!
//! A complete [`RemoteStore`] backed by JSON documents held in memory. Writes
//! are applied immediately and change subscribers are notified synchronously.
//! Every operation is appended to a log so headless hosts and tests can
//! observe exactly what the engine asked for.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::future::LocalBoxFuture;
use indexmap::IndexMap;
use serde_json::Value as Json;

use super::{
    ChangeCallback, DatasetItems, InputConfig, RemoteCollection, RemoteDataset, RemoteFile,
    RemoteStore, StoreTarget, Subscribable, SubscriptionId,
};
use crate::engine::value::Value;
use crate::error::StoreError;

/// One operation received by the store, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    Set {
        target: String,
        path: String,
        value: Json,
    },
    AddArrayItem {
        target: String,
        path: String,
        index: Option<usize>,
        value: Option<Json>,
        source_index: Option<usize>,
    },
    RemoveArrayItem {
        target: String,
        path: String,
        index: usize,
    },
    MoveArrayItem {
        target: String,
        path: String,
        from: usize,
        to: usize,
        from_path: Option<String>,
    },
    Edit {
        target: String,
        path: String,
    },
    InputConfig {
        target: String,
        path: String,
    },
    PreviewUrl {
        asset: String,
    },
}

// =============================================================================
// Subscribers
// =============================================================================

#[derive(Default)]
struct Subscribers {
    next_id: Cell<SubscriptionId>,
    callbacks: RefCell<IndexMap<SubscriptionId, ChangeCallback>>,
}

impl Subscribers {
    fn add(&self, callback: ChangeCallback) -> SubscriptionId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks.borrow_mut().insert(id, callback);
        id
    }

    fn remove(&self, id: SubscriptionId) {
        self.callbacks.borrow_mut().shift_remove(&id);
    }

    fn len(&self) -> usize {
        self.callbacks.borrow().len()
    }

    fn emit(&self) {
        // Callbacks may subscribe or unsubscribe while running
        let callbacks: Vec<ChangeCallback> = self.callbacks.borrow().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }
}

// =============================================================================
// Objects
// =============================================================================

struct MemoryFile {
    path: String,
    data: RefCell<Json>,
    source: RefCell<String>,
    subscribers: Subscribers,
}

impl MemoryFile {
    fn new(path: &str, data: Json) -> Rc<Self> {
        Rc::new(Self {
            path: path.to_string(),
            data: RefCell::new(data),
            source: RefCell::new(String::new()),
            subscribers: Subscribers::default(),
        })
    }
}

impl Subscribable for MemoryFile {
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

impl RemoteFile for MemoryFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn data(&self) -> LocalBoxFuture<'_, Result<Value, StoreError>> {
        let data = self.data.borrow().clone();
        async move { Ok(Value::from(data)) }.boxed_local()
    }

    fn source(&self) -> LocalBoxFuture<'_, Result<String, StoreError>> {
        let source = self.source.borrow().clone();
        async move { Ok(source) }.boxed_local()
    }

    fn set_source(&self, source: String) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        async move {
            *self.source.borrow_mut() = source;
            self.subscribers.emit();
            Ok(())
        }
        .boxed_local()
    }
}

struct MemoryCollection {
    key: String,
    files: RefCell<Vec<Rc<MemoryFile>>>,
    subscribers: Subscribers,
}

impl Subscribable for MemoryCollection {
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

impl RemoteCollection for MemoryCollection {
    fn key(&self) -> &str {
        &self.key
    }

    fn items(&self) -> LocalBoxFuture<'_, Result<Vec<Rc<dyn RemoteFile>>, StoreError>> {
        let files: Vec<Rc<dyn RemoteFile>> = self
            .files
            .borrow()
            .iter()
            .map(|file| file.clone() as Rc<dyn RemoteFile>)
            .collect();
        async move { Ok(files) }.boxed_local()
    }
}

enum DatasetShape {
    Single(Rc<MemoryFile>),
    Many(Vec<Rc<MemoryFile>>),
}

struct MemoryDataset {
    key: String,
    shape: DatasetShape,
    subscribers: Subscribers,
}

impl MemoryDataset {
    fn contains(&self, file: &Rc<MemoryFile>) -> bool {
        match &self.shape {
            DatasetShape::Single(single) => Rc::ptr_eq(single, file),
            DatasetShape::Many(files) => files.iter().any(|f| Rc::ptr_eq(f, file)),
        }
    }
}

impl Subscribable for MemoryDataset {
    fn subscribe(&self, callback: ChangeCallback) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.remove(id);
    }
}

impl RemoteDataset for MemoryDataset {
    fn key(&self) -> &str {
        &self.key
    }

    fn items(&self) -> LocalBoxFuture<'_, Result<DatasetItems, StoreError>> {
        let items = match &self.shape {
            DatasetShape::Single(file) => DatasetItems::Single(file.clone()),
            DatasetShape::Many(files) => DatasetItems::Many(
                files
                    .iter()
                    .map(|file| file.clone() as Rc<dyn RemoteFile>)
                    .collect(),
            ),
        };
        async move { Ok(items) }.boxed_local()
    }
}

// =============================================================================
// Store
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    files: IndexMap<String, Rc<MemoryFile>>,
    collections: IndexMap<String, Rc<MemoryCollection>>,
    datasets: IndexMap<String, Rc<MemoryDataset>>,
    snippets: IndexMap<String, Rc<MemoryFile>>,
    current: Option<String>,
    input_configs: IndexMap<String, InputConfig>,
    ops: Vec<StoreOp>,
}

/// Cheaply clonable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Seeding
    // -------------------------------------------------------------------------

    /// Add or replace a file. The first file inserted becomes the current file.
    pub fn insert_file(&self, path: &str, data: Json) {
        let mut inner = self.inner.borrow_mut();
        match inner.files.get(path) {
            Some(existing) => *existing.data.borrow_mut() = data,
            None => {
                inner.files.insert(path.to_string(), MemoryFile::new(path, data));
            }
        }
        if inner.current.is_none() {
            inner.current = Some(path.to_string());
        }
    }

    pub fn insert_source(&self, path: &str, source: &str) {
        if let Some(file) = self.inner.borrow().files.get(path) {
            *file.source.borrow_mut() = source.to_string();
        }
    }

    pub fn set_current_file(&self, path: &str) {
        self.inner.borrow_mut().current = Some(path.to_string());
    }

    /// Group already inserted files into a collection.
    pub fn insert_collection(&self, key: &str, paths: &[&str]) {
        let mut inner = self.inner.borrow_mut();
        let files = paths
            .iter()
            .filter_map(|path| inner.files.get(*path).cloned())
            .collect();
        inner.collections.insert(
            key.to_string(),
            Rc::new(MemoryCollection {
                key: key.to_string(),
                files: RefCell::new(files),
                subscribers: Subscribers::default(),
            }),
        );
    }

    /// A dataset backed by one file (`paths.len() == 1`) or several.
    pub fn insert_dataset(&self, key: &str, paths: &[&str]) {
        let mut inner = self.inner.borrow_mut();
        let mut files: Vec<Rc<MemoryFile>> = paths
            .iter()
            .filter_map(|path| inner.files.get(*path).cloned())
            .collect();
        let shape = if files.len() == 1 {
            DatasetShape::Single(files.remove(0))
        } else {
            DatasetShape::Many(files)
        };
        inner.datasets.insert(
            key.to_string(),
            Rc::new(MemoryDataset {
                key: key.to_string(),
                shape,
                subscribers: Subscribers::default(),
            }),
        );
    }

    pub fn insert_snippet(&self, id: &str, data: Json) {
        self.inner
            .borrow_mut()
            .snippets
            .insert(id.to_string(), MemoryFile::new(id, data));
    }

    pub fn set_input_config(&self, path: &str, config: InputConfig) {
        self.inner
            .borrow_mut()
            .input_configs
            .insert(path.to_string(), config);
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }

    pub fn file_data(&self, path: &str) -> Option<Json> {
        self.inner
            .borrow()
            .files
            .get(path)
            .map(|file| file.data.borrow().clone())
    }

    pub fn file_source(&self, path: &str) -> Option<String> {
        self.inner
            .borrow()
            .files
            .get(path)
            .map(|file| file.source.borrow().clone())
    }

    pub fn snippet_data(&self, id: &str) -> Option<Json> {
        self.inner
            .borrow()
            .snippets
            .get(id)
            .map(|file| file.data.borrow().clone())
    }

    /// Number of live change registrations on the object a target names.
    pub fn subscriber_count(&self, target: &StoreTarget) -> usize {
        let inner = self.inner.borrow();
        match target {
            StoreTarget::Collection(key) => inner
                .collections
                .get(key)
                .map_or(0, |c| c.subscribers.len()),
            StoreTarget::Dataset(key) => inner.datasets.get(key).map_or(0, |d| d.subscribers.len()),
            StoreTarget::File(path) => inner.files.get(path).map_or(0, |f| f.subscribers.len()),
            StoreTarget::CurrentFile => inner
                .current
                .as_ref()
                .and_then(|path| inner.files.get(path))
                .map_or(0, |f| f.subscribers.len()),
            StoreTarget::Snippet { id, .. } => {
                inner.snippets.get(id).map_or(0, |s| s.subscribers.len())
            }
        }
    }

    // -------------------------------------------------------------------------
    // Remote changes
    // -------------------------------------------------------------------------

    /// Replace a file's data as if it changed remotely, then notify.
    pub fn update_file(&self, path: &str, data: Json) -> Result<(), StoreError> {
        let file = self
            .inner
            .borrow()
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("@file[{path}]")))?;
        *file.data.borrow_mut() = data;
        self.notify(&file);
        Ok(())
    }

    fn notify(&self, file: &Rc<MemoryFile>) {
        // Collect first: subscribers re-enter the store
        let (collections, datasets): (Vec<_>, Vec<_>) = {
            let inner = self.inner.borrow();
            (
                inner
                    .collections
                    .values()
                    .filter(|c| c.files.borrow().iter().any(|f| Rc::ptr_eq(f, file)))
                    .cloned()
                    .collect(),
                inner
                    .datasets
                    .values()
                    .filter(|d| d.contains(file))
                    .cloned()
                    .collect(),
            )
        };
        file.subscribers.emit();
        for collection in collections {
            collection.subscribers.emit();
        }
        for dataset in datasets {
            dataset.subscribers.emit();
        }
    }

    fn record(&self, op: StoreOp) {
        tracing::debug!(?op, "memory store operation");
        self.inner.borrow_mut().ops.push(op);
    }

    /// Find the document a target addresses and the path inside it.
    /// Whether the object a target names exists.
    fn has_target(&self, target: &StoreTarget) -> bool {
        let inner = self.inner.borrow();
        match target {
            StoreTarget::File(file) => inner.files.contains_key(file),
            StoreTarget::CurrentFile => inner
                .current
                .as_ref()
                .is_some_and(|current| inner.files.contains_key(current)),
            StoreTarget::Snippet { id, .. } => inner.snippets.contains_key(id),
            StoreTarget::Collection(key) => inner.collections.contains_key(key),
            StoreTarget::Dataset(key) => inner.datasets.contains_key(key),
        }
    }

    fn locate(
        &self,
        target: &StoreTarget,
        path: &str,
    ) -> Result<(Rc<MemoryFile>, String), StoreError> {
        let inner = self.inner.borrow();
        let not_found = || StoreError::NotFound(target.to_string());
        match target {
            StoreTarget::File(file) => {
                let file = inner.files.get(file).cloned().ok_or_else(not_found)?;
                Ok((file, path.to_string()))
            }
            StoreTarget::CurrentFile => {
                let current = inner.current.as_ref().ok_or_else(not_found)?;
                let file = inner.files.get(current).cloned().ok_or_else(not_found)?;
                Ok((file, path.to_string()))
            }
            StoreTarget::Snippet { id, .. } => {
                Ok((inner.snippets.get(id).cloned().ok_or_else(not_found)?, path.to_string()))
            }
            StoreTarget::Collection(key) => {
                let collection = inner.collections.get(key).ok_or_else(not_found)?;
                let (index, rest) = split_index(path)?;
                let file = collection
                    .files
                    .borrow()
                    .get(index)
                    .cloned()
                    .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
                Ok((file, rest))
            }
            StoreTarget::Dataset(key) => {
                let dataset = inner.datasets.get(key).ok_or_else(not_found)?;
                match &dataset.shape {
                    DatasetShape::Single(file) => Ok((file.clone(), path.to_string())),
                    DatasetShape::Many(files) => {
                        let (index, rest) = split_index(path)?;
                        let file = files
                            .get(index)
                            .cloned()
                            .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
                        Ok((file, rest))
                    }
                }
            }
        }
    }

    fn with_array(
        &self,
        target: &StoreTarget,
        path: &str,
        apply: impl FnOnce(&mut Vec<Json>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let (file, inner_path) = self.locate(target, path)?;
        {
            let mut data = file.data.borrow_mut();
            let slot = json_at_mut(&mut data, &inner_path, false)
                .ok_or_else(|| StoreError::InvalidPath(path.to_string()))?;
            let Json::Array(items) = slot else {
                return Err(StoreError::InvalidPath(path.to_string()));
            };
            apply(items)?;
        }
        self.notify(&file);
        Ok(())
    }
}

fn split_index(path: &str) -> Result<(usize, String), StoreError> {
    let (first, rest) = path.split_once('.').unwrap_or((path, ""));
    let index = first
        .parse::<usize>()
        .map_err(|_| StoreError::InvalidPath(path.to_string()))?;
    Ok((index, rest.to_string()))
}

/// Walk to a JSON slot, optionally creating missing object members.
fn json_at_mut<'a>(root: &'a mut Json, path: &str, create: bool) -> Option<&'a mut Json> {
    let mut current = root;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        if create && current.is_null() {
            *current = Json::Object(serde_json::Map::new());
        }
        current = match current {
            Json::Object(map) => {
                if create {
                    map.entry(segment.to_string()).or_insert(Json::Null)
                } else {
                    map.get_mut(segment)?
                }
            }
            Json::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

impl RemoteStore for MemoryStore {
    fn collection(
        &self,
        key: &str,
    ) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteCollection>, StoreError>> {
        let found = self.inner.borrow().collections.get(key).cloned();
        let key = key.to_string();
        async move {
            found
                .map(|c| c as Rc<dyn RemoteCollection>)
                .ok_or(StoreError::NotFound(format!("@collections[{key}]")))
        }
        .boxed_local()
    }

    fn file(&self, path: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>> {
        let found = self.inner.borrow().files.get(path).cloned();
        let path = path.to_string();
        async move {
            found
                .map(|f| f as Rc<dyn RemoteFile>)
                .ok_or(StoreError::NotFound(format!("@file[{path}]")))
        }
        .boxed_local()
    }

    fn dataset(&self, key: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteDataset>, StoreError>> {
        let found = self.inner.borrow().datasets.get(key).cloned();
        let key = key.to_string();
        async move {
            found
                .map(|d| d as Rc<dyn RemoteDataset>)
                .ok_or(StoreError::NotFound(format!("@data[{key}]")))
        }
        .boxed_local()
    }

    fn current_file(&self) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>> {
        let found = {
            let inner = self.inner.borrow();
            inner
                .current
                .as_ref()
                .and_then(|path| inner.files.get(path))
                .cloned()
        };
        async move {
            found
                .map(|f| f as Rc<dyn RemoteFile>)
                .ok_or(StoreError::NotFound("current file".into()))
        }
        .boxed_local()
    }

    fn snippet(&self, id: &str) -> LocalBoxFuture<'_, Result<Rc<dyn RemoteFile>, StoreError>> {
        let found = self.inner.borrow().snippets.get(id).cloned();
        let id = id.to_string();
        async move {
            found
                .map(|s| s as Rc<dyn RemoteFile>)
                .ok_or(StoreError::NotFound(format!("@snippet[{id}]")))
        }
        .boxed_local()
    }

    fn set(
        &self,
        target: &StoreTarget,
        path: &str,
        value: Json,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        let target = target.clone();
        let path = path.to_string();
        async move {
            self.record(StoreOp::Set {
                target: target.to_string(),
                path: path.clone(),
                value: value.clone(),
            });
            let (file, inner_path) = self.locate(&target, &path)?;
            {
                let mut data = file.data.borrow_mut();
                let slot = json_at_mut(&mut data, &inner_path, true)
                    .ok_or_else(|| StoreError::InvalidPath(path.clone()))?;
                *slot = value;
            }
            self.notify(&file);
            Ok(())
        }
        .boxed_local()
    }

    fn add_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        index: Option<usize>,
        value: Option<Json>,
        source_index: Option<usize>,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        let target = target.clone();
        let path = path.to_string();
        async move {
            self.record(StoreOp::AddArrayItem {
                target: target.to_string(),
                path: path.clone(),
                index,
                value: value.clone(),
                source_index,
            });
            self.with_array(&target, &path, |items| {
                let entry = value.unwrap_or_else(|| {
                    match source_index.and_then(|i| items.get(i)) {
                        Some(Json::Object(_)) => Json::Object(serde_json::Map::new()),
                        _ => Json::Null,
                    }
                });
                let at = index.unwrap_or(items.len()).min(items.len());
                items.insert(at, entry);
                Ok(())
            })
        }
        .boxed_local()
    }

    fn remove_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        index: usize,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        let target = target.clone();
        let path = path.to_string();
        async move {
            self.record(StoreOp::RemoveArrayItem {
                target: target.to_string(),
                path: path.clone(),
                index,
            });
            self.with_array(&target, &path, |items| {
                if index >= items.len() {
                    return Err(StoreError::InvalidPath(format!("{path}.{index}")));
                }
                items.remove(index);
                Ok(())
            })
        }
        .boxed_local()
    }

    fn move_array_item(
        &self,
        target: &StoreTarget,
        path: &str,
        from: usize,
        to: usize,
        from_path: Option<&str>,
    ) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        let target = target.clone();
        let path = path.to_string();
        let from_path = from_path.map(String::from);
        async move {
            self.record(StoreOp::MoveArrayItem {
                target: target.to_string(),
                path: path.clone(),
                from,
                to,
                from_path: from_path.clone(),
            });
            match from_path {
                Some(source) if source != path => {
                    let mut moved = None;
                    self.with_array(&target, &source, |items| {
                        if from >= items.len() {
                            return Err(StoreError::InvalidPath(format!("{source}.{from}")));
                        }
                        moved = Some(items.remove(from));
                        Ok(())
                    })?;
                    self.with_array(&target, &path, |items| {
                        let at = to.min(items.len());
                        items.insert(at, moved.unwrap_or(Json::Null));
                        Ok(())
                    })
                }
                _ => self.with_array(&target, &path, |items| {
                    if from >= items.len() {
                        return Err(StoreError::InvalidPath(format!("{path}.{from}")));
                    }
                    let item = items.remove(from);
                    items.insert(to.min(items.len()), item);
                    Ok(())
                }),
            }
        }
        .boxed_local()
    }

    fn edit(&self, target: &StoreTarget, path: &str) -> LocalBoxFuture<'_, Result<(), StoreError>> {
        self.record(StoreOp::Edit {
            target: target.to_string(),
            path: path.to_string(),
        });
        async { Ok(()) }.boxed_local()
    }

    fn input_config(
        &self,
        target: &StoreTarget,
        path: &str,
    ) -> LocalBoxFuture<'_, Result<InputConfig, StoreError>> {
        self.record(StoreOp::InputConfig {
            target: target.to_string(),
            path: path.to_string(),
        });
        if !self.has_target(target) {
            let err = StoreError::NotFound(target.to_string());
            return async move { Err(err) }.boxed_local();
        }
        let config = self
            .inner
            .borrow()
            .input_configs
            .get(path)
            .cloned()
            .unwrap_or_default();
        async move { Ok(config) }.boxed_local()
    }

    fn preview_url(&self, asset: &str) -> LocalBoxFuture<'_, Result<String, StoreError>> {
        self.record(StoreOp::PreviewUrl {
            asset: asset.to_string(),
        });
        let url = format!("memory://preview/{}", asset.trim_start_matches('/'));
        async move { Ok(url) }.boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    fn setup() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_file("index.md", json!({"title": "Home", "items": ["a", "b", "c"]}));
        store
    }

    #[test]
    fn test_set_creates_path_and_notifies() {
        let store = setup();
        let hits = Rc::new(Cell::new(0));
        let file = block_on(store.file("index.md")).unwrap();
        let counter = hits.clone();
        let id = file.subscribe(Rc::new(move || counter.set(counter.get() + 1)));

        block_on(store.set(&StoreTarget::CurrentFile, "hero.title", json!("Hi"))).unwrap();
        assert_eq!(store.file_data("index.md").unwrap()["hero"]["title"], json!("Hi"));
        assert_eq!(hits.get(), 1);

        file.unsubscribe(id);
        block_on(store.set(&StoreTarget::CurrentFile, "title", json!("x"))).unwrap();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_array_operations() {
        let store = setup();
        let target = StoreTarget::File("index.md".into());
        block_on(store.move_array_item(&target, "items", 0, 2, None)).unwrap();
        assert_eq!(store.file_data("index.md").unwrap()["items"], json!(["b", "c", "a"]));

        block_on(store.remove_array_item(&target, "items", 1)).unwrap();
        block_on(store.add_array_item(&target, "items", Some(0), Some(json!("z")), None)).unwrap();
        assert_eq!(store.file_data("index.md").unwrap()["items"], json!(["z", "b", "a"]));

        assert!(block_on(store.remove_array_item(&target, "items", 9)).is_err());
        assert_eq!(store.ops().len(), 4);
    }

    #[test]
    fn test_json_slot_lookup_only_creates_when_asked() {
        let mut data = json!({"blocks": [{"title": "A"}]});
        assert_eq!(json_at_mut(&mut data, "blocks.0.title", false), Some(&mut json!("A")));
        assert!(json_at_mut(&mut data, "blocks.0.missing", false).is_none());
        assert!(json_at_mut(&mut data, "hero.title", false).is_none());

        *json_at_mut(&mut data, "hero.title", true).unwrap() = json!("Hi");
        assert_eq!(data["hero"]["title"], json!("Hi"));
        assert!(json_at_mut(&mut data, "blocks.x", true).is_none());
    }

    #[test]
    fn test_collection_writes_route_to_member_file() {
        let store = setup();
        store.insert_file("posts/a.md", json!({"title": "A"}));
        store.insert_collection("posts", &["posts/a.md"]);
        let target = StoreTarget::Collection("posts".into());
        block_on(store.set(&target, "0.title", json!("B"))).unwrap();
        assert_eq!(store.file_data("posts/a.md").unwrap()["title"], json!("B"));
    }

    #[test]
    fn test_input_config_requires_known_target() {
        let store = setup();
        let known = block_on(store.input_config(&StoreTarget::CurrentFile, "items")).unwrap();
        assert_eq!(known, InputConfig::default());

        let missing = StoreTarget::File("missing.md".into());
        let err = block_on(store.input_config(&missing, "items")).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_subscriber_count() {
        let store = setup();
        let file = block_on(store.current_file()).unwrap();
        let id = file.subscribe(Rc::new(|| {}));
        assert_eq!(store.subscriber_count(&StoreTarget::CurrentFile), 1);
        file.unsubscribe(id);
        assert_eq!(store.subscriber_count(&StoreTarget::File("index.md".into())), 0);
    }
}
