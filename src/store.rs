//! Document-store abstraction and in-memory reference implementation.
//!
//! The engine talks to persistence through [`DocumentStore`]: a keyed
//! record store with read, conditional-write, delete, and
//! change-notification semantics. Documents are raw [`serde_json::Value`]
//! payloads; typed records round-trip through serde at the call site.

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

/// Unique identifier for a stored document.
pub type DocumentId = String;

/// Capacity of each collection's snapshot broadcast channel.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 64;

/// The collections the engine persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Collection {
    /// Player identity records.
    #[strum(serialize = "players")]
    Players,
    /// Game session records.
    #[strum(serialize = "games")]
    Games,
    /// Per-player aggregated win/loss/draw counters.
    #[strum(serialize = "player_stats")]
    PlayerStats,
}

/// Persistence error.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum StoreError {
    /// No document exists under the given id.
    #[display("document '{id}' not found in '{collection}'")]
    NotFound {
        /// Collection that was queried.
        #[error(not(source))]
        collection: Collection,
        /// The missing document id.
        id: DocumentId,
    },

    /// A conditional write found a different version than expected.
    ///
    /// `None` means "document absent" on either side of the comparison.
    #[display("version conflict: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        /// Version the writer expected to replace.
        #[error(not(source))]
        expected: Option<u64>,
        /// Version actually present in the store.
        actual: Option<u64>,
    },

    /// The backend rejected or failed the request.
    #[display("backend failure: {message}")]
    Backend {
        /// Backend-supplied failure description.
        #[error(not(source))]
        message: String,
    },
}

/// A document together with its store-assigned version.
///
/// Versions are opaque monotonically increasing counters; a caller that
/// reads version `v` and writes back with `put_if(.., Some(v))` is
/// guaranteed the document did not change in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    version: u64,
    value: T,
}

impl<T> Versioned<T> {
    /// Wraps a value with its version.
    pub fn new(version: u64, value: T) -> Self {
        Self { version, value }
    }

    /// Returns the store version of the document.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns a reference to the document payload.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Consumes the wrapper, returning the payload.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Full-collection snapshot pushed to subscribers on every change.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Collection the snapshot belongs to.
    pub collection: Collection,
    /// Every document currently in the collection.
    pub documents: HashMap<DocumentId, Versioned<Value>>,
}

/// Keyed record store with read, conditional-write, delete, and
/// change-notification semantics.
///
/// All methods are request-scoped: a failure affects only the one call
/// and leaves other documents untouched. Subscribers receive
/// full-collection snapshots and must never be blocked on by writers.
#[async_trait]
pub trait DocumentStore: std::fmt::Debug + Send + Sync {
    /// Reads the current value of a document, with its version.
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError>;

    /// Lists every document in a collection.
    async fn list(
        &self,
        collection: Collection,
    ) -> Result<HashMap<DocumentId, Versioned<Value>>, StoreError>;

    /// Creates a document under a store-generated id.
    async fn add(&self, collection: Collection, doc: Value) -> Result<DocumentId, StoreError>;

    /// Creates or fully replaces a document unconditionally
    /// (last-write-wins). Returns the new version.
    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<u64, StoreError>;

    /// Replaces a document only if its current version matches `expected`
    /// (`None` requires the document to be absent). Returns the new
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VersionConflict`] if the precondition fails.
    async fn put_if(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;

    /// Merges top-level fields of `patch` into an existing document.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<u64, StoreError>;

    /// Deletes a document. Deleting an absent document is an error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError>;

    /// Subscribes to full-collection snapshots, pushed on every change.
    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<Snapshot>;
}

/// In-process [`DocumentStore`] used by tests and the demo binary.
///
/// Single-mutex implementation: per-document versions come from one
/// monotonic counter per collection, document ids from one counter per
/// store. Every mutation fans out a fresh snapshot to subscribers.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    collections: HashMap<Collection, Shelf>,
    next_id: u64,
}

#[derive(Debug)]
struct Shelf {
    documents: HashMap<DocumentId, Versioned<Value>>,
    next_version: u64,
    publisher: broadcast::Sender<Snapshot>,
}

impl Shelf {
    fn new() -> Self {
        let (publisher, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self {
            documents: HashMap::new(),
            next_version: 1,
            publisher,
        }
    }

    fn publish(&self, collection: Collection) {
        let snapshot = Snapshot {
            collection,
            documents: self.documents.clone(),
        };
        // Send only fails when nobody is subscribed.
        let _ = self.publisher.send(snapshot);
    }
}

impl MemoryStore {
    /// Creates an empty in-memory store.
    #[instrument]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                collections: HashMap::new(),
                next_id: 1,
            })),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    #[instrument(skip(self))]
    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Versioned<Value>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let doc = inner
            .collections
            .get(&collection)
            .and_then(|shelf| shelf.documents.get(id))
            .cloned();
        debug!(%collection, id, found = doc.is_some(), "Document read");
        Ok(doc)
    }

    #[instrument(skip(self))]
    async fn list(
        &self,
        collection: Collection,
    ) -> Result<HashMap<DocumentId, Versioned<Value>>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let documents = inner
            .collections
            .get(&collection)
            .map(|shelf| shelf.documents.clone())
            .unwrap_or_default();
        debug!(%collection, count = documents.len(), "Collection listed");
        Ok(documents)
    }

    #[instrument(skip(self, doc))]
    async fn add(&self, collection: Collection, doc: Value) -> Result<DocumentId, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = format!("{}-{:04}", collection, inner.next_id);
        inner.next_id += 1;

        let shelf = inner.collections.entry(collection).or_insert_with(Shelf::new);
        let version = shelf.next_version;
        shelf.next_version += 1;
        shelf.documents.insert(id.clone(), Versioned::new(version, doc));
        shelf.publish(collection);

        debug!(%collection, id, version, "Document added");
        Ok(id)
    }

    #[instrument(skip(self, doc))]
    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let shelf = inner.collections.entry(collection).or_insert_with(Shelf::new);
        let version = shelf.next_version;
        shelf.next_version += 1;
        shelf
            .documents
            .insert(id.to_string(), Versioned::new(version, doc));
        shelf.publish(collection);

        debug!(%collection, id, version, "Document replaced");
        Ok(version)
    }

    #[instrument(skip(self, doc))]
    async fn put_if(
        &self,
        collection: Collection,
        id: &str,
        doc: Value,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let shelf = inner.collections.entry(collection).or_insert_with(Shelf::new);

        let actual = shelf.documents.get(id).map(Versioned::version);
        if actual != expected {
            warn!(%collection, id, ?expected, ?actual, "Conditional write rejected");
            return Err(StoreError::VersionConflict { expected, actual });
        }

        let version = shelf.next_version;
        shelf.next_version += 1;
        shelf
            .documents
            .insert(id.to_string(), Versioned::new(version, doc));
        shelf.publish(collection);

        debug!(%collection, id, version, "Conditional write applied");
        Ok(version)
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<u64, StoreError> {
        let patch = match patch {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend {
                    message: format!("merge patch must be an object, got {}", other),
                });
            }
        };

        let mut inner = self.inner.lock().unwrap();
        let shelf = inner.collections.entry(collection).or_insert_with(Shelf::new);

        let current = shelf
            .documents
            .get(id)
            .ok_or_else(|| StoreError::NotFound {
                collection,
                id: id.to_string(),
            })?
            .value()
            .clone();

        let mut merged = match current {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Backend {
                    message: format!("cannot merge into non-object document {}", other),
                });
            }
        };
        for (key, value) in patch {
            merged.insert(key, value);
        }

        let version = shelf.next_version;
        shelf.next_version += 1;
        shelf
            .documents
            .insert(id.to_string(), Versioned::new(version, Value::Object(merged)));
        shelf.publish(collection);

        debug!(%collection, id, version, "Document merged");
        Ok(version)
    }

    #[instrument(skip(self))]
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let shelf = inner.collections.entry(collection).or_insert_with(Shelf::new);

        if shelf.documents.remove(id).is_none() {
            warn!(%collection, id, "Delete of absent document");
            return Err(StoreError::NotFound {
                collection,
                id: id.to_string(),
            });
        }
        shelf.publish(collection);

        debug!(%collection, id, "Document deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<Snapshot> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .collections
            .entry(collection)
            .or_insert_with(Shelf::new)
            .publisher
            .subscribe()
    }
}
