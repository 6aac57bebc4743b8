//! Read-through mirrors of store collections.
//!
//! A [`CollectionCache`] is owned by the client session: seeded from a
//! one-shot listing, then kept warm by a spawned task consuming the
//! store's snapshot stream. Queries are synchronous against the local
//! mirror and never block on the stream.

use crate::error::EngineError;
use crate::store::{Collection, DocumentStore, DocumentId, Snapshot, Versioned};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, instrument, warn};

type Entries<T> = Arc<RwLock<HashMap<DocumentId, T>>>;

/// Typed local mirror of one store collection.
///
/// Documents that fail to decode are skipped with a warning rather than
/// poisoning the whole mirror.
#[derive(Debug, Clone)]
pub struct CollectionCache<T> {
    collection: Collection,
    entries: Entries<T>,
}

impl<T> CollectionCache<T>
where
    T: DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static,
{
    /// Seeds the mirror from the store and spawns the refresh task.
    ///
    /// The task runs until the store drops its snapshot publisher.
    #[instrument(skip(store))]
    pub async fn new(
        store: &Arc<dyn DocumentStore>,
        collection: Collection,
    ) -> Result<Self, EngineError> {
        // Subscribe before listing so no change falls between the two.
        let receiver = store.subscribe(collection);
        let seed = store.list(collection).await?;

        let entries: Entries<T> = Arc::new(RwLock::new(decode_all(collection, &seed)));
        debug!(%collection, count = entries.read().unwrap().len(), "Cache seeded");

        tokio::spawn(refresh_task(collection, receiver, Arc::clone(&entries)));

        Ok(Self {
            collection,
            entries,
        })
    }

    /// Collection this cache mirrors.
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Returns the cached document under `id`, if any.
    pub fn get(&self, id: &str) -> Option<T> {
        self.entries.read().unwrap().get(id).cloned()
    }

    /// Returns a copy of the whole mirror.
    pub fn snapshot(&self) -> HashMap<DocumentId, T> {
        self.entries.read().unwrap().clone()
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether the mirror is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

/// Replaces the mirror with each incoming full-collection snapshot.
async fn refresh_task<T>(
    collection: Collection,
    mut receiver: broadcast::Receiver<Snapshot>,
    entries: Entries<T>,
) where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    loop {
        match receiver.recv().await {
            Ok(snapshot) => {
                let decoded = decode_all(collection, &snapshot.documents);
                *entries.write().unwrap() = decoded;
            }
            // Snapshots are full-state, so skipped ones are harmless.
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(%collection, skipped, "Cache lagged behind snapshot stream");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!(%collection, "Snapshot stream closed, cache frozen");
                break;
            }
        }
    }
}

fn decode_all<T: DeserializeOwned>(
    collection: Collection,
    documents: &HashMap<DocumentId, Versioned<Value>>,
) -> HashMap<DocumentId, T> {
    let mut decoded = HashMap::with_capacity(documents.len());
    for (id, doc) in documents {
        match serde_json::from_value::<T>(doc.value().clone()) {
            Ok(value) => {
                decoded.insert(id.clone(), value);
            }
            Err(err) => {
                warn!(%collection, %id, error = %err, "Skipping malformed document");
            }
        }
    }
    decoded
}
