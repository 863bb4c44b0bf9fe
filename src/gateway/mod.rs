//! # Persistence Gateway
//!
//! A small document-store abstraction: JSON documents addressed by
//! `(collection, id)`, whole-document reads and writes, field equality
//! queries and live change subscriptions.
//!
//! The game layer never talks to a concrete backend. It is handed an
//! `Arc<S>` where `S: DocumentStore`, which lets the binary run against the
//! on-disk [`SledStore`] while tests inject the in-process [`MemoryStore`].
//!
//! ## Write semantics
//!
//! - [`DocumentStore::set`] with [`SetOptions::replace`] overwrites the whole
//!   document; with [`SetOptions::merge`] nested objects are merged key by key
//!   and every other value (arrays included) is replaced wholesale.
//! - [`DocumentStore::update`] behaves like a merge but refuses to create a
//!   document that does not exist yet.
//! - [`DocumentStore::delete`] is idempotent.
//!
//! There is no transaction or version check: concurrent writers to the same
//! document are last-write-wins.
//!
//! ## Subscriptions
//!
//! Every successful write publishes a [`ChangeEvent`] on the store's
//! broadcast feed. [`DocumentSubscription`] filters that feed down to one
//! document, [`CollectionSubscription`] keeps a local mirror of a whole
//! collection and hands out the full listing after each change.

pub mod errors;
pub mod memory;
pub mod sled_store;

use std::collections::BTreeMap;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

pub use errors::StoreError;
pub use memory::MemoryStore;
pub use sled_store::{SledStore, SledStoreBuilder};

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// Buffered change events per subscriber before it starts lagging.
const CHANGE_FEED_CAPACITY: usize = 1024;

/// A document as returned by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Decode the document body into a typed record.
    pub fn decode<T: DeserializeOwned>(&self, collection: &str) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|e| {
            StoreError::Malformed {
                collection: collection.to_string(),
                id: self.id.clone(),
                reason: e.to_string(),
            }
        })
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Encode a typed record as a field map. Records that do not serialize to a
/// JSON object are rejected.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed {
            collection: String::new(),
            id: String::new(),
            reason: format!("expected an object, got {}", other),
        }),
    }
}

/// Options for [`DocumentStore::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }

    pub fn replace() -> Self {
        Self { merge: false }
    }
}

/// Deep-merge `patch` into `target`. Objects merge recursively, everything
/// else replaces the existing value.
pub fn merge_fields(target: &mut Fields, patch: Fields) {
    for (key, value) in patch {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_fields(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

/// Raw change notification published on a store's feed.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: String,
    pub id: String,
    /// `None` when the document was deleted.
    pub document: Option<Document>,
}

/// Broadcast fan-out shared by the store implementations.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { tx }
    }
}

impl ChangeFeed {
    pub fn publish(&self, collection: &str, id: &str, document: Option<Document>) {
        // No receivers is the common case outside of live sessions.
        let _ = self.tx.send(ChangeEvent {
            collection: collection.to_string(),
            id: id.to_string(),
            document,
        });
    }

    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// What happened to a watched document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    Updated(Document),
    Deleted,
}

/// Live view of a single document.
pub struct DocumentSubscription {
    collection: String,
    id: String,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl DocumentSubscription {
    pub fn new(collection: &str, id: &str, rx: broadcast::Receiver<ChangeEvent>) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
            rx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next change to the watched document. Returns `None` once
    /// the store has been dropped.
    pub async fn next(&mut self) -> Option<DocumentChange> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.collection == self.collection && event.id == self.id => {
                    return Some(match event.document {
                        Some(doc) => DocumentChange::Updated(doc),
                        None => DocumentChange::Deleted,
                    });
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "subscription {}/{} lagged, skipped {} events",
                        self.collection, self.id, skipped
                    );
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Live mirror of a whole collection.
pub struct CollectionSubscription {
    collection: String,
    docs: BTreeMap<String, Document>,
    rx: broadcast::Receiver<ChangeEvent>,
}

impl CollectionSubscription {
    /// `rx` must be subscribed before `initial` is read so no write slips
    /// between the two.
    pub fn new(
        collection: &str,
        initial: Vec<Document>,
        rx: broadcast::Receiver<ChangeEvent>,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            docs: initial.into_iter().map(|d| (d.id.clone(), d)).collect(),
            rx,
        }
    }

    /// Current listing, ordered by document id.
    pub fn snapshot(&self) -> Vec<Document> {
        self.docs.values().cloned().collect()
    }

    /// Wait for the next change in the collection and return the new listing.
    pub async fn next(&mut self) -> Option<Vec<Document>> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.collection == self.collection => {
                    match event.document {
                        Some(doc) => {
                            self.docs.insert(event.id, doc);
                        }
                        None => {
                            self.docs.remove(&event.id);
                        }
                    }
                    return Some(self.snapshot());
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "collection subscription {} lagged, skipped {} events",
                        self.collection, skipped
                    );
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Asynchronous document store. Every method may fail with a [`StoreError`].
#[allow(async_fn_in_trait)]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> Result<(), StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;

    /// Every document in `collection`, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Fresh receiver on the store's change feed.
    fn changes(&self) -> broadcast::Receiver<ChangeEvent>;

    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<(), StoreError> {
        if self.get(collection, id).await?.is_none() {
            return Err(StoreError::missing(collection, id));
        }
        self.set(collection, id, partial, SetOptions::merge()).await
    }

    /// Documents whose top-level `field` equals `value`.
    async fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        let docs = self.list(collection).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| doc.field(field) == Some(value))
            .collect())
    }

    async fn subscribe(&self, collection: &str, id: &str) -> Result<DocumentSubscription, StoreError> {
        Ok(DocumentSubscription::new(collection, id, self.changes()))
    }

    async fn subscribe_collection(
        &self,
        collection: &str,
    ) -> Result<CollectionSubscription, StoreError> {
        let rx = self.changes();
        let initial = self.list(collection).await?;
        Ok(CollectionSubscription::new(collection, initial, rx))
    }

    /// Allocate an id for a document that has not been written yet.
    fn new_id(&self, _collection: &str) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}
