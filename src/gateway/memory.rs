//! In-process document store used as the injected fake in tests and for
//! throwaway local sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::{
    merge_fields, ChangeEvent, ChangeFeed, Document, DocumentStore, Fields, SetOptions, StoreError,
};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    feed: ChangeFeed,
    offline: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the backend: every call fails with
    /// [`StoreError::Unavailable`] until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful `set`/`delete` calls so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.check_online()?;
        let guard = self.lock()?;
        Ok(guard
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        self.check_online()?;
        let stored = {
            let mut guard = self.lock()?;
            let docs = guard.entry(collection.to_string()).or_default();
            let entry = docs.entry(id.to_string()).or_default();
            if options.merge {
                merge_fields(entry, fields);
            } else {
                *entry = fields;
            }
            entry.clone()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.feed
            .publish(collection, id, Some(Document::new(id, stored)));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<(), StoreError> {
        self.check_online()?;
        let stored = {
            let mut guard = self.lock()?;
            let Some(entry) = guard.get_mut(collection).and_then(|docs| docs.get_mut(id)) else {
                return Err(StoreError::missing(collection, id));
            };
            merge_fields(entry, partial);
            entry.clone()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.feed
            .publish(collection, id, Some(Document::new(id, stored)));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let removed = {
            let mut guard = self.lock()?;
            guard
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some()
        };
        self.writes.fetch_add(1, Ordering::SeqCst);
        if removed {
            self.feed.publish(collection, id, None);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        self.check_online()?;
        let guard = self.lock()?;
        Ok(guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.receiver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{DocumentChange, StoreError};
    use serde_json::{json, Value};

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn set_get_and_delete() {
        let store = MemoryStore::new();
        store
            .set("rooms", "r1", fields(json!({"code": "ABCD"})), SetOptions::replace())
            .await
            .unwrap();
        let doc = store.get("rooms", "r1").await.unwrap().expect("present");
        assert_eq!(doc.field("code"), Some(&json!("ABCD")));

        store.delete("rooms", "r1").await.unwrap();
        assert!(store.get("rooms", "r1").await.unwrap().is_none());
        // idempotent
        store.delete("rooms", "r1").await.unwrap();
    }

    #[tokio::test]
    async fn update_requires_existing_document() {
        let store = MemoryStore::new();
        let err = store
            .update("rooms", "nope", fields(json!({"players": []})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingDocument { .. }));
    }

    #[tokio::test]
    async fn query_by_field_matches_top_level_values() {
        let store = MemoryStore::new();
        for (id, code) in [("a", "AAAA"), ("b", "BBBB"), ("c", "AAAA")] {
            store
                .set("rooms", id, fields(json!({"code": code})), SetOptions::replace())
                .await
                .unwrap();
        }
        let hits = store
            .query_by_field("rooms", "code", &json!("AAAA"))
            .await
            .unwrap();
        let ids: Vec<_> = hits.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn subscription_sees_updates_and_deletion() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("rooms", "r1").await.unwrap();
        store
            .set("rooms", "other", fields(json!({"n": 0})), SetOptions::replace())
            .await
            .unwrap();
        store
            .set("rooms", "r1", fields(json!({"n": 1})), SetOptions::replace())
            .await
            .unwrap();
        store.delete("rooms", "r1").await.unwrap();

        match sub.next().await {
            Some(DocumentChange::Updated(doc)) => assert_eq!(doc.field("n"), Some(&json!(1))),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(sub.next().await, Some(DocumentChange::Deleted));
    }

    #[tokio::test]
    async fn offline_store_fails_every_call() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.get("users", "u").await,
            Err(StoreError::Unavailable(_))
        ));
        assert_eq!(store.write_count(), 0);
    }
}
