use std::path::{Path, PathBuf};

use log::debug;
use sled::IVec;
use tokio::sync::broadcast;

use super::{
    merge_fields, ChangeEvent, ChangeFeed, Document, DocumentStore, Fields, SetOptions, StoreError,
};

const TREE_PREFIX: &str = "collection:";

/// Helper builder so tests can easily create throwaway stores with custom paths.
pub struct SledStoreBuilder {
    path: Option<PathBuf>,
}

impl SledStoreBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Store that lives only as long as the process (sled temporary mode).
    pub fn temporary() -> Self {
        Self { path: None }
    }

    pub fn open(self) -> Result<SledStore, StoreError> {
        match self.path {
            Some(path) => SledStore::open(path),
            None => {
                let db = sled::Config::new().temporary(true).open()?;
                Ok(SledStore::from_db(db))
            }
        }
    }
}

/// Sled-backed document store. Each collection is its own tree; documents
/// are stored as JSON objects keyed by id.
pub struct SledStore {
    db: sled::Db,
    feed: ChangeFeed,
}

impl SledStore {
    /// Open (or create) the store rooted at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        std::fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        debug!("opened document store at {}", path_ref.display());
        Ok(Self::from_db(db))
    }

    fn from_db(db: sled::Db) -> Self {
        Self {
            db,
            feed: ChangeFeed::default(),
        }
    }

    /// Underlying database handle, shared with the credential store.
    pub fn db(&self) -> &sled::Db {
        &self.db
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree, StoreError> {
        Ok(self.db.open_tree(format!("{}{}", TREE_PREFIX, collection))?)
    }

    fn serialize(fields: &Fields) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(fields)?)
    }

    fn deserialize(collection: &str, id: &str, bytes: IVec) -> Result<Fields, StoreError> {
        serde_json::from_slice::<Fields>(&bytes).map_err(|e| StoreError::Malformed {
            collection: collection.to_string(),
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Merge `patch` into the stored document with a compare-and-swap loop,
    /// so a concurrent delete or write is never overwritten by a stale read.
    /// With `must_exist` an absent document fails with `MissingDocument`
    /// instead of being created.
    fn merge_into(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        must_exist: bool,
    ) -> Result<Fields, StoreError> {
        let tree = self.tree(collection)?;
        loop {
            let current = tree.get(id.as_bytes())?;
            let mut merged = match &current {
                Some(bytes) => Self::deserialize(collection, id, bytes.clone())?,
                None if must_exist => return Err(StoreError::missing(collection, id)),
                None => Fields::new(),
            };
            merge_fields(&mut merged, patch.clone());
            let bytes = Self::serialize(&merged)?;
            match tree.compare_and_swap(id.as_bytes(), current, Some(bytes))? {
                Ok(()) => {
                    tree.flush()?;
                    return Ok(merged);
                }
                Err(_) => debug!("{}/{} changed during merge, retrying", collection, id),
            }
        }
    }

    /// Number of documents currently held in `collection`.
    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        Ok(self.tree(collection)?.len())
    }

    /// Names of every collection that has been written to.
    pub fn collection_names(&self) -> Vec<String> {
        self.db
            .tree_names()
            .into_iter()
            .filter_map(|name| {
                String::from_utf8_lossy(&name)
                    .strip_prefix(TREE_PREFIX)
                    .map(str::to_string)
            })
            .collect()
    }
}

impl DocumentStore for SledStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let tree = self.tree(collection)?;
        let Some(bytes) = tree.get(id.as_bytes())? else {
            return Ok(None);
        };
        let fields = Self::deserialize(collection, id, bytes)?;
        Ok(Some(Document::new(id, fields)))
    }

    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        options: SetOptions,
    ) -> Result<(), StoreError> {
        let stored = if options.merge {
            self.merge_into(collection, id, fields, false)?
        } else {
            let tree = self.tree(collection)?;
            tree.insert(id.as_bytes(), Self::serialize(&fields)?)?;
            tree.flush()?;
            fields
        };
        self.feed
            .publish(collection, id, Some(Document::new(id, stored)));
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, partial: Fields) -> Result<(), StoreError> {
        let stored = self.merge_into(collection, id, partial, true)?;
        self.feed
            .publish(collection, id, Some(Document::new(id, stored)));
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let tree = self.tree(collection)?;
        if tree.remove(id.as_bytes())?.is_some() {
            tree.flush()?;
            self.feed.publish(collection, id, None);
        }
        Ok(())
    }

    async fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let tree = self.tree(collection)?;
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry?;
            let id = String::from_utf8_lossy(&key).to_string();
            let fields = Self::deserialize(collection, &id, value)?;
            docs.push(Document::new(id, fields));
        }
        Ok(docs)
    }

    fn changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.receiver()
    }
}
