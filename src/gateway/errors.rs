use thiserror::Error;

/// Errors raised by a [`DocumentStore`](super::DocumentStore) implementation.
///
/// Every variant counts as a transport failure from the game's point of view:
/// the caller logs it, shows a generic notice and abandons the operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around JSON encoding and decoding errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend cannot be reached right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// `update` was issued against a document that does not exist.
    #[error("no document {collection}/{id}")]
    MissingDocument { collection: String, id: String },

    /// A stored document did not have the expected shape.
    #[error("malformed document {collection}/{id}: {reason}")]
    Malformed {
        collection: String,
        id: String,
        reason: String,
    },
}

impl StoreError {
    pub fn missing(collection: &str, id: &str) -> Self {
        StoreError::MissingDocument {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}
