//! Store-specific error types.

use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A document body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The referenced document does not exist.
    #[error("document not found: {collection}/{id}")]
    DocumentNotFound {
        /// The collection that was searched.
        collection: String,
        /// The id that was not found.
        id: String,
    },

    /// A query field name contained characters outside `[A-Za-z0-9_]`.
    #[error("invalid query field: {field}")]
    InvalidFieldPath {
        /// The rejected field name.
        field: String,
    },

    /// A query value of this JSON type cannot be matched by the backend.
    #[error("unsupported query value for field {field}: arrays and objects cannot be matched")]
    UnsupportedQueryValue {
        /// The field the query targeted.
        field: String,
    },

    /// An update-merge payload was not a JSON object.
    #[error("merge payload for {collection}/{id} must be a JSON object")]
    InvalidMerge {
        /// The target collection.
        collection: String,
        /// The target document id.
        id: String,
    },
}
