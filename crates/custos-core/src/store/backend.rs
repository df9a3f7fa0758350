//! The [`EntityStore`] contract.
//!
//! The trait is object-safe (methods return [`BoxFuture`]) so engines can
//! hold an `Arc<dyn EntityStore>` and tests can substitute fakes - for
//! example a store that fails writes to one collection, used to exercise
//! the audit-write partial-failure path.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use super::error::StoreError;

/// Boxed future type used by [`EntityStore`] methods for object safety.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stored document: the store-assigned id plus the loosely-typed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Store-assigned document id.
    pub id: String,

    /// Document body. Always a JSON object for documents written by the
    /// engines, but the store does not enforce this.
    pub body: JsonValue,
}

impl Document {
    /// Decodes the body into a typed value.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Encodes a typed value into a document body.
///
/// # Errors
///
/// Returns a serialization error if the value cannot be represented as
/// JSON.
pub fn encode<T: Serialize>(value: &T) -> Result<JsonValue, StoreError> {
    Ok(serde_json::to_value(value)?)
}

/// Comparison operator for [`EntityStore::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryOp {
    /// Field equals the given value.
    Eq,
}

/// Document persistence contract consumed by all engines.
///
/// Semantics:
///
/// - `create` assigns and returns a fresh document id.
/// - `get` returns `None` for a missing document (not an error).
/// - `query` matches a single top-level field against a scalar value.
/// - `update_merge` performs a shallow top-level merge of `partial` into
///   the existing body and fails with `DocumentNotFound` if there is no
///   existing document.
/// - `delete` of a missing document is a no-op.
/// - `list` returns every document in a collection in creation order.
pub trait EntityStore: Send + Sync {
    /// Creates a document and returns its assigned id.
    fn create<'a>(
        &'a self,
        collection: &'a str,
        body: &'a JsonValue,
    ) -> BoxFuture<'a, Result<String, StoreError>>;

    /// Fetches a document by id.
    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>, StoreError>>;

    /// Returns all documents whose top-level `field` compares to `value`
    /// under `op`.
    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        op: QueryOp,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>>;

    /// Shallow-merges `partial` into an existing document body.
    fn update_merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        partial: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Deletes a document by id.
    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Returns every document in a collection in creation order.
    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Document>, StoreError>>;
}
