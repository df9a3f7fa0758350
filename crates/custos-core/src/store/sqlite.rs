//! `SQLite`-backed document store implementation.
//!
//! A single `documents` table holds every collection; bodies are stored as
//! JSON text and queried with `json_extract`. The [`SqliteEntityStore`]
//! struct implements the [`EntityStore`] trait, providing the concrete
//! persistence backend for all engines.

// SQLite returns i64 for row IDs and counts, but they're always
// non-negative. Timestamps won't overflow u64 until the year 2554.
// Mutex poisoning indicates a panic in another thread, which is
// unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::backend::{BoxFuture, Document, EntityStore, QueryOp};
use super::error::StoreError;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Statistics about the store.
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Total number of documents across all collections.
    pub document_count: u64,

    /// Number of distinct collections with at least one document.
    pub collection_count: u64,

    /// Database file size in bytes.
    pub db_size_bytes: u64,
}

/// The document store backed by `SQLite`.
///
/// WAL mode allows concurrent reads while writes are in progress. Document
/// ids are UUIDv4 strings assigned on create.
pub struct SqliteEntityStore {
    conn: Arc<std::sync::Mutex<Connection>>,
    #[allow(dead_code)]
    path: Option<std::path::PathBuf>,
}

impl SqliteEntityStore {
    /// Opens or creates a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(std::sync::Mutex::new(conn)),
            path: None,
        })
    }

    /// Initialize the connection with schema and pragmas.
    fn initialize_connection(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn now_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }

    /// Creates a document and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be inserted.
    pub fn create_sync(&self, collection: &str, body: &JsonValue) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let now = Self::now_ns();
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO documents (collection, id, body, created_at_ns, updated_at_ns)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![collection, id, body.to_string(), now, now],
        )?;

        Ok(id)
    }

    /// Fetches a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored body is not valid
    /// JSON.
    pub fn get_sync(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(body) => Ok(Some(Document {
                id: id.to_string(),
                body: serde_json::from_str(&body)?,
            })),
            None => Ok(None),
        }
    }

    /// Returns all documents whose top-level `field` equals `value`.
    ///
    /// Only scalar values (string, number, boolean, null) can be matched;
    /// the field name must be `[A-Za-z0-9_]+` so the JSON path stays
    /// well-formed.
    ///
    /// # Errors
    ///
    /// Returns an error if the field name or value type is unsupported, or
    /// if the query fails.
    pub fn query_sync(
        &self,
        collection: &str,
        field: &str,
        op: QueryOp,
        value: &JsonValue,
    ) -> Result<Vec<Document>, StoreError> {
        // Only Eq exists today; the match keeps future operators honest.
        match op {
            QueryOp::Eq => {},
        }

        if field.is_empty()
            || !field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(StoreError::InvalidFieldPath {
                field: field.to_string(),
            });
        }
        let path = format!("$.{field}");

        let conn = self.conn.lock().unwrap();
        let sql_prefix = "SELECT id, body FROM documents
             WHERE collection = ?1 AND json_extract(body, ?2)";

        let rows: Vec<(String, String)> = match value {
            JsonValue::String(s) => {
                let mut stmt =
                    conn.prepare(&format!("{sql_prefix} = ?3 ORDER BY created_at_ns, id"))?;
                let mapped = stmt.query_map(params![collection, path, s], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            },
            JsonValue::Bool(b) => {
                let mut stmt =
                    conn.prepare(&format!("{sql_prefix} = ?3 ORDER BY created_at_ns, id"))?;
                let mapped = stmt.query_map(params![collection, path, i64::from(*b)], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            },
            JsonValue::Number(n) => {
                let mut stmt =
                    conn.prepare(&format!("{sql_prefix} = ?3 ORDER BY created_at_ns, id"))?;
                if let Some(i) = n.as_i64() {
                    let mapped = stmt.query_map(params![collection, path, i], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?;
                    mapped.collect::<Result<_, _>>()?
                } else {
                    let f = n.as_f64().unwrap_or(f64::NAN);
                    let mapped = stmt.query_map(params![collection, path, f], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?;
                    mapped.collect::<Result<_, _>>()?
                }
            },
            JsonValue::Null => {
                // json_extract yields SQL NULL both for a JSON null and a
                // missing field, which matches the engines' reading of
                // "field is null".
                let mut stmt =
                    conn.prepare(&format!("{sql_prefix} IS NULL ORDER BY created_at_ns, id"))?;
                let mapped = stmt.query_map(params![collection, path], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
                mapped.collect::<Result<_, _>>()?
            },
            JsonValue::Array(_) | JsonValue::Object(_) => {
                return Err(StoreError::UnsupportedQueryValue {
                    field: field.to_string(),
                });
            },
        };
        drop(conn);

        rows.into_iter()
            .map(|(id, body)| {
                Ok(Document {
                    id,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    /// Shallow-merges `partial` into an existing document body.
    ///
    /// Top-level keys of `partial` replace (or add to) the stored body's
    /// keys; a `null` value overwrites rather than removes.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if the document does not exist and
    /// `InvalidMerge` if either body is not a JSON object.
    pub fn update_merge_sync(
        &self,
        collection: &str,
        id: &str,
        partial: &JsonValue,
    ) -> Result<(), StoreError> {
        let not_found = || StoreError::DocumentNotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let invalid_merge = || StoreError::InvalidMerge {
            collection: collection.to_string(),
            id: id.to_string(),
        };

        let JsonValue::Object(partial_map) = partial else {
            return Err(invalid_merge());
        };

        let conn = self.conn.lock().unwrap();

        let raw: Option<String> = conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;
        let body: JsonValue = serde_json::from_str(&raw.ok_or_else(not_found)?)?;

        let JsonValue::Object(mut body_map) = body else {
            return Err(invalid_merge());
        };
        for (key, value) in partial_map {
            body_map.insert(key.clone(), value.clone());
        }
        let merged = JsonValue::Object(body_map);

        conn.execute(
            "UPDATE documents SET body = ?3, updated_at_ns = ?4
             WHERE collection = ?1 AND id = ?2",
            params![collection, id, merged.to_string(), Self::now_ns()],
        )?;

        Ok(())
    }

    /// Deletes a document by id. Deleting a missing document is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_sync(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;

        Ok(())
    }

    /// Returns every document in a collection in creation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_sync(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents
             WHERE collection = ?1
             ORDER BY created_at_ns, id",
        )?;

        let rows: Vec<(String, String)> = stmt
            .query_map(params![collection], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        drop(stmt);
        drop(conn);

        rows.into_iter()
            .map(|(id, body)| {
                Ok(Document {
                    id,
                    body: serde_json::from_str(&body)?,
                })
            })
            .collect()
    }

    /// Gets statistics about the store.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock().unwrap();

        let document_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;

        let collection_count: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT collection) FROM documents",
            [],
            |row| row.get(0),
        )?;

        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(StoreStats {
            document_count: document_count as u64,
            collection_count: collection_count as u64,
            db_size_bytes: (page_count * page_size) as u64,
        })
    }
}

impl EntityStore for SqliteEntityStore {
    fn create<'a>(
        &'a self,
        collection: &'a str,
        body: &'a JsonValue,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        Box::pin(async move { self.create_sync(collection, body) })
    }

    fn get<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Document>, StoreError>> {
        Box::pin(async move { self.get_sync(collection, id) })
    }

    fn query<'a>(
        &'a self,
        collection: &'a str,
        field: &'a str,
        op: QueryOp,
        value: &'a JsonValue,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move { self.query_sync(collection, field, op, value) })
    }

    fn update_merge<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
        partial: &'a JsonValue,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.update_merge_sync(collection, id, partial) })
    }

    fn delete<'a>(
        &'a self,
        collection: &'a str,
        id: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move { self.delete_sync(collection, id) })
    }

    fn list<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move { self.list_sync(collection) })
    }
}
