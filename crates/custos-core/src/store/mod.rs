//! Document entity store.
//!
//! All persisted state - keys, transfer logs, radios, assignment history,
//! components, inspection records - lives in one loosely-typed document
//! store keyed by collection name and document id. The store enforces no
//! schema; validation is entirely the engines' responsibility.
//!
//! [`EntityStore`] is the object-safe contract (create / get / query /
//! update-merge / delete / list); [`SqliteEntityStore`] is the embedded
//! `SQLite` backend used in production and, via
//! [`SqliteEntityStore::in_memory`], in tests.

mod backend;
mod error;
mod sqlite;


pub use backend::{BoxFuture, Document, EntityStore, QueryOp, encode};
pub use error::StoreError;
pub use sqlite::{SqliteEntityStore, StoreStats};

/// Collection names used by the engines.
pub mod collections {
    /// Key documents (one per key name after consolidation).
    pub const KEYS: &str = "keys";
    /// Immutable custody transfer log entries.
    pub const KEY_LOGS: &str = "keyLogs";
    /// Radio inventory documents.
    pub const RADIOS: &str = "radios";
    /// Append-only radio assignment history.
    pub const RADIO_ASSIGNMENTS: &str = "radioAssignments";
    /// Inspectable asset components.
    pub const COMPONENTS: &str = "components";
    /// Immutable inspection records.
    pub const INSPECTIONS: &str = "inspections";
    /// Parent assets of components.
    pub const ASSETS: &str = "assets";
}
