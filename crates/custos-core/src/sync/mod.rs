//! Per-entity operation serialization.
//!
//! The store has no transactions and no optimistic-concurrency token, so a
//! bare read-modify-write of the same key or radio from two tasks can lose
//! one side's update and break quantity conservation. [`EntityLocks`] closes
//! that window in-process: every mutating engine operation acquires the lock
//! for its entity id before the first read and holds it until the final
//! write.
//!
//! Lock ids are namespaced strings such as `keys/<normalized name>` or
//! `radios/<id>` so engines cannot collide across collections.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// An async lock map keyed by entity identity.
///
/// Locks are created on first use and kept for the lifetime of the map; the
/// entity population here (keys, radios, components of one facility) is
/// small and human-scale, so entries are never reaped.
#[derive(Debug, Default)]
pub struct EntityLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    /// Creates an empty lock map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `entity_id`, waiting if another operation on
    /// the same entity is in flight.
    ///
    /// The guard is owned so it can be held across awaits for the full
    /// read-validate-write span.
    pub async fn acquire(&self, entity_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("entity lock map poisoned");
            Arc::clone(
                map.entry(entity_id.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
