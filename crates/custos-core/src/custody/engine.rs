//! Custody ledger engine implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::error::CustodyError;
use super::search::{self, SearchResults};
use super::state::{Holder, HolderKind, Key, KeyLogEntry, TransferAction};
use crate::identity::ActingUser;
use crate::names;
use crate::store::{EntityStore, StoreError, collections, encode};
use crate::sync::EntityLocks;

/// A custody transfer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// The key to move units of.
    pub key_name: String,

    /// Transfer direction.
    pub action: TransferAction,

    /// The person side of the transfer.
    pub person: String,

    /// The lockbox side of the transfer.
    pub lockbox: String,

    /// Number of units to move.
    pub quantity: u32,
}

/// Result of a successful registration or top-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// Stored key display name.
    pub key_name: String,

    /// Lockbox that received the units.
    pub lockbox: String,

    /// Units added by this call.
    pub quantity_added: u32,

    /// Total units across all holders after the call.
    pub total_quantity: u64,
}

/// Result of a successful custody transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Stored key display name.
    pub key_name: String,

    /// The action that was performed.
    pub action: TransferAction,

    /// Holder state after the transfer.
    pub holders: Vec<Holder>,

    /// Whether the audit log entry was recorded. `false` means the holder
    /// update succeeded but the log append failed; the transfer itself is
    /// complete.
    pub log_recorded: bool,
}

/// Result of a legacy-document consolidation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationSummary {
    /// Pooled key documents scanned.
    pub scanned: usize,

    /// Per-unit documents deleted.
    pub deleted_documents: usize,

    /// Consolidated documents written (one per distinct key name).
    pub consolidated_keys: usize,
}

/// Stateless custody service over the document store.
///
/// Holds no ledger state of its own: every operation re-reads current
/// state, validates, and writes the new state back under the key's entity
/// lock.
pub struct CustodyEngine {
    store: Arc<dyn EntityStore>,
    locks: EntityLocks,
    store_timeout: Duration,
}

impl CustodyEngine {
    /// Creates an engine over the given store.
    ///
    /// `store_timeout` bounds every store call; see
    /// [`crate::config::CoreConfig::store_timeout`].
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            locks: EntityLocks::new(),
            store_timeout,
        }
    }

    /// Runs a store call under the configured deadline.
    async fn store_call<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>> + Send,
    ) -> Result<T, CustodyError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CustodyError::StoreTimeout {
                deadline_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Finds the pooled key matching `key_name` case-insensitively.
    ///
    /// Malformed documents are skipped with a warning; the store enforces
    /// no schema.
    async fn find_pooled_key(&self, key_name: &str) -> Result<Option<(String, Key)>, CustodyError> {
        let docs = self.store_call(self.store.list(collections::KEYS)).await?;
        for doc in docs {
            let key: Key = match doc.decode() {
                Ok(key) => key,
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed key document");
                    continue;
                },
            };
            if !key.is_restricted && names::eq_normalized(&key.key_name, key_name) {
                return Ok(Some((doc.id, key)));
            }
        }
        Ok(None)
    }

    /// Registers new units of a key in a lockbox, creating the key if it
    /// does not exist yet.
    ///
    /// Looks the key up case-insensitively; within the key, a lockbox
    /// holder matching `lockbox_name` case-insensitively is topped up,
    /// otherwise a new holder entry is appended.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty names or a zero quantity (no
    /// write happens), or a store error if persistence fails.
    pub async fn register_or_top_up(
        &self,
        key_name: &str,
        lockbox_name: &str,
        quantity: u32,
        actor: &ActingUser,
    ) -> Result<RegisterOutcome, CustodyError> {
        let key_name = key_name.trim();
        let lockbox_name = lockbox_name.trim();
        if key_name.is_empty() {
            return Err(CustodyError::MissingField { field: "keyName" });
        }
        if lockbox_name.is_empty() {
            return Err(CustodyError::MissingField { field: "lockbox" });
        }
        if quantity == 0 {
            return Err(CustodyError::NonPositiveQuantity);
        }

        let _guard = self
            .locks
            .acquire(&format!("keys/{}", names::normalized(key_name)))
            .await;

        let outcome = match self.find_pooled_key(key_name).await? {
            Some((id, mut key)) => {
                match key.holder_position(HolderKind::Lockbox, lockbox_name) {
                    Some(pos) => *key.holders[pos].quantity_mut() += quantity,
                    None => key.holders.push(Holder::lockbox(lockbox_name, quantity)),
                }
                let partial = json!({ "holders": encode(&key.holders)? });
                self.store_call(self.store.update_merge(collections::KEYS, &id, &partial))
                    .await?;
                RegisterOutcome {
                    key_name: key.key_name.clone(),
                    lockbox: lockbox_name.to_string(),
                    quantity_added: quantity,
                    total_quantity: key.total_quantity(),
                }
            },
            None => {
                let key = Key::pooled(key_name, vec![Holder::lockbox(lockbox_name, quantity)]);
                self.store_call(self.store.create(collections::KEYS, &encode(&key)?))
                    .await?;
                RegisterOutcome {
                    key_name: key_name.to_string(),
                    lockbox: lockbox_name.to_string(),
                    quantity_added: quantity,
                    total_quantity: u64::from(quantity),
                }
            },
        };

        info!(
            key = %outcome.key_name,
            lockbox = %outcome.lockbox,
            quantity,
            total = outcome.total_quantity,
            actor = actor.audit_name(),
            "registered key units"
        );
        Ok(outcome)
    }

    /// Transfers custody of key units between a lockbox and a person,
    /// using the current time as the submission timestamp.
    ///
    /// # Errors
    ///
    /// See [`Self::transfer_custody_at`].
    pub async fn transfer_custody(
        &self,
        request: &TransferRequest,
        actor: &ActingUser,
    ) -> Result<TransferOutcome, CustodyError> {
        self.transfer_custody_at(request, actor, Utc::now()).await
    }

    /// Transfers custody with an explicit submission timestamp.
    ///
    /// Signing Out moves units from the named lockbox to the named person;
    /// Signing In moves them back. The source holder must exist with at
    /// least the requested quantity - custody can never be transferred
    /// from a holder that does not actually hold that much. A source
    /// holder drained to zero is removed; the destination holder is
    /// incremented or created. The whole updated holder array is persisted
    /// as one merge, then one immutable [`KeyLogEntry`] is appended.
    ///
    /// The log append is best-effort relative to the holder update: if it
    /// fails, the completed transfer is not rolled back and the outcome
    /// reports `log_recorded == false`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty fields or a zero quantity,
    /// `KeyNotFound` for an unknown pooled key, `InsufficientQuantity` if
    /// the source holder cannot cover the request (in all of these cases
    /// nothing is written), or a store error if the holder update fails.
    pub async fn transfer_custody_at(
        &self,
        request: &TransferRequest,
        actor: &ActingUser,
        now: DateTime<Utc>,
    ) -> Result<TransferOutcome, CustodyError> {
        let key_name = request.key_name.trim();
        let person = request.person.trim();
        let lockbox = request.lockbox.trim();
        if key_name.is_empty() {
            return Err(CustodyError::MissingField { field: "keyName" });
        }
        if person.is_empty() {
            return Err(CustodyError::MissingField { field: "person" });
        }
        if lockbox.is_empty() {
            return Err(CustodyError::MissingField { field: "lockbox" });
        }
        if request.quantity == 0 {
            return Err(CustodyError::NonPositiveQuantity);
        }

        let _guard = self
            .locks
            .acquire(&format!("keys/{}", names::normalized(key_name)))
            .await;

        let Some((id, mut key)) = self.find_pooled_key(key_name).await? else {
            return Err(CustodyError::KeyNotFound {
                key_name: key_name.to_string(),
            });
        };

        let source_kind = request.action.source_kind();
        let source_name = match request.action {
            TransferAction::SigningOut => lockbox,
            TransferAction::SigningIn => person,
        };
        let dest_name = match request.action {
            TransferAction::SigningOut => person,
            TransferAction::SigningIn => lockbox,
        };

        // Conservation guard: the source must actually hold this much.
        let source_pos = match key.holder_position(source_kind, source_name) {
            Some(pos) if key.holders[pos].quantity() >= request.quantity => pos,
            other => {
                return Err(CustodyError::InsufficientQuantity {
                    holder: source_name.to_string(),
                    available: other.map_or(0, |pos| key.holders[pos].quantity()),
                    requested: request.quantity,
                });
            },
        };

        *key.holders[source_pos].quantity_mut() -= request.quantity;
        if key.holders[source_pos].quantity() == 0 {
            key.holders.remove(source_pos);
        }

        let dest_kind = source_kind.opposite();
        match key.holder_position(dest_kind, dest_name) {
            Some(pos) => *key.holders[pos].quantity_mut() += request.quantity,
            None => key
                .holders
                .push(Holder::new(dest_kind, dest_name, request.quantity)),
        }

        let partial = json!({ "holders": encode(&key.holders)? });
        self.store_call(self.store.update_merge(collections::KEYS, &id, &partial))
            .await?;

        let entry = KeyLogEntry {
            key_name: key.key_name.clone(),
            action: request.action,
            person: person.to_string(),
            lockbox: lockbox.to_string(),
            timestamp: now,
            submitted_by: actor.audit_name().to_string(),
        };
        let log_recorded = match self.append_log(&entry).await {
            Ok(()) => true,
            Err(err) => {
                // The physical custody event already happened; an orphaned
                // transfer beats a missing one. Do not roll back.
                warn!(
                    key = %entry.key_name,
                    error = %err,
                    "holder update committed but log entry was not recorded"
                );
                false
            },
        };

        info!(
            key = %key.key_name,
            action = %request.action,
            person,
            lockbox,
            quantity = request.quantity,
            actor = actor.audit_name(),
            "custody transferred"
        );
        Ok(TransferOutcome {
            key_name: key.key_name.clone(),
            action: request.action,
            holders: key.holders,
            log_recorded,
        })
    }

    async fn append_log(&self, entry: &KeyLogEntry) -> Result<(), CustodyError> {
        let body = encode(entry)?;
        self.store_call(self.store.create(collections::KEY_LOGS, &body))
            .await?;
        Ok(())
    }

    /// Consolidates legacy per-unit key documents into one document per
    /// distinct key name.
    ///
    /// Historically one document represented one physical unit. This
    /// groups all pooled documents by trimmed, case-insensitive key name,
    /// merges holders by case-insensitive `(type, name)` pair summing
    /// quantities, deletes the originals, and writes one consolidated
    /// document per group.
    ///
    /// Safe to run once against a quiet store; concurrent writes during
    /// consolidation are not guarded.
    ///
    /// # Errors
    ///
    /// Returns a store error if the scan, a delete, or a write fails.
    pub async fn consolidate_legacy_holders(
        &self,
        actor: &ActingUser,
    ) -> Result<ConsolidationSummary, CustodyError> {
        let docs = self.store_call(self.store.list(collections::KEYS)).await?;

        let mut pooled: Vec<(String, Key)> = Vec::new();
        for doc in docs {
            match doc.decode::<Key>() {
                Ok(key) if !key.is_restricted => pooled.push((doc.id, key)),
                Ok(_) => {},
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed key document");
                },
            }
        }

        // Grouped in first-seen order: (normalized name, display name,
        // merged holders).
        let mut groups: Vec<(String, String, Vec<Holder>)> = Vec::new();
        for (_, key) in &pooled {
            let norm = names::normalized(&key.key_name);
            let idx = match groups.iter().position(|(g, _, _)| *g == norm) {
                Some(idx) => idx,
                None => {
                    groups.push((norm, key.key_name.trim().to_string(), Vec::new()));
                    groups.len() - 1
                },
            };
            let group = &mut groups[idx];
            for holder in &key.holders {
                if holder.quantity() == 0 {
                    continue;
                }
                match group
                    .2
                    .iter_mut()
                    .find(|h| h.is(holder.kind(), holder.name()))
                {
                    Some(merged) => {
                        *merged.quantity_mut() =
                            merged.quantity().saturating_add(holder.quantity());
                    },
                    None => group
                        .2
                        .push(Holder::new(holder.kind(), holder.name(), holder.quantity())),
                }
            }
        }

        let summary = ConsolidationSummary {
            scanned: pooled.len(),
            deleted_documents: pooled.len(),
            consolidated_keys: groups.len(),
        };

        for (id, _) in &pooled {
            self.store_call(self.store.delete(collections::KEYS, id))
                .await?;
        }
        for (_, display_name, holders) in groups {
            let key = Key::pooled(display_name, holders);
            self.store_call(self.store.create(collections::KEYS, &encode(&key)?))
                .await?;
        }

        info!(
            scanned = summary.scanned,
            consolidated = summary.consolidated_keys,
            actor = actor.audit_name(),
            "consolidated legacy key documents"
        );
        Ok(summary)
    }

    /// Searches keys and transfer logs for a case-insensitive substring
    /// match.
    ///
    /// Returns the assigned-keys facet (person / key name), the lockbox
    /// facet (lockbox / key name), the log facet (key name / person), and
    /// a combined reverse-chronological history. An empty query matches
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns a store error if either scan fails.
    pub async fn search(&self, query: &str) -> Result<SearchResults, CustodyError> {
        if names::normalized(query).is_empty() {
            return Ok(SearchResults::default());
        }

        let key_docs = self.store_call(self.store.list(collections::KEYS)).await?;
        let mut keys = Vec::new();
        for doc in key_docs {
            match doc.decode::<Key>() {
                Ok(key) => keys.push(key),
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed key document");
                },
            }
        }

        let log_docs = self
            .store_call(self.store.list(collections::KEY_LOGS))
            .await?;
        let mut logs = Vec::new();
        for doc in log_docs {
            match doc.decode::<KeyLogEntry>() {
                Ok(entry) => logs.push(entry),
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed log document");
                },
            }
        }

        Ok(search::run(&keys, logs, query))
    }
}
