//! Inspection engine implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use super::error::InspectionError;
use super::schedule::{Frequency, classify};
use super::state::{Component, InspectionRecord, InspectionStatus};
use crate::identity::ActingUser;
use crate::store::{EntityStore, StoreError, collections, encode};
use crate::sync::EntityLocks;

/// A component together with its document id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSnapshot {
    /// Document id of the component.
    pub id: String,

    /// The component state.
    pub component: Component,
}

/// Components split into the three due-work views.
///
/// A component can appear in both `upcoming` and `recent` (independent
/// windows); it never appears in both `overdue` and `upcoming`.
#[derive(Debug, Clone, Default)]
pub struct InspectionBuckets {
    /// Never inspected or past due.
    pub overdue: Vec<ComponentSnapshot>,

    /// Due within the next 30 days.
    pub upcoming: Vec<ComponentSnapshot>,

    /// Checked within the last 30 days.
    pub recent: Vec<ComponentSnapshot>,
}

/// Result of logging an inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionOutcome {
    /// The inspected component.
    pub component_id: String,

    /// Normalized outcome that was stored.
    pub status: InspectionStatus,

    /// Recomputed next due date.
    pub next_due: DateTime<Utc>,

    /// Whether the immutable inspection record was written. `false` means
    /// the component update succeeded but the record write failed; the
    /// component's schedule is advanced either way.
    pub record_written: bool,
}

/// Stateless inspection service over the document store.
pub struct InspectionEngine {
    store: Arc<dyn EntityStore>,
    locks: EntityLocks,
    store_timeout: Duration,
}

impl InspectionEngine {
    /// Creates an engine over the given store.
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
    ) -> Result<T, InspectionError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(InspectionError::StoreTimeout {
                deadline_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Adds a never-inspected component under an asset and returns its
    /// document id.
    ///
    /// The frequency is normalized from loose text; unrecognized input
    /// becomes annually.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the asset id is empty, or a store
    /// error if the write fails.
    pub async fn create_component(
        &self,
        asset_id: &str,
        frequency: &str,
        actor: &ActingUser,
    ) -> Result<String, InspectionError> {
        let asset_id = asset_id.trim();
        if asset_id.is_empty() {
            return Err(InspectionError::MissingField { field: "assetId" });
        }

        let component = Component::new(asset_id, Frequency::normalize(frequency));
        let id = self
            .store_call(
                self.store
                    .create(collections::COMPONENTS, &encode(&component)?),
            )
            .await?;
        info!(
            component = %id,
            asset = asset_id,
            frequency = component.frequency.as_str(),
            actor = actor.audit_name(),
            "component added"
        );
        Ok(id)
    }

    /// Logs an inspection using the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::record_inspection_at`].
    pub async fn record_inspection(
        &self,
        component_id: &str,
        raw_status: &str,
        notes: &str,
        actor: &ActingUser,
    ) -> Result<InspectionOutcome, InspectionError> {
        self.record_inspection_at(component_id, raw_status, notes, actor, Utc::now())
            .await
    }

    /// Logs an inspection with an explicit timestamp.
    ///
    /// Reads the component's current frequency, stamps
    /// `lastChecked = now`, recomputes `nextDue` from the frequency, and
    /// stores the normalized status; then writes one immutable
    /// [`InspectionRecord`]. The record write is best-effort relative to
    /// the component update (see [`InspectionOutcome::record_written`]).
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty component id,
    /// `ComponentNotFound` for an unknown component (nothing written), or
    /// a store error if the component update fails.
    pub async fn record_inspection_at(
        &self,
        component_id: &str,
        raw_status: &str,
        notes: &str,
        actor: &ActingUser,
        now: DateTime<Utc>,
    ) -> Result<InspectionOutcome, InspectionError> {
        let component_id = component_id.trim();
        if component_id.is_empty() {
            return Err(InspectionError::MissingField {
                field: "componentId",
            });
        }

        let _guard = self
            .locks
            .acquire(&format!("components/{component_id}"))
            .await;

        let doc = self
            .store_call(self.store.get(collections::COMPONENTS, component_id))
            .await?
            .ok_or_else(|| InspectionError::ComponentNotFound {
                component_id: component_id.to_string(),
            })?;
        let component: Component = doc.decode()?;

        let status = InspectionStatus::normalize(raw_status);
        let next_due = component.frequency.next_due(now);

        self.store_call(self.store.update_merge(
            collections::COMPONENTS,
            component_id,
            &json!({
                "lastChecked": now,
                "nextDue": next_due,
                "status": status,
            }),
        ))
        .await?;

        let record = InspectionRecord {
            component_id: component_id.to_string(),
            asset_id: component.asset_id.clone(),
            date: now,
            inspector: actor.audit_name().to_string(),
            status,
            notes: notes.trim().to_string(),
            frequency: component.frequency,
        };
        let record_written = match self.append_record(&record).await {
            Ok(()) => true,
            Err(err) => {
                // The schedule already advanced; keep it and surface the
                // missing record instead of rolling back.
                warn!(
                    component = component_id,
                    error = %err,
                    "component updated but inspection record was not written"
                );
                false
            },
        };

        info!(
            component = component_id,
            asset = %component.asset_id,
            status = status.as_str(),
            next_due = %next_due,
            actor = actor.audit_name(),
            "inspection recorded"
        );
        Ok(InspectionOutcome {
            component_id: component_id.to_string(),
            status,
            next_due,
            record_written,
        })
    }

    async fn append_record(&self, record: &InspectionRecord) -> Result<(), InspectionError> {
        let body = encode(record)?;
        self.store_call(self.store.create(collections::INSPECTIONS, &body))
            .await?;
        Ok(())
    }

    /// Classifies every component into the due-work views relative to
    /// `now`.
    ///
    /// Malformed component documents are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns a store error if the scan fails.
    pub async fn component_buckets(
        &self,
        now: DateTime<Utc>,
    ) -> Result<InspectionBuckets, InspectionError> {
        let docs = self
            .store_call(self.store.list(collections::COMPONENTS))
            .await?;

        let mut buckets = InspectionBuckets::default();
        for doc in docs {
            let component: Component = match doc.decode() {
                Ok(component) => component,
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed component document");
                    continue;
                },
            };
            let class = classify(&component, now);
            let snapshot = ComponentSnapshot {
                id: doc.id,
                component,
            };
            if class.overdue {
                buckets.overdue.push(snapshot.clone());
            }
            if class.upcoming {
                buckets.upcoming.push(snapshot.clone());
            }
            if class.recent {
                buckets.recent.push(snapshot);
            }
        }
        Ok(buckets)
    }
}
