//! Radio assignment engine implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::error::RadioError;
use super::state::{
    ACCESSORY_EARPIECE, ACCESSORY_SURVEILLANCE_KIT, Radio, RadioAssignment, RadioStatus,
    ReplacementPart,
};
use crate::identity::ActingUser;
use crate::store::{EntityStore, QueryOp, StoreError, collections, encode};
use crate::sync::EntityLocks;

/// A radio sign-out request.
///
/// Accessories are flag-driven: the earpiece is an add-on to the
/// surveillance kit and is only consistent when the kit flag is also set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignOutRequest {
    /// Id of the radio document.
    pub radio_id: String,

    /// Person taking the radio.
    pub person_name: String,

    /// Issue the surveillance kit with this radio.
    pub surveillance_kit: bool,

    /// Issue the earpiece add-on; requires `surveillance_kit`.
    pub earpiece: bool,
}

/// Result of a successful sign-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutOutcome {
    /// The radio that was signed out.
    pub radio_id: String,

    /// Person holding it now.
    pub person_name: String,

    /// Assignment start time.
    pub assigned_at: DateTime<Utc>,

    /// Id of the created history record, or `None` if the radio state was
    /// updated but the history write failed (not rolled back).
    pub assignment_id: Option<String>,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    /// The radio that came back.
    pub radio_id: String,

    /// Return time.
    pub returned_at: DateTime<Utc>,

    /// Whether an open assignment record was found and closed. `false`
    /// covers both a missing record and a failed history write; the radio
    /// is available either way.
    pub closed_assignment: bool,
}

/// Stateless radio assignment service over the document store.
pub struct RadioEngine {
    store: Arc<dyn EntityStore>,
    locks: EntityLocks,
    store_timeout: Duration,
}

impl RadioEngine {
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
    ) -> Result<T, RadioError> {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RadioError::StoreTimeout {
                deadline_ms: u64::try_from(self.store_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn load_radio(&self, radio_id: &str) -> Result<Radio, RadioError> {
        let doc = self
            .store_call(self.store.get(collections::RADIOS, radio_id))
            .await?
            .ok_or_else(|| RadioError::RadioNotFound {
                radio_id: radio_id.to_string(),
            })?;
        Ok(doc.decode()?)
    }

    /// Adds a radio to the inventory in the available state and returns
    /// its document id.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any identifying field is empty, or a
    /// store error if the write fails.
    pub async fn create_radio(
        &self,
        callsign: &str,
        radio_number: &str,
        serial_number: &str,
        actor: &ActingUser,
    ) -> Result<String, RadioError> {
        let callsign = callsign.trim();
        let radio_number = radio_number.trim();
        let serial_number = serial_number.trim();
        if callsign.is_empty() {
            return Err(RadioError::MissingField { field: "callsign" });
        }
        if radio_number.is_empty() {
            return Err(RadioError::MissingField {
                field: "radioNumber",
            });
        }
        if serial_number.is_empty() {
            return Err(RadioError::MissingField {
                field: "serialNumber",
            });
        }

        let radio = Radio::new(callsign, radio_number, serial_number);
        let id = self
            .store_call(self.store.create(collections::RADIOS, &encode(&radio)?))
            .await?;
        info!(radio = %id, callsign, actor = actor.audit_name(), "radio added");
        Ok(id)
    }

    /// Signs a radio out to a person, using the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::sign_out_at`].
    pub async fn sign_out(
        &self,
        request: &SignOutRequest,
        actor: &ActingUser,
    ) -> Result<SignOutOutcome, RadioError> {
        self.sign_out_at(request, actor, Utc::now()).await
    }

    /// Signs a radio out with an explicit timestamp.
    ///
    /// Precondition: the radio is available. On success the radio becomes
    /// assigned and an open [`RadioAssignment`] is created recording the
    /// issued accessories. The history write is best-effort relative to
    /// the status update (see [`SignOutOutcome::assignment_id`]).
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty person name or an earpiece
    /// without the kit, `RadioNotFound` for an unknown id,
    /// `RadioNotAvailable` if the radio is already out (nothing written in
    /// any of these cases), or a store error if the status update fails.
    pub async fn sign_out_at(
        &self,
        request: &SignOutRequest,
        actor: &ActingUser,
        now: DateTime<Utc>,
    ) -> Result<SignOutOutcome, RadioError> {
        let person_name = request.person_name.trim();
        if request.radio_id.trim().is_empty() {
            return Err(RadioError::MissingField { field: "radioId" });
        }
        if person_name.is_empty() {
            return Err(RadioError::MissingField {
                field: "personName",
            });
        }
        if request.earpiece && !request.surveillance_kit {
            return Err(RadioError::InconsistentAccessories);
        }

        let radio_id = request.radio_id.trim();
        let _guard = self.locks.acquire(&format!("radios/{radio_id}")).await;

        let radio = self.load_radio(radio_id).await?;
        if radio.status != RadioStatus::Available {
            return Err(RadioError::RadioNotAvailable {
                radio_id: radio_id.to_string(),
                status: radio.status,
            });
        }

        self.store_call(self.store.update_merge(
            collections::RADIOS,
            radio_id,
            &json!({
                "status": RadioStatus::Assigned,
                "assignedTo": person_name,
                "assignedAt": now,
            }),
        ))
        .await?;

        // Accessories are only recorded when the kit goes out.
        let mut accessories = Vec::new();
        if request.surveillance_kit {
            accessories.push(ACCESSORY_SURVEILLANCE_KIT.to_string());
            if request.earpiece {
                accessories.push(ACCESSORY_EARPIECE.to_string());
            }
        }

        let assignment = RadioAssignment {
            radio_id: radio_id.to_string(),
            radio_callsign: radio.callsign.clone(),
            radio_number: radio.radio_number.clone(),
            serial_number: radio.serial_number.clone(),
            person_name: person_name.to_string(),
            assigned_at: now,
            returned_at: None,
            accessories,
            replacement_parts: Vec::new(),
        };
        let assignment_id = match self.append_assignment(&assignment).await {
            Ok(id) => Some(id),
            Err(err) => {
                // The radio left the shelf regardless; keep the state
                // change and surface the gap.
                warn!(
                    radio = radio_id,
                    error = %err,
                    "radio status updated but assignment record was not created"
                );
                None
            },
        };

        info!(
            radio = radio_id,
            callsign = %radio.callsign,
            person = person_name,
            actor = actor.audit_name(),
            "radio signed out"
        );
        Ok(SignOutOutcome {
            radio_id: radio_id.to_string(),
            person_name: person_name.to_string(),
            assigned_at: now,
            assignment_id,
        })
    }

    async fn append_assignment(&self, assignment: &RadioAssignment) -> Result<String, RadioError> {
        let body = encode(assignment)?;
        self.store_call(self.store.create(collections::RADIO_ASSIGNMENTS, &body))
            .await
    }

    /// Signs a radio back in, using the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::sign_in_at`].
    pub async fn sign_in(
        &self,
        radio_id: &str,
        actor: &ActingUser,
    ) -> Result<SignInOutcome, RadioError> {
        self.sign_in_at(radio_id, actor, Utc::now()).await
    }

    /// Signs a radio back in with an explicit timestamp.
    ///
    /// Precondition: the radio is assigned. The radio returns to available
    /// first; the open assignment record is then closed by setting
    /// `returnedAt`. A missing open assignment does not block the return -
    /// the radio still transitions and the gap is logged.
    ///
    /// # Errors
    ///
    /// Returns `RadioNotFound` for an unknown id, `RadioNotAssigned` if
    /// the radio is already on the shelf (nothing written), or a store
    /// error if the status update fails.
    pub async fn sign_in_at(
        &self,
        radio_id: &str,
        actor: &ActingUser,
        now: DateTime<Utc>,
    ) -> Result<SignInOutcome, RadioError> {
        let radio_id = radio_id.trim();
        if radio_id.is_empty() {
            return Err(RadioError::MissingField { field: "radioId" });
        }

        let _guard = self.locks.acquire(&format!("radios/{radio_id}")).await;

        let radio = self.load_radio(radio_id).await?;
        if radio.status != RadioStatus::Assigned {
            return Err(RadioError::RadioNotAssigned {
                radio_id: radio_id.to_string(),
                status: radio.status,
            });
        }

        self.store_call(self.store.update_merge(
            collections::RADIOS,
            radio_id,
            &json!({
                "status": RadioStatus::Available,
                "assignedTo": null,
                "assignedAt": null,
            }),
        ))
        .await?;

        let closed_assignment = match self.close_open_assignment(radio_id, now).await {
            Ok(closed) => closed,
            Err(err) => {
                warn!(
                    radio = radio_id,
                    error = %err,
                    "radio returned but assignment record was not closed"
                );
                false
            },
        };
        if !closed_assignment {
            warn!(radio = radio_id, "no open assignment record for returned radio");
        }

        info!(
            radio = radio_id,
            callsign = %radio.callsign,
            actor = actor.audit_name(),
            "radio signed in"
        );
        Ok(SignInOutcome {
            radio_id: radio_id.to_string(),
            returned_at: now,
            closed_assignment,
        })
    }

    /// Finds the open assignment for a radio and stamps `returnedAt`.
    ///
    /// Returns `false` if there is no open assignment.
    async fn close_open_assignment(
        &self,
        radio_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RadioError> {
        let docs = self
            .store_call(self.store.query(
                collections::RADIO_ASSIGNMENTS,
                "radioId",
                QueryOp::Eq,
                &json!(radio_id),
            ))
            .await?;

        for doc in docs {
            let assignment: RadioAssignment = match doc.decode() {
                Ok(assignment) => assignment,
                Err(err) => {
                    warn!(id = %doc.id, error = %err, "skipping malformed assignment document");
                    continue;
                },
            };
            if assignment.returned_at.is_none() {
                self.store_call(self.store.update_merge(
                    collections::RADIO_ASSIGNMENTS,
                    &doc.id,
                    &json!({ "returnedAt": now }),
                ))
                .await?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Records replacement parts fitted during an assignment, using the
    /// current time.
    ///
    /// # Errors
    ///
    /// See [`Self::add_replacement_parts_at`].
    pub async fn add_replacement_parts(
        &self,
        assignment_id: &str,
        parts: &[String],
        actor: &ActingUser,
    ) -> Result<RadioAssignment, RadioError> {
        self.add_replacement_parts_at(assignment_id, parts, actor, Utc::now())
            .await
    }

    /// Records replacement parts with an explicit timestamp.
    ///
    /// Purely additive audit data: each part is appended to the
    /// assignment's `replacementParts` with its own timestamp; the radio
    /// state machine is untouched. Empty part descriptions are skipped.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no non-empty part was given,
    /// `AssignmentNotFound` for an unknown assignment, or a store error
    /// if the write fails.
    pub async fn add_replacement_parts_at(
        &self,
        assignment_id: &str,
        parts: &[String],
        actor: &ActingUser,
        now: DateTime<Utc>,
    ) -> Result<RadioAssignment, RadioError> {
        let assignment_id = assignment_id.trim();
        if assignment_id.is_empty() {
            return Err(RadioError::MissingField {
                field: "assignmentId",
            });
        }
        let parts: Vec<&str> = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(RadioError::MissingField { field: "parts" });
        }

        let _guard = self
            .locks
            .acquire(&format!("radioAssignments/{assignment_id}"))
            .await;

        let doc = self
            .store_call(self.store.get(collections::RADIO_ASSIGNMENTS, assignment_id))
            .await?
            .ok_or_else(|| RadioError::AssignmentNotFound {
                assignment_id: assignment_id.to_string(),
            })?;
        let mut assignment: RadioAssignment = doc.decode()?;

        for part in &parts {
            assignment.replacement_parts.push(ReplacementPart {
                part: (*part).to_string(),
                added_at: now,
            });
        }

        self.store_call(self.store.update_merge(
            collections::RADIO_ASSIGNMENTS,
            assignment_id,
            &json!({ "replacementParts": encode(&assignment.replacement_parts)? }),
        ))
        .await?;

        info!(
            assignment = assignment_id,
            parts = parts.len(),
            actor = actor.audit_name(),
            "replacement parts recorded"
        );
        Ok(assignment)
    }
}
