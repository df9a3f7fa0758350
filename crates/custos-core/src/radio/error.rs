//! Radio-specific error types.

use thiserror::Error;

use super::state::RadioStatus;
use crate::store::StoreError;

/// Errors that can occur during radio assignment operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RadioError {
    /// A required field was empty after trimming.
    #[error("missing required field: {field}")]
    MissingField {
        /// The empty field.
        field: &'static str,
    },

    /// The earpiece add-on was requested without the surveillance kit.
    #[error("earpiece accessory requires the surveillance kit")]
    InconsistentAccessories,

    /// The referenced radio does not exist.
    #[error("radio not found: {radio_id}")]
    RadioNotFound {
        /// The id that was looked up.
        radio_id: String,
    },

    /// Sign-out attempted on a radio that is not available.
    #[error("radio {radio_id} is not available: currently {status}", status = .status.as_str())]
    RadioNotAvailable {
        /// The radio id.
        radio_id: String,
        /// The radio's current status.
        status: RadioStatus,
    },

    /// Sign-in attempted on a radio that is not assigned.
    #[error("radio {radio_id} is not assigned: currently {status}", status = .status.as_str())]
    RadioNotAssigned {
        /// The radio id.
        radio_id: String,
        /// The radio's current status.
        status: RadioStatus,
    },

    /// The referenced assignment record does not exist.
    #[error("assignment not found: {assignment_id}")]
    AssignmentNotFound {
        /// The id that was looked up.
        assignment_id: String,
    },

    /// The underlying store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A store call exceeded the configured deadline.
    #[error("store call exceeded {deadline_ms}ms deadline")]
    StoreTimeout {
        /// The deadline that elapsed.
        deadline_ms: u64,
    },
}
