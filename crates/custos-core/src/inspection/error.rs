//! Inspection-specific error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during inspection operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InspectionError {
    /// A required field was empty after trimming.
    #[error("missing required field: {field}")]
    MissingField {
        /// The empty field.
        field: &'static str,
    },

    /// The referenced component does not exist.
    #[error("component not found: {component_id}")]
    ComponentNotFound {
        /// The id that was looked up.
        component_id: String,
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
