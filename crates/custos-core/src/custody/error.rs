//! Custody-specific error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during custody ledger operations.
///
/// `MissingField`, `NonPositiveQuantity`, `KeyNotFound`, and
/// `InsufficientQuantity` are all rejected before any write happens.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CustodyError {
    /// A required field was empty after trimming.
    #[error("missing required field: {field}")]
    MissingField {
        /// The empty field.
        field: &'static str,
    },

    /// A transfer or registration quantity was zero.
    #[error("quantity must be at least 1")]
    NonPositiveQuantity,

    /// No pooled key with this name exists.
    #[error("key not found: {key_name}")]
    KeyNotFound {
        /// The name that was looked up.
        key_name: String,
    },

    /// The source holder does not hold enough units for the transfer.
    #[error("not enough keys in {holder}: available={available}, requested={requested}")]
    InsufficientQuantity {
        /// The source holder's name.
        holder: String,
        /// Units the holder actually has (0 if the holder is absent).
        available: u32,
        /// Units the transfer asked for.
        requested: u32,
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
