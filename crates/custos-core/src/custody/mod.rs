//! Key custody ledger.
//!
//! A named key is a pool of identical physical units distributed across
//! holders - lockboxes and people. Custody moves between holders in
//! quantity-conserving transfers; every completed transfer appends an
//! immutable log entry.
//!
//! # Transfer flow
//!
//! ```text
//! Signing Out:  Lockbox(quantity) --n--> Person(quantity)
//! Signing In:   Person(quantity)  --n--> Lockbox(quantity)
//! ```
//!
//! The source holder must exist with at least the requested quantity; a
//! holder whose quantity reaches zero is removed from the key entirely.
//! The sum of holder quantities therefore never changes except through
//! [`CustodyEngine::register_or_top_up`], which adds new units to a
//! lockbox.
//!
//! # Restricted keys
//!
//! A restricted key is a single tracked unit with one current holder
//! rather than a quantity-bearing pool. Restricted keys are outside the
//! transfer operations here; they only participate in search.
//!
//! # Consistency
//!
//! Operations serialize per key name through an entity lock, then follow
//! read-validate-write against the store. The holder update and the log
//! append are two separate writes: a log append that fails after the
//! holder write does NOT roll the transfer back, because the physical
//! custody event has already happened. Outcomes report whether the log
//! entry was recorded.

mod engine;
mod error;
mod search;
mod state;

#[cfg(test)]
mod tests;

pub use engine::{
    ConsolidationSummary, CustodyEngine, RegisterOutcome, TransferOutcome, TransferRequest,
};
pub use error::CustodyError;
pub use search::{AssignedKeyMatch, LockboxMatch, SearchResults};
pub use state::{Holder, HolderKind, Key, KeyLogEntry, TransferAction};
