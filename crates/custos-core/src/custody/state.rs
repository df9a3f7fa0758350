//! Custody ledger data model.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::names;

/// Which side of a custody relationship a holder is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    /// A fixed storage location keys are issued from and returned to.
    Lockbox,
    /// A person currently carrying keys.
    Person,
}

impl HolderKind {
    /// The other side of the relationship.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Lockbox => Self::Person,
            Self::Person => Self::Lockbox,
        }
    }
}

/// An entity currently possessing some quantity of a named key.
///
/// Serialized as `{"type": "lockbox"|"person", "name": ..., "quantity":
/// ...}`. Quantities are always at least 1 in stored state; an entry that
/// reaches zero during a transfer is pruned rather than persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Holder {
    /// Units sitting in a lockbox.
    Lockbox {
        /// Lockbox display name.
        name: String,
        /// Number of units held.
        quantity: u32,
    },
    /// Units signed out to a person.
    Person {
        /// Person display name.
        name: String,
        /// Number of units held.
        quantity: u32,
    },
}

impl Holder {
    /// Creates a holder of the given kind.
    #[must_use]
    pub fn new(kind: HolderKind, name: impl Into<String>, quantity: u32) -> Self {
        match kind {
            HolderKind::Lockbox => Self::Lockbox {
                name: name.into(),
                quantity,
            },
            HolderKind::Person => Self::Person {
                name: name.into(),
                quantity,
            },
        }
    }

    /// Creates a lockbox holder.
    #[must_use]
    pub fn lockbox(name: impl Into<String>, quantity: u32) -> Self {
        Self::new(HolderKind::Lockbox, name, quantity)
    }

    /// Creates a person holder.
    #[must_use]
    pub fn person(name: impl Into<String>, quantity: u32) -> Self {
        Self::new(HolderKind::Person, name, quantity)
    }

    /// The holder's kind.
    #[must_use]
    pub const fn kind(&self) -> HolderKind {
        match self {
            Self::Lockbox { .. } => HolderKind::Lockbox,
            Self::Person { .. } => HolderKind::Person,
        }
    }

    /// The holder's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Lockbox { name, .. } | Self::Person { name, .. } => name,
        }
    }

    /// Number of units held.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        match self {
            Self::Lockbox { quantity, .. } | Self::Person { quantity, .. } => *quantity,
        }
    }

    /// Mutable access to the held quantity.
    pub fn quantity_mut(&mut self) -> &mut u32 {
        match self {
            Self::Lockbox { quantity, .. } | Self::Person { quantity, .. } => quantity,
        }
    }

    /// Returns `true` if this holder is the given `(kind, name)` pair,
    /// comparing names case-insensitively.
    #[must_use]
    pub fn is(&self, kind: HolderKind, name: &str) -> bool {
        self.kind() == kind && names::eq_normalized(self.name(), name)
    }
}

/// A named key and its current custody state.
///
/// A pooled key (`is_restricted == false`) carries a `holders` list whose
/// quantities sum to the number of units ever registered; a restricted key
/// carries a single optional `current_holder` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// Display name; compared case-insensitively.
    pub key_name: String,

    /// Restricted keys are single-unit and tracked by sole holder.
    #[serde(default)]
    pub is_restricted: bool,

    /// Current holders of a pooled key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holders: Vec<Holder>,

    /// Sole holder of a restricted key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_holder: Option<Holder>,
}

impl Key {
    /// Creates a pooled (non-restricted) key.
    #[must_use]
    pub fn pooled(key_name: impl Into<String>, holders: Vec<Holder>) -> Self {
        Self {
            key_name: key_name.into(),
            is_restricted: false,
            holders,
            current_holder: None,
        }
    }

    /// Sum of all holder quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.holders.iter().map(|h| u64::from(h.quantity())).sum()
    }

    /// Index of the holder matching `(kind, name)` case-insensitively.
    #[must_use]
    pub fn holder_position(&self, kind: HolderKind, name: &str) -> Option<usize> {
        self.holders.iter().position(|h| h.is(kind, name))
    }
}

/// Direction of a custody transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferAction {
    /// Lockbox to person.
    #[serde(rename = "Signing Out")]
    SigningOut,

    /// Person back to lockbox.
    #[serde(rename = "Signing In")]
    SigningIn,
}

impl TransferAction {
    /// The holder kind custody moves from.
    #[must_use]
    pub const fn source_kind(self) -> HolderKind {
        match self {
            Self::SigningOut => HolderKind::Lockbox,
            Self::SigningIn => HolderKind::Person,
        }
    }

    /// The wire/display form of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SigningOut => "Signing Out",
            Self::SigningIn => "Signing In",
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one custody transfer.
///
/// Created on every completed transfer; never mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLogEntry {
    /// The key that moved.
    pub key_name: String,

    /// Transfer direction.
    pub action: TransferAction,

    /// The person side of the transfer.
    pub person: String,

    /// The lockbox side of the transfer.
    pub lockbox: String,

    /// Submission time.
    pub timestamp: DateTime<Utc>,

    /// Audit name of the acting user.
    pub submitted_by: String,
}
