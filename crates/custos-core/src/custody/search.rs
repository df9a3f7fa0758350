//! Search across the custody ledger's read facets.
//!
//! Pure filtering over already-fetched state; the engine fetches and
//! delegates here so the matching rules are unit-testable without a store.

use serde::Serialize;

use super::state::{Holder, Key, KeyLogEntry};
use crate::names;

/// A person currently holding units of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignedKeyMatch {
    /// Key display name.
    pub key_name: String,

    /// Person holding the units.
    pub person: String,

    /// Units held.
    pub quantity: u32,
}

/// A lockbox currently holding units of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockboxMatch {
    /// Key display name.
    pub key_name: String,

    /// Lockbox holding the units.
    pub lockbox: String,

    /// Units held.
    pub quantity: u32,
}

/// Matches from each facet plus the combined history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    /// Person holdings matching the query on person or key name.
    pub assigned: Vec<AssignedKeyMatch>,

    /// Lockbox holdings matching the query on lockbox or key name.
    pub lockboxes: Vec<LockboxMatch>,

    /// Log entries matching the query on key name or person.
    pub logs: Vec<KeyLogEntry>,

    /// All log entries matching the query on any field, newest first.
    pub history: Vec<KeyLogEntry>,
}

/// Runs the search over fetched keys and logs.
///
/// Restricted keys contribute their sole current holder to the assigned
/// and lockbox facets alongside pooled holders.
pub(super) fn run(keys: &[Key], logs: Vec<KeyLogEntry>, query: &str) -> SearchResults {
    let mut assigned = Vec::new();
    let mut lockboxes = Vec::new();

    for key in keys {
        let holders = key.holders.iter().chain(key.current_holder.as_ref());
        for holder in holders {
            let name_hit = names::contains_normalized(holder.name(), query)
                || names::contains_normalized(&key.key_name, query);
            if !name_hit {
                continue;
            }
            match holder {
                Holder::Person { name, quantity } => assigned.push(AssignedKeyMatch {
                    key_name: key.key_name.clone(),
                    person: name.clone(),
                    quantity: *quantity,
                }),
                Holder::Lockbox { name, quantity } => lockboxes.push(LockboxMatch {
                    key_name: key.key_name.clone(),
                    lockbox: name.clone(),
                    quantity: *quantity,
                }),
            }
        }
    }

    let log_matches: Vec<KeyLogEntry> = logs
        .iter()
        .filter(|entry| {
            names::contains_normalized(&entry.key_name, query)
                || names::contains_normalized(&entry.person, query)
        })
        .cloned()
        .collect();

    let mut history: Vec<KeyLogEntry> = logs
        .into_iter()
        .filter(|entry| {
            names::contains_normalized(&entry.key_name, query)
                || names::contains_normalized(&entry.person, query)
                || names::contains_normalized(&entry.lockbox, query)
        })
        .collect();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    SearchResults {
        assigned,
        lockboxes,
        logs: log_matches,
        history,
    }
}
