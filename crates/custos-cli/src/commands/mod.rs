//! Command implementations.
//!
//! Role gates live here, not in the engines: the engines trust their
//! caller, and this CLI is the caller.

pub mod inspection;
pub mod key;
pub mod radio;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use custos_core::identity::{ActingUser, Role};
use custos_core::store::EntityStore;

/// Everything a command needs to run.
pub struct AppContext {
    /// The shared document store.
    pub store: Arc<dyn EntityStore>,

    /// Deadline for engine store calls.
    pub store_timeout: Duration,

    /// The resolved operator.
    pub user: ActingUser,
}

/// Rejects the command if the operator's role is below `min`.
pub fn require_role(user: &ActingUser, min: Role) -> Result<()> {
    if user.role < min {
        bail!(
            "this operation requires the {} role (acting as {})",
            min.as_str(),
            user.role.as_str()
        );
    }
    Ok(())
}
