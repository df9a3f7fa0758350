//! Acting-user identity and roles.
//!
//! Identity resolution (authentication) is an external concern: callers
//! obtain an [`ActingUser`] from whatever provider they use and pass it
//! explicitly into every mutating engine operation. Engines only read the
//! audit name from it; role gating is the calling layer's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name recorded in audit entries when no identity field is available.
pub const UNKNOWN_ACTOR: &str = "Unknown";

/// Errors produced when resolving identity inputs.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    /// The role string did not match any known role.
    #[error("unknown role: {value}")]
    UnknownRole {
        /// The unrecognized value.
        value: String,
    },
}

/// Access role of an acting user.
///
/// Ordered from least to most privileged, so `role >= Role::Manager` reads
/// naturally at gate sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only visitor.
    Guest,
    /// Regular staff member: may transfer custody and sign radios in/out.
    User,
    /// May additionally create inventory and log inspections.
    Manager,
    /// Full access, including migrations.
    Admin,
}

impl Role {
    /// Parses a role string case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns `UnknownRole` for anything other than
    /// guest/user/manager/admin.
    pub fn parse(value: &str) -> Result<Self, IdentityError> {
        match value.trim().to_lowercase().as_str() {
            "guest" => Ok(Self::Guest),
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            _ => Err(IdentityError::UnknownRole {
                value: value.to_string(),
            }),
        }
    }

    /// Returns the lowercase string form of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

/// The user on whose behalf an operation runs.
///
/// Mirrors what an identity provider returns: any of the name fields may be
/// absent. [`ActingUser::audit_name`] applies the
/// `display_name -> email -> uid -> "Unknown"` fallback chain used for
/// audit records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    /// Human-readable display name, if the provider supplied one.
    pub display_name: Option<String>,

    /// Email address, if known.
    pub email: Option<String>,

    /// Opaque provider uid, if known.
    pub uid: Option<String>,

    /// Resolved access role.
    pub role: Role,
}

impl ActingUser {
    /// Creates a user with only a role (anonymous actor).
    #[must_use]
    pub const fn with_role(role: Role) -> Self {
        Self {
            display_name: None,
            email: None,
            uid: None,
            role,
        }
    }

    /// Creates a named user.
    #[must_use]
    pub fn named(display_name: impl Into<String>, role: Role) -> Self {
        Self {
            display_name: Some(display_name.into()),
            ..Self::with_role(role)
        }
    }

    /// Name to record in audit entries.
    ///
    /// Falls back `display_name -> email -> uid -> "Unknown"`, skipping
    /// fields that are empty after trimming.
    #[must_use]
    pub fn audit_name(&self) -> &str {
        [&self.display_name, &self.email, &self.uid]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_ACTOR)
    }
}
