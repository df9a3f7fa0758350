//! CLI configuration: the core engine settings plus the operator's
//! standing identity.

use std::path::Path;

use anyhow::{Context, Result, bail};
use custos_core::config::CoreConfig;
use custos_core::identity::{ActingUser, Role};
use serde::Deserialize;

/// Operator identity as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActorConfig {
    /// Display name.
    pub name: Option<String>,

    /// Email address.
    pub email: Option<String>,

    /// Provider uid.
    pub uid: Option<String>,

    /// Role string (guest, user, manager, admin). Defaults to user.
    pub role: Option<String>,
}

/// Top-level CLI configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    /// Engine settings (store path, deadlines).
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Standing operator identity.
    #[serde(default)]
    pub actor: ActorConfig,
}

impl CliConfig {
    /// Loads the config file, falling back to defaults if it does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if config.core.store_timeout_ms == 0 {
            bail!("store_timeout_ms must be at least 1");
        }
        Ok(config)
    }

    /// Resolves the acting user, applying command-line overrides.
    pub fn acting_user(
        &self,
        name_override: Option<&str>,
        role_override: Option<&str>,
    ) -> Result<ActingUser> {
        let role_str = role_override
            .map(str::to_string)
            .or_else(|| self.actor.role.clone())
            .unwrap_or_else(|| "user".to_string());
        let role = Role::parse(&role_str).context("invalid role")?;

        Ok(ActingUser {
            display_name: name_override
                .map(str::to_string)
                .or_else(|| self.actor.name.clone()),
            email: self.actor.email.clone(),
            uid: self.actor.uid.clone(),
            role,
        })
    }
}
