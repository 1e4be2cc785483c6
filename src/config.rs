//! Deployment configuration.
//!
//! Fixed at startup: the prison voice channel and the two role ids that grant
//! the prison and owner capabilities. Read from a YAML file when present,
//! otherwise from the environment. The Discord token is always taken from
//! `DISCORD_TOKEN` by `main`.

use poise::serenity_prelude::{ChannelId, RoleId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the optional YAML configuration file.
pub const CONFIG_FILE: &str = "config/oubliette.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("{0} is not a valid Discord id: {1}")]
    InvalidId(&'static str, String),

    #[error("failed to read {CONFIG_FILE}: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse {CONFIG_FILE}: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Bot configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    // The voice channel locked users are confined to
    pub prison_channel_id: u64,
    // Role that grants the prison capability (lock/unlock/lockinfo)
    pub prison_role_id: u64,
    // Role that grants the owner capability (unlockall, rank bypass)
    pub owner_role_id: u64,
}

impl BotConfig {
    /// Load the configuration, preferring [`CONFIG_FILE`] and falling back
    /// to the `PRISON_CHANNEL_ID`, `PRISON_ROLE_ID` and `OWNER_ROLE_ID`
    /// environment variables.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if a fallback variable is missing or not a numeric id.
    pub async fn load() -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(CONFIG_FILE).await.unwrap_or(false) {
            let content = tokio::fs::read_to_string(CONFIG_FILE).await?;
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Self::from_env()
        }
    }

    /// Build the configuration from environment variables alone.
    ///
    /// # Errors
    /// Returns an error for a missing or non-numeric variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            prison_channel_id: env_id("PRISON_CHANNEL_ID")?,
            prison_role_id: env_id("PRISON_ROLE_ID")?,
            owner_role_id: env_id("OWNER_ROLE_ID")?,
        })
    }

    #[must_use]
    pub fn prison_channel(&self) -> ChannelId {
        ChannelId::new(self.prison_channel_id)
    }

    #[must_use]
    pub fn prison_role(&self) -> RoleId {
        RoleId::new(self.prison_role_id)
    }

    #[must_use]
    pub fn owner_role(&self) -> RoleId {
        RoleId::new(self.owner_role_id)
    }
}

fn env_id(name: &'static str) -> Result<u64, ConfigError> {
    let value = std::env::var(name).map_err(|_| ConfigError::MissingVar(name))?;
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidId(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_yaml_shape() {
        let yaml = "prison_channel_id: 1444470661979312168\n\
                    prison_role_id: 1444471176817803475\n\
                    owner_role_id: 1444469426962436136\n";
        let config: BotConfig = serde_yaml::from_str(yaml).expect("parses");
        assert_eq!(config.prison_channel(), ChannelId::new(1444470661979312168));
        assert_eq!(config.prison_role(), RoleId::new(1444471176817803475));
        assert_eq!(config.owner_role(), RoleId::new(1444469426962436136));
    }

    #[test]
    fn test_config_rejects_missing_fields() {
        let yaml = "prison_channel_id: 1\n";
        assert!(serde_yaml::from_str::<BotConfig>(yaml).is_err());
    }
}
