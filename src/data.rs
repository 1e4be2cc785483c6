//! Shared state handed to the poise framework and the gateway handler.

use crate::config::BotConfig;
use crate::confinement::LockRegistry;

/// Centralized data structure for the bot.
///
/// Clones share the same registry; the configuration is fixed at startup.
#[derive(Debug, Clone)]
pub struct Data {
    pub registry: LockRegistry,
    pub config: BotConfig,
}

impl Data {
    #[must_use]
    pub fn new(registry: LockRegistry, config: BotConfig) -> Self {
        Self { registry, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_registry() {
        let config = BotConfig {
            prison_channel_id: 1,
            prison_role_id: 2,
            owner_role_id: 3,
        };
        let data = Data::new(LockRegistry::new(), config);
        let clone = data.clone();

        data.registry
            .lock(poise::serenity_prelude::UserId::new(42), data.config.prison_channel(), None);
        assert!(clone.registry.is_locked(poise::serenity_prelude::UserId::new(42)));
    }
}
