//! Error types for the confinement subsystem.

use thiserror::Error;

/// Errors that can occur while enforcing or applying a confinement.
#[derive(Debug, Error)]
pub enum ConfinementError {
    /// Discord API error
    #[error("Discord API error: {0}")]
    DiscordApi(#[from] Box<poise::serenity_prelude::Error>),

    /// Failed to get guild or member
    #[error("Failed to get guild or member: {0}")]
    GuildOrMemberNotFound(String),

    /// Generic error
    #[error("Confinement error: {0}")]
    Other(String),
}

impl From<poise::serenity_prelude::Error> for ConfinementError {
    fn from(error: poise::serenity_prelude::Error) -> Self {
        Self::DiscordApi(Box::new(error))
    }
}

impl From<String> for ConfinementError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

/// Result type for confinement operations
pub type ConfinementResult<T> = Result<T, ConfinementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ConfinementError::GuildOrMemberNotFound("user 42".to_string());
        assert_eq!(error.to_string(), "Failed to get guild or member: user 42");

        let error = ConfinementError::from("something went wrong".to_string());
        assert_eq!(error.to_string(), "Confinement error: something went wrong");
    }
}
