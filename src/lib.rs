pub mod commands;
pub mod config;
pub mod confinement;
pub mod data;
pub mod dispatcher;
pub mod handlers;
pub mod logging;

/// Name of the bot, used in log output.
pub const BOT_NAME: &str = "oubliette";
pub const COMMAND_TARGET: &str = "oubliette::command";
pub const ERROR_TARGET: &str = "oubliette::error";
pub const EVENT_TARGET: &str = "oubliette::handlers";
pub const CONSOLE_TARGET: &str = "oubliette";

pub use config::BotConfig;
pub use confinement::{LockRegistry, LockStatus};
pub use data::Data;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
