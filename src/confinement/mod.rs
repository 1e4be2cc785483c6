//! Voice confinement subsystem.
//!
//! Tracks which users are locked to a prison voice channel, expires timed
//! locks, and forces escapees back where they belong.

mod duration;
mod enforcer;
mod error;
mod record;
mod registry;

pub use duration::{format_remaining, parse_duration};
pub use enforcer::{
    ENFORCEMENT_REASON, EnforcementOutcome, INITIAL_MOVE_REASON, VoiceMover, enforce_movement,
};
pub use error::{ConfinementError, ConfinementResult};
pub use record::{LockRecord, LockStatus};
pub use registry::LockRegistry;
