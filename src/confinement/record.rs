//! Lock record and observable lock status.

use chrono::{DateTime, TimeDelta, Utc};
use poise::serenity_prelude::{ChannelId, UserId};
use tokio::task::AbortHandle;
use uuid::Uuid;

/// What `.lockinfo` can observe about a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No record exists for the user.
    NotLocked,
    /// Locked until an explicit `.unlock`.
    Indefinite,
    /// Locked with this many milliseconds left.
    Remaining(u64),
    /// The expiry timestamp has passed but the timer has not fired yet.
    /// Reported as its own state rather than rounded to zero.
    Overdue,
}

impl std::fmt::Display for LockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotLocked => write!(f, "NotLocked"),
            Self::Indefinite => write!(f, "Indefinite"),
            Self::Remaining(ms) => write!(f, "Remaining({ms}ms)"),
            Self::Overdue => write!(f, "Overdue"),
        }
    }
}

/// Record of one confined user.
///
/// Records are replaced wholesale when a user is locked again; `id` is the
/// generation tag the expiry task checks before removing anything, so a timer
/// belonging to a replaced record can never delete its successor.
#[derive(Debug, Clone)]
pub struct LockRecord {
    /// Generation tag for this lock.
    pub id: Uuid,
    /// The confined user.
    pub user_id: UserId,
    /// The prison channel the user is confined to.
    pub channel_id: ChannelId,
    /// When the lock was installed.
    pub locked_at: DateTime<Utc>,
    /// When the lock expires; `None` means indefinite.
    pub expires_at: Option<DateTime<Utc>>,
    /// Handle of the scheduled expiry task, if the lock is timed.
    pub(crate) timer: Option<AbortHandle>,
}

impl LockRecord {
    pub fn new(
        user_id: UserId,
        channel_id: ChannelId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            channel_id,
            locked_at: Utc::now(),
            expires_at,
            timer: None,
        }
    }

    /// Abort the pending expiry task, if any. Harmless on an already
    /// finished task.
    pub fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.abort();
        }
    }

    /// Status of this record as observed at `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> LockStatus {
        match self.expires_at {
            None => LockStatus::Indefinite,
            Some(expires_at) => {
                let remaining = expires_at - now;
                if remaining <= TimeDelta::zero() {
                    LockStatus::Overdue
                } else {
                    LockStatus::Remaining(remaining.num_milliseconds().unsigned_abs())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_indefinite() {
        let record = LockRecord::new(UserId::new(1), ChannelId::new(2), None);
        assert_eq!(record.status_at(Utc::now()), LockStatus::Indefinite);
    }

    #[test]
    fn test_status_remaining() {
        let now = Utc::now();
        let record = LockRecord::new(
            UserId::new(1),
            ChannelId::new(2),
            Some(now + TimeDelta::milliseconds(65_000)),
        );
        assert_eq!(record.status_at(now), LockStatus::Remaining(65_000));
    }

    #[test]
    fn test_status_overdue_when_expiry_passed() {
        let now = Utc::now();
        let record = LockRecord::new(
            UserId::new(1),
            ChannelId::new(2),
            Some(now - TimeDelta::seconds(3)),
        );
        assert_eq!(record.status_at(now), LockStatus::Overdue);

        // The exact expiry instant is already overdue, not Remaining(0).
        let record = LockRecord::new(UserId::new(1), ChannelId::new(2), Some(now));
        assert_eq!(record.status_at(now), LockStatus::Overdue);
    }

    #[test]
    fn test_each_record_gets_a_fresh_generation() {
        let a = LockRecord::new(UserId::new(1), ChannelId::new(2), None);
        let b = LockRecord::new(UserId::new(1), ChannelId::new(2), None);
        assert_ne!(a.id, b.id);
    }
}
