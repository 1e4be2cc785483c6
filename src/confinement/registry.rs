//! In-memory registry of confined users.
//!
//! The registry owns the expiry timers: a timed lock spawns a tokio task that
//! sleeps for the duration and then removes the record, guarded by the
//! record's generation id so a timer left over from a replaced lock cannot
//! delete the lock that replaced it.

use crate::confinement::{LockRecord, LockStatus};
use chrono::{TimeDelta, Utc};
use dashmap::DashMap;
use poise::serenity_prelude::{ChannelId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Registry of lock records, one per confined user.
///
/// Cloning is cheap and all clones share the same map. A user id is present
/// iff that user is currently confined; the registry starts empty and is
/// never persisted.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    records: Arc<DashMap<UserId, LockRecord>>,
}

impl LockRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
        }
    }

    /// Confine a user to `channel_id`, replacing any existing lock wholesale.
    ///
    /// The previous record's timer is cancelled before the new record takes
    /// its place; there is never more than one live timer per user. A `None`
    /// duration locks indefinitely.
    pub fn lock(
        &self,
        user_id: UserId,
        channel_id: ChannelId,
        duration: Option<Duration>,
    ) -> LockRecord {
        let expires_at = duration.and_then(|d| {
            TimeDelta::from_std(d)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta))
        });
        let record = LockRecord::new(user_id, channel_id, expires_at);
        let generation = record.id;

        if let Some(previous) = self.records.insert(user_id, record.clone()) {
            previous.cancel_timer();
        }

        // The record must be in the map before the timer is armed: a
        // zero-length sleep can fire expire() on another worker ahead of a
        // later insert, and the record would then never be reaped.
        if let Some(duration) = duration {
            let registry = self.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                registry.expire(user_id, generation);
            });
            let abort = handle.abort_handle();
            match self.records.get_mut(&user_id) {
                // Still our record: attach the handle so unlock/relock can
                // cancel the timer.
                Some(mut entry) if entry.id == generation => entry.timer = Some(abort),
                // Replaced or already expired in the meantime; the timer must
                // not outlive its record.
                _ => abort.abort(),
            }
        }

        info!(
            user_id = %user_id,
            channel_id = %channel_id,
            expires_at = ?record.expires_at,
            "user locked"
        );
        record
    }

    /// Release a user. Returns whether a lock existed, so callers can pick
    /// the reply wording.
    pub fn unlock(&self, user_id: UserId) -> bool {
        match self.records.remove(&user_id) {
            Some((_, record)) => {
                record.cancel_timer();
                info!(user_id = %user_id, "user unlocked");
                true
            }
            None => false,
        }
    }

    /// Release every confined user and return how many were released.
    /// Safe on an empty registry.
    pub fn unlock_all(&self) -> usize {
        let mut released = 0;
        self.records.retain(|_, record| {
            record.cancel_timer();
            released += 1;
            false
        });
        if released > 0 {
            info!(released, "all users unlocked");
        }
        released
    }

    /// Observable status of a user. Pure read; an expired-but-unreaped
    /// record reports [`LockStatus::Overdue`].
    #[must_use]
    pub fn status(&self, user_id: UserId) -> LockStatus {
        self.records
            .get(&user_id)
            .map_or(LockStatus::NotLocked, |record| record.status_at(Utc::now()))
    }

    /// Snapshot of a user's lock record, if any.
    #[must_use]
    pub fn get(&self, user_id: UserId) -> Option<LockRecord> {
        self.records.get(&user_id).map(|entry| entry.value().clone())
    }

    /// Whether the user is currently confined.
    #[must_use]
    pub fn is_locked(&self, user_id: UserId) -> bool {
        self.records.contains_key(&user_id)
    }

    /// Number of confined users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timer callback: remove the record for `user_id` only if it is still
    /// the generation the timer was armed for.
    fn expire(&self, user_id: UserId, generation: Uuid) {
        if self
            .records
            .remove_if(&user_id, |_, record| record.id == generation)
            .is_some()
        {
            info!(user_id = %user_id, "lock expired, user released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId::new(100);
    const PRISON: ChannelId = ChannelId::new(200);
    const OTHER_PRISON: ChannelId = ChannelId::new(201);

    #[tokio::test]
    async fn test_status_is_not_locked_iff_absent() {
        let registry = LockRegistry::new();
        assert_eq!(registry.status(USER), LockStatus::NotLocked);
        assert!(!registry.is_locked(USER));

        registry.lock(USER, PRISON, None);
        assert!(registry.is_locked(USER));
        assert_ne!(registry.status(USER), LockStatus::NotLocked);

        registry.unlock(USER);
        assert!(!registry.is_locked(USER));
        assert_eq!(registry.status(USER), LockStatus::NotLocked);
    }

    #[tokio::test]
    async fn test_indefinite_lock_reports_indefinite() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);
        assert_eq!(registry.status(USER), LockStatus::Indefinite);
    }

    #[tokio::test]
    async fn test_timed_lock_reports_remaining() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, Some(Duration::from_secs(60)));
        match registry.status(USER) {
            LockStatus::Remaining(ms) => assert!(ms <= 60_000 && ms > 55_000),
            other => panic!("expected Remaining, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_unlock_reports_whether_a_lock_existed() {
        let registry = LockRegistry::new();
        assert!(!registry.unlock(USER));
        registry.lock(USER, PRISON, None);
        assert!(registry.unlock(USER));
        assert!(!registry.unlock(USER));
    }

    #[tokio::test]
    async fn test_unlock_all_on_empty_registry_returns_zero() {
        let registry = LockRegistry::new();
        assert_eq!(registry.unlock_all(), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unlock_all_releases_everyone() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, None);
        registry.lock(UserId::new(101), PRISON, Some(Duration::from_secs(30)));
        assert_eq!(registry.unlock_all(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.status(USER), LockStatus::NotLocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_lock_expires_without_an_unlock() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, Some(Duration::from_secs(5)));
        assert!(registry.is_locked(USER));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!registry.is_locked(USER));
        assert_eq!(registry.status(USER), LockStatus::NotLocked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_lock_is_reaped() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, Some(Duration::ZERO));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(registry.status(USER), LockStatus::NotLocked);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_zero_duration_lock_never_sticks_under_concurrency() {
        // The expiry task may start on another worker the instant it is
        // spawned; the record has to be visible to it by then, or it is
        // never reaped.
        let registry = LockRegistry::new();
        for i in 0..50u64 {
            let user = UserId::new(1000 + i);
            registry.lock(user, PRISON, Some(Duration::ZERO));
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(
                registry.status(user),
                LockStatus::NotLocked,
                "expired lock was never reaped (iteration {i})"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_replaces_record_and_old_timer_is_dead() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, Some(Duration::from_millis(100)));
        let replacement = registry.lock(USER, OTHER_PRISON, Some(Duration::from_secs(60)));

        // Well past the first lock's expiry; the replacement must survive.
        tokio::time::sleep(Duration::from_secs(2)).await;
        let record = registry.get(USER).expect("replacement lock still present");
        assert_eq!(record.id, replacement.id);
        assert_eq!(record.channel_id, OTHER_PRISON);

        // And the replacement still expires on its own schedule.
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(!registry.is_locked(USER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_relock_to_indefinite_cancels_the_old_timer() {
        let registry = LockRegistry::new();
        registry.lock(USER, PRISON, Some(Duration::from_millis(50)));
        registry.lock(USER, PRISON, None);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(registry.status(USER), LockStatus::Indefinite);
    }

    #[tokio::test]
    async fn test_expired_but_unreaped_record_reads_as_overdue() {
        let registry = LockRegistry::new();
        // Plant a record whose expiry already passed and whose timer never
        // fires, the race status() has to report distinctly.
        let record = LockRecord::new(
            USER,
            PRISON,
            Some(Utc::now() - TimeDelta::seconds(1)),
        );
        registry.records.insert(USER, record);
        assert_eq!(registry.status(USER), LockStatus::Overdue);
    }

    #[tokio::test]
    async fn test_stale_generation_expiry_is_a_noop() {
        let registry = LockRegistry::new();
        let first = registry.lock(USER, PRISON, None);
        let second = registry.lock(USER, OTHER_PRISON, None);

        // Firing the first lock's timer callback by hand must not touch the
        // second lock.
        registry.expire(USER, first.id);
        let record = registry.get(USER).expect("second lock still present");
        assert_eq!(record.id, second.id);

        registry.expire(USER, second.id);
        assert!(!registry.is_locked(USER));
    }
}
