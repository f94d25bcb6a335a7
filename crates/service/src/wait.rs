//! Bounded, cancellable wait for a lock key to clear.
//!
//! The wait re-reads the store at a fixed interval until the key is
//! observed absent or the deadline passes. It never reports a timeout
//! before the full timeout has elapsed. A timeout too large to express as a
//! deadline waits until the key clears or the wait is cancelled.

use std::time::Duration;

use lockkeeper_core::locking::LockKey;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{LockError, LockResult};
use crate::store::LockStore;

/// How a [`wait_for_release`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The key was observed unlocked.
    Released,
    /// The key was still locked when the deadline passed.
    TimedOut,
}

/// Poll `store` every `poll_interval` until `key` is unlocked or `timeout`
/// has elapsed.
///
/// Returns [`LockError::Cancelled`] promptly if `cancel` fires.
pub async fn wait_for_release<S: LockStore>(
    store: &S,
    key: &LockKey,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> LockResult<WaitOutcome> {
    let deadline = Instant::now().checked_add(timeout);
    if deadline.is_none() {
        tracing::debug!(
            key = %key,
            timeout_secs = timeout.as_secs(),
            "Timeout out of range, waiting without deadline"
        );
    }
    let mut polls: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }

        polls += 1;
        if !store.lock_exists(key).await? {
            tracing::debug!(key = %key, polls, "Lock cleared");
            return Ok(WaitOutcome::Released);
        }

        let nap = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    tracing::debug!(key = %key, polls, "Lock still held at deadline");
                    return Ok(WaitOutcome::TimedOut);
                }
                poll_interval.min(deadline - now)
            }
            None => poll_interval,
        };
        tracing::debug!(key = %key, polls, nap_ms = nap.as_millis() as u64, "Waiting for lock to clear");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(key = %key, polls, "Wait cancelled");
                return Err(LockError::Cancelled);
            }
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use lockkeeper_core::locking::SessionInfo;
    use lockkeeper_db::models::project_lock::CreateProjectLock;

    use super::*;
    use crate::store::memory::MemoryLockStore;

    fn key() -> LockKey {
        LockKey::new("SPK", "waitTest", "app").unwrap()
    }

    async fn locked_store() -> (MemoryLockStore, String) {
        let store = MemoryLockStore::new();
        let lock = store
            .insert_lock_if_absent(&CreateProjectLock::new(key(), SessionInfo::default()))
            .await
            .unwrap()
            .unwrap();
        (store, lock.lock_id)
    }

    #[tokio::test]
    async fn returns_released_immediately_when_unlocked() {
        let store = MemoryLockStore::new();
        let outcome = wait_for_release(
            &store,
            &key(),
            Duration::from_secs(5),
            Duration::from_millis(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Released);
    }

    #[tokio::test]
    async fn zero_timeout_checks_once() {
        let (store, _) = locked_store().await;
        let start = std::time::Instant::now();
        let outcome = wait_for_release(
            &store,
            &key(),
            Duration::ZERO,
            Duration::from_millis(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn times_out_no_earlier_than_deadline() {
        let (store, _) = locked_store().await;
        let timeout = Duration::from_millis(200);
        let start = std::time::Instant::now();
        let outcome = wait_for_release(
            &store,
            &key(),
            timeout,
            Duration::from_millis(30),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= timeout);
    }

    #[tokio::test]
    async fn observes_release_by_another_task() {
        let (store, lock_id) = locked_store().await;
        let holder = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            holder.delete_lock_if_match("SPK", &lock_id).await.unwrap();
        });

        let outcome = wait_for_release(
            &store,
            &key(),
            Duration::from_secs(5),
            Duration::from_millis(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Released);
    }

    #[tokio::test]
    async fn unrepresentable_deadline_waits_for_release() {
        let (store, lock_id) = locked_store().await;
        let holder = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            holder.delete_lock_if_match("SPK", &lock_id).await.unwrap();
        });

        let outcome = wait_for_release(
            &store,
            &key(),
            Duration::MAX,
            Duration::from_millis(10),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, WaitOutcome::Released);
    }

    #[tokio::test]
    async fn cancellation_stops_the_wait() {
        let (store, _) = locked_store().await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let start = std::time::Instant::now();
        let result = wait_for_release(
            &store,
            &key(),
            Duration::from_secs(30),
            Duration::from_millis(1000),
            &cancel,
        )
        .await;
        assert_matches!(result, Err(LockError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
