//! Project lock acquisition, release, revocation and listing.
//!
//! Locks are exclusive per `(office, project, application)` key. A
//! request that finds the key held can ask for the holder's lock to be
//! revoked: the manager checks the caller's revoker rights, stamps a
//! revocation request on the holder's row, then waits (bounded, cancellable)
//! for the holder to release before retrying the insert once.
//!
//! The old lock is gone before the new one is inserted, so a third session
//! can claim the key in between. The single retry then reports
//! [`AcquireOutcome::LockHeld`].

use chrono::{DateTime, FixedOffset, TimeZone};
use lockkeeper_core::error::CoreError;
use lockkeeper_core::locking::{
    normalize_office_id, normalize_user_id, validate_revoke_timeout, AcquireOutcome, LockKey,
    LockRequest, RevocationRequest,
};
use lockkeeper_core::mask::CatalogFilter;
use lockkeeper_core::types::LockId;
use lockkeeper_db::models::project_lock::{CreateProjectLock, ProjectLock};
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::LockConfig;
use crate::error::LockResult;
use crate::rights::{revoke_denied, RevokerRightsRegistry};
use crate::store::LockStore;
use crate::wait::{wait_for_release, WaitOutcome};

/// A lock as reported by [`LockManager::cat_locks`], with `acquire_time`
/// rendered in the caller's time zone. The offset is the one in force at
/// that instant, so rows either side of a daylight-saving change differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockListing {
    pub lock_id: LockId,
    pub office_id: String,
    pub project_id: String,
    pub application_id: String,
    pub acquire_time: DateTime<FixedOffset>,
    pub session_user: Option<String>,
    pub os_user: Option<String>,
    pub session_program: Option<String>,
    pub session_machine: Option<String>,
    pub revoke_requested_by: Option<String>,
}

impl LockListing {
    pub fn from_lock<Tz: TimeZone>(lock: ProjectLock, time_zone: &Tz) -> Self {
        Self {
            acquire_time: lock.acquire_time.with_timezone(time_zone).fixed_offset(),
            lock_id: lock.lock_id,
            office_id: lock.office_id,
            project_id: lock.project_id,
            application_id: lock.application_id,
            session_user: lock.session_user,
            os_user: lock.os_user,
            session_program: lock.session_program,
            session_machine: lock.session_machine,
            revoke_requested_by: lock.revoke_requested_by,
        }
    }
}

/// Stateless lock operations over any [`LockStore`].
///
/// The manager holds only configuration. Every decision re-reads the store.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Try to acquire the lock described by `request` on behalf of
    /// `caller_user_id`. See [`LockManager::request_lock_cancellable`].
    pub async fn request_lock<S: LockStore>(
        &self,
        store: &S,
        request: &LockRequest,
        caller_user_id: Option<&str>,
    ) -> LockResult<AcquireOutcome> {
        self.request_lock_cancellable(store, request, caller_user_id, &CancellationToken::new())
            .await
    }

    /// Try to acquire a lock, revoking the current holder if requested and
    /// authorized.
    ///
    /// Cancelling `cancel` while waiting on a revocation returns
    /// [`LockError::Cancelled`](crate::error::LockError::Cancelled). A
    /// revocation request already stamped on the holder is left in place.
    pub async fn request_lock_cancellable<S: LockStore>(
        &self,
        store: &S,
        request: &LockRequest,
        caller_user_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> LockResult<AcquireOutcome> {
        let timeout = validate_revoke_timeout(request.revoke_timeout_secs)?;
        let key = &request.key;
        let create = CreateProjectLock::new(key.clone(), request.session.clone());

        if let Some(lock) = store.insert_lock_if_absent(&create).await? {
            tracing::info!(key = %key, lock_id = %lock.lock_id, "Lock acquired");
            return Ok(AcquireOutcome::Acquired {
                lock_id: lock.lock_id,
            });
        }

        if !request.revoke_existing {
            tracing::debug!(key = %key, "Lock already held");
            return Self::lock_held(store, key).await;
        }

        let authorized = RevokerRightsRegistry::has_lock_revoker_rights(
            store,
            key.office_id(),
            caller_user_id,
            key.project_id(),
            key.application_id(),
        )
        .await?;
        if !authorized {
            tracing::warn!(key = %key, user_id = ?caller_user_id, "Lock revocation denied");
            return Ok(AcquireOutcome::RevokeDenied);
        }

        // Authorization only passes for a non-blank caller.
        let requested_by = normalize_user_id(caller_user_id.unwrap_or_default())?;
        if let Some(holder) = store.find_lock(key).await? {
            let stamped = store
                .mark_revocation(key, &holder.lock_id, &requested_by)
                .await?;
            tracing::info!(
                key = %key,
                lock_id = %holder.lock_id,
                requested_by = %requested_by,
                stamped,
                timeout_secs = timeout.as_secs(),
                "Lock revocation requested"
            );
        }

        let started = Instant::now();
        let waited = wait_for_release(store, key, timeout, self.config.poll_interval, cancel).await?;
        let waited_ms = started.elapsed().as_millis() as u64;

        match waited {
            WaitOutcome::TimedOut => {
                tracing::warn!(key = %key, waited_ms, "Lock revocation timed out");
                Ok(AcquireOutcome::RevokeTimedOut { waited_ms })
            }
            WaitOutcome::Released => match store.insert_lock_if_absent(&create).await? {
                Some(lock) => {
                    tracing::info!(
                        key = %key,
                        lock_id = %lock.lock_id,
                        waited_ms,
                        "Lock acquired after revocation"
                    );
                    Ok(AcquireOutcome::Acquired {
                        lock_id: lock.lock_id,
                    })
                }
                None => {
                    tracing::warn!(key = %key, "Lock claimed by another session after revocation");
                    Self::lock_held(store, key).await
                }
            },
        }
    }

    async fn lock_held<S: LockStore>(store: &S, key: &LockKey) -> LockResult<AcquireOutcome> {
        let holder = store.find_lock(key).await?;
        Ok(AcquireOutcome::LockHeld {
            held_by: holder.as_ref().and_then(|l| l.session_user.clone()),
            acquired_at: holder.map(|l| l.acquire_time),
        })
    }

    /// Release the lock `lock_id` in `office_id`.
    ///
    /// Returns `false` (not an error) if no such lock exists, so repeated
    /// releases are harmless.
    pub async fn release_lock<S: LockStore>(
        &self,
        store: &S,
        office_id: &str,
        lock_id: &str,
    ) -> LockResult<bool> {
        let office_id = normalize_office_id(office_id)?;
        let lock_id = lock_id.trim();
        if lock_id.is_empty() {
            return Err(CoreError::InvalidArgument("lock_id must not be empty".into()).into());
        }

        let released = store.delete_lock_if_match(&office_id, lock_id).await?;
        if released {
            tracing::info!(office_id = %office_id, lock_id, "Lock released");
        } else {
            tracing::debug!(office_id = %office_id, lock_id, "No lock to release");
        }
        Ok(released)
    }

    /// Forcibly remove whatever lock holds `key`.
    ///
    /// Fails with [`CoreError::RevokeDenied`] unless the caller holds a
    /// covering revoker right. Returns `false` if the key was not locked.
    pub async fn revoke_lock<S: LockStore>(
        &self,
        store: &S,
        key: &LockKey,
        caller_user_id: Option<&str>,
    ) -> LockResult<bool> {
        let authorized = RevokerRightsRegistry::has_lock_revoker_rights(
            store,
            key.office_id(),
            caller_user_id,
            key.project_id(),
            key.application_id(),
        )
        .await?;
        if !authorized {
            tracing::warn!(key = %key, user_id = ?caller_user_id, "Lock revocation denied");
            return Err(revoke_denied(caller_user_id, key).into());
        }

        match store.delete_lock_by_key(key).await? {
            Some(lock) => {
                tracing::info!(
                    key = %key,
                    lock_id = %lock.lock_id,
                    revoked_by = ?caller_user_id,
                    "Lock revoked"
                );
                Ok(true)
            }
            None => {
                tracing::debug!(key = %key, "No lock to revoke");
                Ok(false)
            }
        }
    }

    /// Whether `key` is locked right now.
    pub async fn is_locked<S: LockStore>(&self, store: &S, key: &LockKey) -> LockResult<bool> {
        store.lock_exists(key).await
    }

    /// Snapshot of the locks matching `filter`, ordered by office, project
    /// and application, with times rendered in `time_zone` (a named zone
    /// such as `chrono_tz::Tz`, a `FixedOffset` or `Utc`).
    pub async fn cat_locks<S: LockStore, Tz: TimeZone>(
        &self,
        store: &S,
        filter: &CatalogFilter,
        time_zone: &Tz,
    ) -> LockResult<Vec<LockListing>> {
        let locks = store.list_locks(filter).await?;
        Ok(locks
            .into_iter()
            .map(|l| LockListing::from_lock(l, time_zone))
            .collect())
    }

    /// The lock `lock_id` in `office_id`, if it is still held.
    pub async fn get_lock<S: LockStore>(
        &self,
        store: &S,
        office_id: &str,
        lock_id: &str,
    ) -> LockResult<Option<ProjectLock>> {
        let office_id = normalize_office_id(office_id)?;
        store.find_lock_by_id(&office_id, lock_id.trim()).await
    }

    /// The revocation request stamped on lock `lock_id`, if any. `None` also
    /// covers a lock that no longer exists; use [`LockManager::get_lock`] to
    /// tell the two apart.
    pub async fn pending_revocation<S: LockStore>(
        &self,
        store: &S,
        office_id: &str,
        lock_id: &str,
    ) -> LockResult<Option<RevocationRequest>> {
        Ok(self
            .get_lock(store, office_id, lock_id)
            .await?
            .and_then(|l| l.pending_revocation()))
    }
}
