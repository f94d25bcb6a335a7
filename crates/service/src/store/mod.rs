//! The storage seam under the lock manager and the rights registry.
//!
//! Every mutating method is a single atomic step in the backing store:
//! [`LockStore::insert_lock_if_absent`] never reads then writes, and
//! [`LockStore::delete_lock_if_match`] only deletes on an exact `lock_id`.

pub mod memory;
pub mod postgres;

use std::future::Future;

use lockkeeper_core::locking::LockKey;
use lockkeeper_core::mask::{CatalogFilter, Mask};
use lockkeeper_db::models::project_lock::{CreateProjectLock, ProjectLock};
use lockkeeper_db::models::revoker_right::{CreateRevokerRight, RevokerRight, RevokerRightKey};

use crate::error::LockResult;

/// Persistent store holding lock rows and revoker-right rows.
pub trait LockStore: Send + Sync {
    // -- Locks ---------------------------------------------------------------

    /// Insert `lock` unless its key is already held. Returns the new row, or
    /// `None` if another lock holds the key.
    fn insert_lock_if_absent(
        &self,
        lock: &CreateProjectLock,
    ) -> impl Future<Output = LockResult<Option<ProjectLock>>> + Send;

    /// Delete the lock `lock_id` in `office_id`. Returns `true` if it existed.
    fn delete_lock_if_match(
        &self,
        office_id: &str,
        lock_id: &str,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Stamp a revocation request on the lock `lock_id` holding `key`.
    /// Returns `false` if that lock no longer holds the key.
    fn mark_revocation(
        &self,
        key: &LockKey,
        lock_id: &str,
        requested_by: &str,
    ) -> impl Future<Output = LockResult<bool>> + Send;

    /// Delete whichever lock holds `key`, returning it.
    fn delete_lock_by_key(
        &self,
        key: &LockKey,
    ) -> impl Future<Output = LockResult<Option<ProjectLock>>> + Send;

    fn find_lock(
        &self,
        key: &LockKey,
    ) -> impl Future<Output = LockResult<Option<ProjectLock>>> + Send;

    fn find_lock_by_id(
        &self,
        office_id: &str,
        lock_id: &str,
    ) -> impl Future<Output = LockResult<Option<ProjectLock>>> + Send;

    fn lock_exists(&self, key: &LockKey) -> impl Future<Output = LockResult<bool>> + Send;

    /// Locks matching `filter`, ordered by office, project, application.
    fn list_locks(
        &self,
        filter: &CatalogFilter,
    ) -> impl Future<Output = LockResult<Vec<ProjectLock>>> + Send;

    // -- Revoker rights ------------------------------------------------------

    /// Create a grant or refresh the office mask of an existing one.
    fn upsert_right(
        &self,
        right: &CreateRevokerRight,
    ) -> impl Future<Output = LockResult<RevokerRight>> + Send;

    fn delete_right(&self, key: &RevokerRightKey) -> impl Future<Output = LockResult<bool>> + Send;

    /// Delete the grants owned by `office_id` for `user_id` whose stored
    /// office and application masks match the given masks.
    fn delete_rights_matching(
        &self,
        office_id: &str,
        office_mask: &Mask,
        application_mask: &Mask,
        user_id: &str,
    ) -> impl Future<Output = LockResult<u64>> + Send;

    fn rights_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = LockResult<Vec<RevokerRight>>> + Send;

    /// Grants whose owning office and stored masks match `filter`.
    fn list_rights(
        &self,
        filter: &CatalogFilter,
    ) -> impl Future<Output = LockResult<Vec<RevokerRight>>> + Send;
}
