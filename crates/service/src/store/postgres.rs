//! [`LockStore`] over PostgreSQL, delegating to the `lockkeeper_db`
//! repositories.

use lockkeeper_core::locking::LockKey;
use lockkeeper_core::mask::{CatalogFilter, Mask};
use lockkeeper_db::models::project_lock::{CreateProjectLock, ProjectLock};
use lockkeeper_db::models::revoker_right::{CreateRevokerRight, RevokerRight, RevokerRightKey};
use lockkeeper_db::repositories::{ProjectLockRepo, RevokerRightsRepo};
use lockkeeper_db::DbPool;

use crate::error::LockResult;
use crate::store::LockStore;

/// PostgreSQL-backed store. Cheap to clone (the pool is reference counted).
#[derive(Debug, Clone)]
pub struct PgLockStore {
    pool: DbPool,
}

impl PgLockStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl LockStore for PgLockStore {
    async fn insert_lock_if_absent(
        &self,
        lock: &CreateProjectLock,
    ) -> LockResult<Option<ProjectLock>> {
        Ok(ProjectLockRepo::acquire(&self.pool, lock).await?)
    }

    async fn delete_lock_if_match(&self, office_id: &str, lock_id: &str) -> LockResult<bool> {
        Ok(ProjectLockRepo::release(&self.pool, office_id, lock_id).await?)
    }

    async fn mark_revocation(
        &self,
        key: &LockKey,
        lock_id: &str,
        requested_by: &str,
    ) -> LockResult<bool> {
        Ok(ProjectLockRepo::request_revocation(&self.pool, key, lock_id, requested_by).await?)
    }

    async fn delete_lock_by_key(&self, key: &LockKey) -> LockResult<Option<ProjectLock>> {
        Ok(ProjectLockRepo::revoke(&self.pool, key).await?)
    }

    async fn find_lock(&self, key: &LockKey) -> LockResult<Option<ProjectLock>> {
        Ok(ProjectLockRepo::find_by_key(&self.pool, key).await?)
    }

    async fn find_lock_by_id(
        &self,
        office_id: &str,
        lock_id: &str,
    ) -> LockResult<Option<ProjectLock>> {
        Ok(ProjectLockRepo::find_by_id(&self.pool, office_id, lock_id).await?)
    }

    async fn lock_exists(&self, key: &LockKey) -> LockResult<bool> {
        Ok(ProjectLockRepo::exists(&self.pool, key).await?)
    }

    async fn list_locks(&self, filter: &CatalogFilter) -> LockResult<Vec<ProjectLock>> {
        Ok(ProjectLockRepo::list(&self.pool, filter).await?)
    }

    async fn upsert_right(&self, right: &CreateRevokerRight) -> LockResult<RevokerRight> {
        Ok(RevokerRightsRepo::upsert(&self.pool, right).await?)
    }

    async fn delete_right(&self, key: &RevokerRightKey) -> LockResult<bool> {
        Ok(RevokerRightsRepo::delete(&self.pool, key).await?)
    }

    async fn delete_rights_matching(
        &self,
        office_id: &str,
        office_mask: &Mask,
        application_mask: &Mask,
        user_id: &str,
    ) -> LockResult<u64> {
        Ok(RevokerRightsRepo::delete_matching(
            &self.pool,
            office_id,
            office_mask,
            application_mask,
            user_id,
        )
        .await?)
    }

    async fn rights_for_user(&self, user_id: &str) -> LockResult<Vec<RevokerRight>> {
        Ok(RevokerRightsRepo::list_for_user(&self.pool, user_id).await?)
    }

    async fn list_rights(&self, filter: &CatalogFilter) -> LockResult<Vec<RevokerRight>> {
        Ok(RevokerRightsRepo::list(&self.pool, filter).await?)
    }
}
