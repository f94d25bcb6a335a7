//! In-process [`LockStore`] for tests and single-process tools.
//!
//! A single mutex guards both tables, so each method is one atomic
//! check-and-mutate, matching the single-statement guarantees of the
//! PostgreSQL store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lockkeeper_core::locking::LockKey;
use lockkeeper_core::mask::{CatalogFilter, Mask};
use lockkeeper_core::types::DbId;
use lockkeeper_db::models::project_lock::{CreateProjectLock, ProjectLock};
use lockkeeper_db::models::revoker_right::{CreateRevokerRight, RevokerRight, RevokerRightKey};
use tokio::sync::Mutex;

use crate::error::LockResult;
use crate::store::LockStore;

#[derive(Debug, Default)]
struct State {
    locks: BTreeMap<LockKey, ProjectLock>,
    rights: BTreeMap<RevokerRightKey, RevokerRight>,
    next_right_id: DbId,
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    state: Arc<Mutex<State>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for MemoryLockStore {
    async fn insert_lock_if_absent(
        &self,
        lock: &CreateProjectLock,
    ) -> LockResult<Option<ProjectLock>> {
        let mut state = self.state.lock().await;
        if state.locks.contains_key(&lock.key) {
            return Ok(None);
        }
        let row = lock.clone().into_row(Utc::now());
        state.locks.insert(lock.key.clone(), row.clone());
        Ok(Some(row))
    }

    async fn delete_lock_if_match(&self, office_id: &str, lock_id: &str) -> LockResult<bool> {
        let mut state = self.state.lock().await;
        let key = state
            .locks
            .iter()
            .find(|(_, l)| l.office_id == office_id && l.lock_id == lock_id)
            .map(|(k, _)| k.clone());
        Ok(match key {
            Some(key) => state.locks.remove(&key).is_some(),
            None => false,
        })
    }

    async fn mark_revocation(
        &self,
        key: &LockKey,
        lock_id: &str,
        requested_by: &str,
    ) -> LockResult<bool> {
        let mut state = self.state.lock().await;
        match state.locks.get_mut(key) {
            Some(lock) if lock.lock_id == lock_id => {
                lock.revoke_requested_by = Some(requested_by.to_string());
                lock.revoke_requested_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_lock_by_key(&self, key: &LockKey) -> LockResult<Option<ProjectLock>> {
        Ok(self.state.lock().await.locks.remove(key))
    }

    async fn find_lock(&self, key: &LockKey) -> LockResult<Option<ProjectLock>> {
        Ok(self.state.lock().await.locks.get(key).cloned())
    }

    async fn find_lock_by_id(
        &self,
        office_id: &str,
        lock_id: &str,
    ) -> LockResult<Option<ProjectLock>> {
        let state = self.state.lock().await;
        Ok(state
            .locks
            .values()
            .find(|l| l.office_id == office_id && l.lock_id == lock_id)
            .cloned())
    }

    async fn lock_exists(&self, key: &LockKey) -> LockResult<bool> {
        Ok(self.state.lock().await.locks.contains_key(key))
    }

    async fn list_locks(&self, filter: &CatalogFilter) -> LockResult<Vec<ProjectLock>> {
        let state = self.state.lock().await;
        Ok(state
            .locks
            .values()
            .filter(|l| filter.matches(&l.office_id, &l.project_id, &l.application_id))
            .cloned()
            .collect())
    }

    async fn upsert_right(&self, right: &CreateRevokerRight) -> LockResult<RevokerRight> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if let Some(existing) = state.rights.get_mut(&right.key) {
            existing.office_mask = right.office_mask.clone();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        state.next_right_id += 1;
        let row = RevokerRight {
            id: state.next_right_id,
            office_id: right.key.office_id.clone(),
            office_mask: right.office_mask.clone(),
            user_id: right.key.user_id.clone(),
            project_mask: right.key.project_mask.clone(),
            application_mask: right.key.application_mask.clone(),
            created_at: now,
            updated_at: now,
        };
        state.rights.insert(right.key.clone(), row.clone());
        Ok(row)
    }

    async fn delete_right(&self, key: &RevokerRightKey) -> LockResult<bool> {
        Ok(self.state.lock().await.rights.remove(key).is_some())
    }

    async fn delete_rights_matching(
        &self,
        office_id: &str,
        office_mask: &Mask,
        application_mask: &Mask,
        user_id: &str,
    ) -> LockResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.rights.len();
        state.rights.retain(|_, r| {
            !(r.office_id == office_id
                && r.user_id == user_id
                && office_mask.matches(&r.office_mask)
                && application_mask.matches(&r.application_mask))
        });
        Ok((before - state.rights.len()) as u64)
    }

    async fn rights_for_user(&self, user_id: &str) -> LockResult<Vec<RevokerRight>> {
        let state = self.state.lock().await;
        Ok(state
            .rights
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_rights(&self, filter: &CatalogFilter) -> LockResult<Vec<RevokerRight>> {
        let state = self.state.lock().await;
        Ok(state
            .rights
            .values()
            .filter(|r| filter.matches(&r.office_id, &r.project_mask, &r.application_mask))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use lockkeeper_core::locking::SessionInfo;

    use super::*;

    fn new_lock(project: &str) -> CreateProjectLock {
        CreateProjectLock::new(
            LockKey::new("SPK", project, "app").unwrap(),
            SessionInfo::default(),
        )
    }

    fn grant(user: &str, project_mask: &str, application_mask: &str) -> CreateRevokerRight {
        let key = RevokerRightKey::new("SPK", user, project_mask, application_mask).unwrap();
        CreateRevokerRight::new(key, "SPK").unwrap()
    }

    #[tokio::test]
    async fn insert_is_exclusive_per_key() {
        let store = MemoryLockStore::new();
        let first = store.insert_lock_if_absent(&new_lock("p")).await.unwrap();
        assert!(first.is_some());
        let second = store.insert_lock_if_absent(&new_lock("p")).await.unwrap();
        assert!(second.is_none());
        let other = store.insert_lock_if_absent(&new_lock("q")).await.unwrap();
        assert!(other.is_some());
    }

    #[tokio::test]
    async fn delete_requires_matching_office_and_id() {
        let store = MemoryLockStore::new();
        let lock = store
            .insert_lock_if_absent(&new_lock("p"))
            .await
            .unwrap()
            .unwrap();

        assert!(!store.delete_lock_if_match("SWT", &lock.lock_id).await.unwrap());
        assert!(store.delete_lock_if_match("SPK", &lock.lock_id).await.unwrap());
        assert!(!store.delete_lock_if_match("SPK", &lock.lock_id).await.unwrap());
    }

    #[tokio::test]
    async fn mark_revocation_only_stamps_current_holder() {
        let store = MemoryLockStore::new();
        let lock = store
            .insert_lock_if_absent(&new_lock("p"))
            .await
            .unwrap()
            .unwrap();
        let key = LockKey::new("SPK", "p", "app").unwrap();

        assert!(!store.mark_revocation(&key, "stale", "admin").await.unwrap());
        assert!(store.mark_revocation(&key, &lock.lock_id, "admin").await.unwrap());

        let stamped = store.find_lock(&key).await.unwrap().unwrap();
        assert_eq!(stamped.pending_revocation().unwrap().requested_by, "admin");
    }

    #[tokio::test]
    async fn list_locks_is_sorted_and_filtered() {
        let store = MemoryLockStore::new();
        for project in ["lockB", "other", "lockA"] {
            store.insert_lock_if_absent(&new_lock(project)).await.unwrap();
        }
        let filter = CatalogFilter::new(Some("lock*"), None, None).unwrap();
        let projects: Vec<String> = store
            .list_locks(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.project_id)
            .collect();
        assert_eq!(projects, vec!["lockA", "lockB"]);
    }

    #[tokio::test]
    async fn upsert_keeps_id_and_refreshes_mask() {
        let store = MemoryLockStore::new();
        let first = store.upsert_right(&grant("u", "p", "a")).await.unwrap();

        let key = RevokerRightKey::new("SPK", "u", "p", "a").unwrap();
        let refreshed = store
            .upsert_right(&CreateRevokerRight::new(key, "S*").unwrap())
            .await
            .unwrap();
        assert_eq!(first.id, refreshed.id);
        assert_eq!(refreshed.office_mask, "S*");
        assert_eq!(store.rights_for_user("u").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_rights_matching_scopes_by_office_and_user() {
        let store = MemoryLockStore::new();
        store.upsert_right(&grant("u", "p1", "app")).await.unwrap();
        store.upsert_right(&grant("u", "p2", "app")).await.unwrap();
        store.upsert_right(&grant("v", "p1", "app")).await.unwrap();

        let removed = store
            .delete_rights_matching("SPK", &Mask::any(), &Mask::new("app").unwrap(), "u")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.rights_for_user("u").await.unwrap().is_empty());
        assert_eq!(store.rights_for_user("v").await.unwrap().len(), 1);
    }
}
