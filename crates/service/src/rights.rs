//! Registry of standing grants that let a user force-revoke locks.
//!
//! A grant is scoped by an owning office, an office mask, a project mask
//! and an application mask. The presence of a matching grant is the only
//! thing that authorizes a revocation; there is no stored "deny".

use lockkeeper_core::error::CoreError;
use lockkeeper_core::locking::{
    normalize_application_id, normalize_office_id, normalize_project_id, normalize_user_id,
};
use lockkeeper_core::mask::{CatalogFilter, Mask};
use lockkeeper_db::models::revoker_right::{CreateRevokerRight, RevokerRight, RevokerRightKey};

use crate::error::LockResult;
use crate::store::LockStore;

/// Grant, remove, check and list lock revoker rights.
pub struct RevokerRightsRegistry;

impl RevokerRightsRegistry {
    /// Grant `user_id` the right to revoke locks in offices matching
    /// `office_mask` whose project and application match the given masks.
    ///
    /// Idempotent: granting an existing combination refreshes its office mask.
    pub async fn allow_lock_revoker_rights<S: LockStore>(
        store: &S,
        office_id: &str,
        office_mask: &str,
        project_mask: &str,
        application_mask: &str,
        user_id: &str,
    ) -> LockResult<RevokerRight> {
        let key = RevokerRightKey::new(office_id, user_id, project_mask, application_mask)?;
        let input = CreateRevokerRight::new(key, office_mask)?;
        let right = store.upsert_right(&input).await?;

        tracing::info!(
            office_id = %right.office_id,
            user_id = %right.user_id,
            office_mask = %right.office_mask,
            project_mask = %right.project_mask,
            application_mask = %right.application_mask,
            "Lock revoker right granted"
        );
        Ok(right)
    }

    /// Ensure the grant exists (`allow = true`) or remove it (`allow = false`).
    pub async fn update_lock_revoker_rights<S: LockStore>(
        store: &S,
        office_id: &str,
        user_id: &str,
        project_mask: &str,
        application_mask: &str,
        office_mask: &str,
        allow: bool,
    ) -> LockResult<()> {
        if allow {
            Self::allow_lock_revoker_rights(
                store,
                office_id,
                office_mask,
                project_mask,
                application_mask,
                user_id,
            )
            .await?;
            return Ok(());
        }

        let key = RevokerRightKey::new(office_id, user_id, project_mask, application_mask)?;
        if store.delete_right(&key).await? {
            tracing::info!(
                office_id = %key.office_id,
                user_id = %key.user_id,
                project_mask = %key.project_mask,
                application_mask = %key.application_mask,
                "Lock revoker right removed"
            );
        } else {
            tracing::debug!(
                office_id = %key.office_id,
                user_id = %key.user_id,
                "No lock revoker right to remove"
            );
        }
        Ok(())
    }

    /// Remove every grant owned by `office_id` for `user_id` whose stored
    /// office and application masks match the given masks (absent = `*`).
    ///
    /// Returns the number of grants removed; zero is not an error.
    pub async fn remove_all_lock_revoker_rights<S: LockStore>(
        store: &S,
        office_id: &str,
        office_mask: Option<&str>,
        application_mask: Option<&str>,
        user_id: &str,
    ) -> LockResult<u64> {
        let office_id = normalize_office_id(office_id)?;
        let user_id = normalize_user_id(user_id)?;
        let office_mask = Mask::optional(office_mask)?;
        let application_mask = Mask::optional(application_mask)?;

        let removed = store
            .delete_rights_matching(&office_id, &office_mask, &application_mask, &user_id)
            .await?;

        tracing::info!(
            office_id = %office_id,
            user_id = %user_id,
            office_mask = %office_mask,
            application_mask = %application_mask,
            removed,
            "Lock revoker rights removed"
        );
        Ok(removed)
    }

    /// Returns `true` if `user_id` may revoke a lock on the concrete key
    /// `(office_id, project_id, application_id)`.
    ///
    /// Anonymous callers are never authorized.
    pub async fn has_lock_revoker_rights<S: LockStore>(
        store: &S,
        office_id: &str,
        user_id: Option<&str>,
        project_id: &str,
        application_id: &str,
    ) -> LockResult<bool> {
        let office_id = normalize_office_id(office_id)?;
        let project_id = normalize_project_id(project_id)?;
        let application_id = normalize_application_id(application_id)?;

        let user_id = match user_id.map(str::trim) {
            Some(user) if !user.is_empty() => normalize_user_id(user)?,
            _ => {
                tracing::debug!(office_id = %office_id, "Anonymous caller has no revoker rights");
                return Ok(false);
            }
        };

        for right in store.rights_for_user(&user_id).await? {
            if right.covers(&office_id, &project_id, &application_id)? {
                tracing::debug!(
                    office_id = %office_id,
                    user_id = %user_id,
                    grant_id = right.id,
                    "Revoker right matched"
                );
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Audit listing of grants matching `filter`.
    pub async fn cat_lock_revoker_rights<S: LockStore>(
        store: &S,
        filter: &CatalogFilter,
    ) -> LockResult<Vec<RevokerRight>> {
        store.list_rights(filter).await
    }
}

/// Build the error returned when an explicit revoke is refused.
pub(crate) fn revoke_denied(user_id: Option<&str>, key: impl ToString) -> CoreError {
    CoreError::RevokeDenied {
        user: user_id.unwrap_or("<anonymous>").to_string(),
        key: key.to_string(),
    }
}
