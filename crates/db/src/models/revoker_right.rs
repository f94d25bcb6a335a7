//! Lock revoker right model and DTOs.

use lockkeeper_core::error::CoreError;
use lockkeeper_core::locking::{normalize_office_id, normalize_user_id};
use lockkeeper_core::mask::Mask;
use lockkeeper_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `lock_revoker_rights` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct RevokerRight {
    pub id: DbId,
    /// Office that owns the grant. A grant never covers another office's locks.
    pub office_id: String,
    /// Further restricts the owning office; a mask that does not match it
    /// leaves the grant covering nothing.
    pub office_mask: String,
    pub user_id: String,
    pub project_mask: String,
    pub application_mask: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl RevokerRight {
    /// Returns `true` if this grant covers a lock on the given concrete key.
    ///
    /// The lock's office must be the owning office exactly; the masks then
    /// scope office, project and application.
    pub fn covers(
        &self,
        office_id: &str,
        project_id: &str,
        application_id: &str,
    ) -> Result<bool, CoreError> {
        Ok(self.office_id.eq_ignore_ascii_case(office_id)
            && Mask::new(&self.office_mask)?.matches(office_id)
            && Mask::new(&self.project_mask)?.matches(project_id)
            && Mask::new(&self.application_mask)?.matches(application_id))
    }
}

/// Unique key of a grant: `(office_id, user_id, project_mask, application_mask)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RevokerRightKey {
    pub office_id: String,
    pub user_id: String,
    pub project_mask: String,
    pub application_mask: String,
}

impl RevokerRightKey {
    /// Normalise raw inputs: office upper-cased, application mask
    /// lower-cased, blank masks stored as `*`.
    pub fn new(
        office_id: &str,
        user_id: &str,
        project_mask: &str,
        application_mask: &str,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            office_id: normalize_office_id(office_id)?,
            user_id: normalize_user_id(user_id)?,
            project_mask: Mask::new(project_mask)?.as_str().to_string(),
            application_mask: Mask::new(application_mask)?.as_str().to_lowercase(),
        })
    }
}

/// DTO for creating (or refreshing) a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRevokerRight {
    pub key: RevokerRightKey,
    pub office_mask: String,
}

impl CreateRevokerRight {
    pub fn new(key: RevokerRightKey, office_mask: &str) -> Result<Self, CoreError> {
        Ok(Self {
            key,
            office_mask: Mask::new(office_mask)?.as_str().to_uppercase(),
        })
    }
}
