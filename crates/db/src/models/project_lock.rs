//! Project lock model and insert DTO.

use lockkeeper_core::locking::{new_lock_id, LockKey, RevocationRequest, SessionInfo};
use lockkeeper_core::types::{LockId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `project_locks` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ProjectLock {
    pub lock_id: LockId,
    pub office_id: String,
    pub project_id: String,
    pub application_id: String,
    pub acquire_time: Timestamp,
    #[sqlx(rename = "session_user_name")]
    pub session_user: Option<String>,
    pub os_user: Option<String>,
    pub session_program: Option<String>,
    pub session_machine: Option<String>,
    pub revoke_requested_by: Option<String>,
    pub revoke_requested_at: Option<Timestamp>,
}

impl ProjectLock {
    /// Returns `true` if this row holds `key`.
    pub fn is_for(&self, key: &LockKey) -> bool {
        self.office_id == key.office_id()
            && self.project_id == key.project_id()
            && self.application_id == key.application_id()
    }

    /// The revocation request stamped on this lock, if any.
    pub fn pending_revocation(&self) -> Option<RevocationRequest> {
        match (&self.revoke_requested_by, self.revoke_requested_at) {
            (Some(by), Some(at)) => Some(RevocationRequest {
                requested_by: by.clone(),
                requested_at: at,
            }),
            _ => None,
        }
    }
}

/// DTO for inserting a new lock. The lock id is generated here so the
/// caller knows it before the insert lands.
#[derive(Debug, Clone)]
pub struct CreateProjectLock {
    pub lock_id: LockId,
    pub key: LockKey,
    pub session: SessionInfo,
}

impl CreateProjectLock {
    pub fn new(key: LockKey, session: SessionInfo) -> Self {
        Self {
            lock_id: new_lock_id(),
            key,
            session,
        }
    }

    /// Materialise the row this DTO would insert, stamped `acquire_time`.
    pub fn into_row(self, acquire_time: Timestamp) -> ProjectLock {
        ProjectLock {
            lock_id: self.lock_id,
            office_id: self.key.office_id().to_string(),
            project_id: self.key.project_id().to_string(),
            application_id: self.key.application_id().to_string(),
            acquire_time,
            session_user: self.session.session_user,
            os_user: self.session.os_user,
            session_program: self.session.session_program,
            session_machine: self.session.session_machine,
            revoke_requested_by: None,
            revoke_requested_at: None,
        }
    }
}
