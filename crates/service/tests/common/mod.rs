#![allow(dead_code)]

use std::time::Duration;

use lockkeeper_core::locking::{LockKey, LockRequest, SessionInfo};
use lockkeeper_service::{LockConfig, LockManager, MemoryLockStore, RevokerRightsRegistry};

/// Office used throughout the scenarios.
pub const OFFICE: &str = "SPK";

/// A user with no grants.
pub const NOBODY: &str = "nobody";

/// A user granted revoker rights by [`grant_admin`].
pub const ADMIN: &str = "q0hecxyz";

/// Manager with a fast poll interval so revocation tests stay quick.
pub fn fast_manager() -> LockManager {
    LockManager::new(LockConfig::new(20, 10))
}

pub fn key(project: &str, application: &str) -> LockKey {
    LockKey::new(OFFICE, project, application).unwrap()
}

pub fn request(project: &str, application: &str) -> LockRequest {
    LockRequest::new(key(project, application)).with_session(SessionInfo {
        session_user: Some("holder".to_string()),
        os_user: Some("hec".to_string()),
        session_program: Some("lockkeeper-tests".to_string()),
        session_machine: Some("localhost".to_string()),
    })
}

/// Grant [`ADMIN`] revoker rights over every project and application in
/// [`OFFICE`].
pub async fn grant_admin(store: &MemoryLockStore) {
    RevokerRightsRegistry::allow_lock_revoker_rights(store, OFFICE, OFFICE, "*", "*", ADMIN)
        .await
        .unwrap();
}

/// Lower bound used when asserting on elapsed wall-clock time.
pub fn at_least(secs: i64) -> Duration {
    Duration::from_secs(secs as u64)
}
