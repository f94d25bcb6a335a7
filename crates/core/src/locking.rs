//! Project lock constants, identifiers, and validation.
//!
//! This module lives in `core` (no I/O) so that the repository layer, the
//! lock manager, and the operator CLI all agree on identifier
//! normalisation, timeouts, and the shape of acquisition outcomes.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::mask::contains_wildcard;
use crate::types::{LockId, Timestamp};

// ---------------------------------------------------------------------------
// Revocation timing
// ---------------------------------------------------------------------------

/// Seconds to wait for a revoked lock to clear when the caller gives none.
pub const DEFAULT_REVOKE_TIMEOUT_SECS: i64 = 10;

/// Default interval between store checks while waiting on a revocation.
pub const DEFAULT_REVOKE_POLL_INTERVAL_MS: u64 = 250;

/// Lower bound for the revocation poll interval.
pub const MIN_REVOKE_POLL_INTERVAL_MS: u64 = 10;

/// Upper bound for the revocation poll interval (polling stays sub-second).
pub const MAX_REVOKE_POLL_INTERVAL_MS: u64 = 1000;

// ---------------------------------------------------------------------------
// Identifier limits
// ---------------------------------------------------------------------------

/// Length of a lock id (a simple-format UUID).
pub const LOCK_ID_LEN: usize = 32;

pub const MAX_OFFICE_ID_LEN: usize = 16;
pub const MAX_PROJECT_ID_LEN: usize = 57;
pub const MAX_APPLICATION_ID_LEN: usize = 64;
pub const MAX_USER_ID_LEN: usize = 128;

/// Generate a fresh lock id: 32 lowercase hex characters.
pub fn new_lock_id() -> LockId {
    Uuid::new_v4().simple().to_string()
}

/// Returns `true` if `lock_id` has the shape produced by [`new_lock_id`].
pub fn is_valid_lock_id(lock_id: &str) -> bool {
    lock_id.len() == LOCK_ID_LEN
        && lock_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Trim and check a concrete identifier: non-empty, no wildcards, bounded.
fn validate_identifier(field: &str, value: &str, max_len: usize) -> Result<String, CoreError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CoreError::InvalidArgument(format!(
            "{field} must not be empty"
        )));
    }
    if contains_wildcard(value) {
        return Err(CoreError::InvalidArgument(format!(
            "{field} must not contain wildcards, got '{value}'"
        )));
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(CoreError::InvalidArgument(format!(
            "{field} must be at most {max_len} characters, got {len}"
        )));
    }
    Ok(value.to_string())
}

/// Offices are upper-cased (`spk` and `SPK` are the same office).
pub fn normalize_office_id(office_id: &str) -> Result<String, CoreError> {
    validate_identifier("office_id", office_id, MAX_OFFICE_ID_LEN).map(|s| s.to_uppercase())
}

/// Project ids keep their case.
pub fn normalize_project_id(project_id: &str) -> Result<String, CoreError> {
    validate_identifier("project_id", project_id, MAX_PROJECT_ID_LEN)
}

/// Application ids are lower-cased.
pub fn normalize_application_id(application_id: &str) -> Result<String, CoreError> {
    validate_identifier("application_id", application_id, MAX_APPLICATION_ID_LEN)
        .map(|s| s.to_lowercase())
}

/// User ids keep their case.
pub fn normalize_user_id(user_id: &str) -> Result<String, CoreError> {
    validate_identifier("user_id", user_id, MAX_USER_ID_LEN)
}

/// Validate a caller-supplied revoke timeout in seconds.
pub fn validate_revoke_timeout(secs: i64) -> Result<Duration, CoreError> {
    u64::try_from(secs).map(Duration::from_secs).map_err(|_| {
        CoreError::InvalidArgument(format!(
            "revoke_timeout_secs must be >= 0, got {secs}"
        ))
    })
}

/// Clamp a poll interval into the supported sub-second range.
pub fn clamp_poll_interval_ms(ms: u64) -> u64 {
    ms.clamp(MIN_REVOKE_POLL_INTERVAL_MS, MAX_REVOKE_POLL_INTERVAL_MS)
}

// ---------------------------------------------------------------------------
// LockKey
// ---------------------------------------------------------------------------

/// The `(office, project, application)` tuple a lock is held on.
///
/// Construction normalises and validates every component, so a `LockKey`
/// is always safe to bind into a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LockKey {
    office_id: String,
    project_id: String,
    application_id: String,
}

impl LockKey {
    pub fn new(
        office_id: &str,
        project_id: &str,
        application_id: &str,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            office_id: normalize_office_id(office_id)?,
            project_id: normalize_project_id(project_id)?,
            application_id: normalize_application_id(application_id)?,
        })
    }

    pub fn office_id(&self) -> &str {
        &self.office_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.office_id, self.project_id, self.application_id
        )
    }
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// Diagnostic metadata recorded on a lock row. None of it affects locking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_user: Option<String>,
    pub os_user: Option<String>,
    pub session_program: Option<String>,
    pub session_machine: Option<String>,
}

/// Everything `request_lock` needs besides the caller identity.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub key: LockKey,
    /// Ask the current holder to give the lock up if it is taken.
    pub revoke_existing: bool,
    /// How long to wait for a revoked lock to clear. Must be `>= 0`.
    pub revoke_timeout_secs: i64,
    pub session: SessionInfo,
}

impl LockRequest {
    /// A plain acquisition: no revocation, default timeout, empty session info.
    pub fn new(key: LockKey) -> Self {
        Self {
            key,
            revoke_existing: false,
            revoke_timeout_secs: DEFAULT_REVOKE_TIMEOUT_SECS,
            session: SessionInfo::default(),
        }
    }

    /// Revoke an existing holder, waiting up to `timeout_secs` for it to clear.
    pub fn revoking(mut self, timeout_secs: i64) -> Self {
        self.revoke_existing = true;
        self.revoke_timeout_secs = timeout_secs;
        self
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = session;
        self
    }
}

/// Result of a lock acquisition attempt. Each failure cause is distinct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AcquireOutcome {
    /// The lock was created; `lock_id` is needed to release it.
    Acquired { lock_id: LockId },

    /// Another session holds the lock and no revocation was requested (or
    /// a third party claimed it after the revocation cleared). Holder
    /// details are best-effort and may be absent if the lock vanished.
    LockHeld {
        held_by: Option<String>,
        acquired_at: Option<Timestamp>,
    },

    /// The caller has no revoker right covering this key.
    RevokeDenied,

    /// The holder did not release within the revoke timeout.
    RevokeTimedOut { waited_ms: u64 },
}

impl AcquireOutcome {
    /// The new lock id, if the lock was acquired.
    pub fn lock_id(&self) -> Option<&str> {
        match self {
            AcquireOutcome::Acquired { lock_id } => Some(lock_id),
            _ => None,
        }
    }

    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired { .. })
    }
}

/// A pending request, stamped on a lock row, asking its holder to release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevocationRequest {
    pub requested_by: String,
    pub requested_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    // -----------------------------------------------------------------------
    // Lock ids
    // -----------------------------------------------------------------------

    #[test]
    fn new_lock_id_is_32_hex_chars() {
        let id = new_lock_id();
        assert_eq!(id.len(), LOCK_ID_LEN);
        assert!(is_valid_lock_id(&id));
    }

    #[test]
    fn new_lock_ids_are_unique() {
        assert_ne!(new_lock_id(), new_lock_id());
    }

    #[test]
    fn lock_id_shape_is_checked() {
        assert!(!is_valid_lock_id(""));
        assert!(!is_valid_lock_id("ABCDEF0123456789ABCDEF0123456789"));
        assert!(!is_valid_lock_id("0123456789abcdef0123456789abcde"));
        assert!(!is_valid_lock_id("0123456789abcdef0123456789abcdeg"));
        assert!(is_valid_lock_id("0123456789abcdef0123456789abcdef"));
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    #[test]
    fn key_normalises_components() {
        let key = LockKey::new(" spk ", "lockRelease", "Test_Release").unwrap();
        assert_eq!(key.office_id(), "SPK");
        assert_eq!(key.project_id(), "lockRelease");
        assert_eq!(key.application_id(), "test_release");
        assert_eq!(key.to_string(), "SPK/lockRelease/test_release");
    }

    #[test]
    fn key_rejects_empty_components() {
        assert_matches!(
            LockKey::new("", "p", "a"),
            Err(CoreError::InvalidArgument(msg)) if msg.contains("office_id")
        );
        assert_matches!(
            LockKey::new("SPK", "  ", "a"),
            Err(CoreError::InvalidArgument(msg)) if msg.contains("project_id")
        );
        assert_matches!(
            LockKey::new("SPK", "p", ""),
            Err(CoreError::InvalidArgument(msg)) if msg.contains("application_id")
        );
    }

    #[test]
    fn key_rejects_wildcards() {
        assert_matches!(
            LockKey::new("SPK", "lock*", "a"),
            Err(CoreError::InvalidArgument(msg)) if msg.contains("wildcards")
        );
        assert!(LockKey::new("SP?", "p", "a").is_err());
    }

    #[test]
    fn key_rejects_overlong_components() {
        let long_office = "X".repeat(MAX_OFFICE_ID_LEN + 1);
        assert!(LockKey::new(&long_office, "p", "a").is_err());
        let max_project = "p".repeat(MAX_PROJECT_ID_LEN);
        assert!(LockKey::new("SPK", &max_project, "a").is_ok());
    }

    #[test]
    fn user_id_keeps_case() {
        assert_eq!(normalize_user_id(" Q0HECxyz ").unwrap(), "Q0HECxyz");
        assert!(normalize_user_id("").is_err());
    }

    // -----------------------------------------------------------------------
    // Timeouts
    // -----------------------------------------------------------------------

    #[test]
    fn revoke_timeout_must_be_non_negative() {
        assert_eq!(validate_revoke_timeout(0).unwrap(), Duration::ZERO);
        assert_eq!(validate_revoke_timeout(10).unwrap(), Duration::from_secs(10));
        assert_matches!(
            validate_revoke_timeout(-1),
            Err(CoreError::InvalidArgument(msg)) if msg.contains(">= 0")
        );
    }

    #[test]
    fn poll_interval_is_clamped_sub_second() {
        assert_eq!(clamp_poll_interval_ms(0), MIN_REVOKE_POLL_INTERVAL_MS);
        assert_eq!(clamp_poll_interval_ms(250), 250);
        assert_eq!(clamp_poll_interval_ms(60_000), MAX_REVOKE_POLL_INTERVAL_MS);
    }

    #[test]
    fn default_poll_interval_in_valid_range() {
        assert_eq!(
            clamp_poll_interval_ms(DEFAULT_REVOKE_POLL_INTERVAL_MS),
            DEFAULT_REVOKE_POLL_INTERVAL_MS
        );
    }

    // -----------------------------------------------------------------------
    // Requests and outcomes
    // -----------------------------------------------------------------------

    #[test]
    fn lock_request_defaults() {
        let key = LockKey::new("SPK", "p", "a").unwrap();
        let req = LockRequest::new(key.clone());
        assert!(!req.revoke_existing);
        assert_eq!(req.revoke_timeout_secs, DEFAULT_REVOKE_TIMEOUT_SECS);

        let req = LockRequest::new(key).revoking(3);
        assert!(req.revoke_existing);
        assert_eq!(req.revoke_timeout_secs, 3);
    }

    #[test]
    fn outcome_lock_id_only_when_acquired() {
        let acquired = AcquireOutcome::Acquired {
            lock_id: "0123456789abcdef0123456789abcdef".into(),
        };
        assert_eq!(acquired.lock_id(), Some("0123456789abcdef0123456789abcdef"));
        assert!(acquired.is_acquired());
        assert_eq!(AcquireOutcome::RevokeDenied.lock_id(), None);
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(AcquireOutcome::RevokeTimedOut { waited_ms: 1500 })
            .unwrap();
        assert_eq!(json["outcome"], "revoke_timed_out");
        assert_eq!(json["waited_ms"], 1500);

        let json = serde_json::to_value(AcquireOutcome::RevokeDenied).unwrap();
        assert_eq!(json["outcome"], "revoke_denied");
    }
}
