/// Primary key of `lock_revoker_rights` rows (PostgreSQL BIGSERIAL).
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque lock token: 32 lowercase hex characters.
pub type LockId = String;
