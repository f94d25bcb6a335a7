//! Repository for the `project_locks` table.

use lockkeeper_core::locking::LockKey;
use lockkeeper_core::mask::CatalogFilter;
use sqlx::PgPool;

use crate::models::project_lock::{CreateProjectLock, ProjectLock};

/// Column list for `project_locks` queries.
const COLUMNS: &str = "lock_id, office_id, project_id, application_id, acquire_time, \
                       session_user_name, os_user, session_program, session_machine, \
                       revoke_requested_by, revoke_requested_at";

/// Provides the atomic lock primitives over `project_locks`.
pub struct ProjectLockRepo;

impl ProjectLockRepo {
    /// Attempt to acquire the lock described by `input`.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING` against the unique key, so
    /// the existence check and the insert are one statement. Returns the new
    /// row, or `None` if the key is already locked.
    pub async fn acquire(
        pool: &PgPool,
        input: &CreateProjectLock,
    ) -> Result<Option<ProjectLock>, sqlx::Error> {
        let query = format!(
            "INSERT INTO project_locks \
                (lock_id, office_id, project_id, application_id, \
                 session_user_name, os_user, session_program, session_machine) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (office_id, project_id, application_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectLock>(&query)
            .bind(&input.lock_id)
            .bind(input.key.office_id())
            .bind(input.key.project_id())
            .bind(input.key.application_id())
            .bind(&input.session.session_user)
            .bind(&input.session.os_user)
            .bind(&input.session.session_program)
            .bind(&input.session.session_machine)
            .fetch_optional(pool)
            .await
    }

    /// Release a lock. Only an exact `lock_id` match in the office deletes.
    ///
    /// Returns `true` if a lock was released, `false` if nothing matched.
    pub async fn release(
        pool: &PgPool,
        office_id: &str,
        lock_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_locks WHERE office_id = $1 AND lock_id = $2")
                .bind(office_id)
                .bind(lock_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stamp a revocation request on the lock `lock_id` held on `key`.
    ///
    /// An earlier request on the same lock is overwritten. Returns `false`
    /// if that lock no longer holds the key.
    pub async fn request_revocation(
        pool: &PgPool,
        key: &LockKey,
        lock_id: &str,
        requested_by: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE project_locks \
             SET revoke_requested_by = $5, revoke_requested_at = NOW() \
             WHERE office_id = $1 AND project_id = $2 AND application_id = $3 \
               AND lock_id = $4",
        )
        .bind(key.office_id())
        .bind(key.project_id())
        .bind(key.application_id())
        .bind(lock_id)
        .bind(requested_by)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Forcibly delete whatever lock holds `key`, returning it.
    pub async fn revoke(pool: &PgPool, key: &LockKey) -> Result<Option<ProjectLock>, sqlx::Error> {
        let query = format!(
            "DELETE FROM project_locks \
             WHERE office_id = $1 AND project_id = $2 AND application_id = $3 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ProjectLock>(&query)
            .bind(key.office_id())
            .bind(key.project_id())
            .bind(key.application_id())
            .fetch_optional(pool)
            .await
    }

    /// Get the lock currently held on `key`, or `None` if unlocked.
    pub async fn find_by_key(
        pool: &PgPool,
        key: &LockKey,
    ) -> Result<Option<ProjectLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM project_locks \
             WHERE office_id = $1 AND project_id = $2 AND application_id = $3"
        );
        sqlx::query_as::<_, ProjectLock>(&query)
            .bind(key.office_id())
            .bind(key.project_id())
            .bind(key.application_id())
            .fetch_optional(pool)
            .await
    }

    /// Get a lock by its id within an office.
    pub async fn find_by_id(
        pool: &PgPool,
        office_id: &str,
        lock_id: &str,
    ) -> Result<Option<ProjectLock>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM project_locks WHERE office_id = $1 AND lock_id = $2");
        sqlx::query_as::<_, ProjectLock>(&query)
            .bind(office_id)
            .bind(lock_id)
            .fetch_optional(pool)
            .await
    }

    /// Returns `true` if any lock holds `key`.
    pub async fn exists(pool: &PgPool, key: &LockKey) -> Result<bool, sqlx::Error> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM project_locks \
             WHERE office_id = $1 AND project_id = $2 AND application_id = $3)",
        )
        .bind(key.office_id())
        .bind(key.project_id())
        .bind(key.application_id())
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// List locks matching the catalog masks, ordered by key.
    pub async fn list(
        pool: &PgPool,
        filter: &CatalogFilter,
    ) -> Result<Vec<ProjectLock>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM project_locks \
             WHERE office_id ILIKE $1 ESCAPE '\\' \
               AND project_id ILIKE $2 ESCAPE '\\' \
               AND application_id ILIKE $3 ESCAPE '\\' \
             ORDER BY office_id, project_id, application_id"
        );
        sqlx::query_as::<_, ProjectLock>(&query)
            .bind(filter.office.to_sql_like())
            .bind(filter.project.to_sql_like())
            .bind(filter.application.to_sql_like())
            .fetch_all(pool)
            .await
    }
}
