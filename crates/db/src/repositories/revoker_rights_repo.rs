//! Repository for the `lock_revoker_rights` table.

use lockkeeper_core::mask::{CatalogFilter, Mask};
use sqlx::PgPool;

use crate::models::revoker_right::{CreateRevokerRight, RevokerRight, RevokerRightKey};

/// Column list for `lock_revoker_rights` queries.
const COLUMNS: &str = "id, office_id, office_mask, user_id, project_mask, application_mask, \
                       created_at, updated_at";

/// Provides grant / revoke / query operations for lock revoker rights.
pub struct RevokerRightsRepo;

impl RevokerRightsRepo {
    /// Create a grant, or refresh its office mask if the key already exists.
    pub async fn upsert(
        pool: &PgPool,
        input: &CreateRevokerRight,
    ) -> Result<RevokerRight, sqlx::Error> {
        let query = format!(
            "INSERT INTO lock_revoker_rights \
                (office_id, office_mask, user_id, project_mask, application_mask) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (office_id, user_id, project_mask, application_mask) \
             DO UPDATE SET office_mask = EXCLUDED.office_mask, updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, RevokerRight>(&query)
            .bind(&input.key.office_id)
            .bind(&input.office_mask)
            .bind(&input.key.user_id)
            .bind(&input.key.project_mask)
            .bind(&input.key.application_mask)
            .fetch_one(pool)
            .await
    }

    /// Delete a single grant by key. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, key: &RevokerRightKey) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM lock_revoker_rights \
             WHERE office_id = $1 AND user_id = $2 \
               AND project_mask = $3 AND application_mask = $4",
        )
        .bind(&key.office_id)
        .bind(&key.user_id)
        .bind(&key.project_mask)
        .bind(&key.application_mask)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every grant owned by `office_id` for `user_id` whose stored
    /// office mask and application mask match the given masks.
    ///
    /// Returns the number of rows removed.
    pub async fn delete_matching(
        pool: &PgPool,
        office_id: &str,
        office_mask: &Mask,
        application_mask: &Mask,
        user_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM lock_revoker_rights \
             WHERE office_id = $1 AND user_id = $2 \
               AND office_mask ILIKE $3 ESCAPE '\\' \
               AND application_mask ILIKE $4 ESCAPE '\\'",
        )
        .bind(office_id)
        .bind(user_id)
        .bind(office_mask.to_sql_like())
        .bind(application_mask.to_sql_like())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All grants held by `user_id`, in any office.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: &str,
    ) -> Result<Vec<RevokerRight>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_revoker_rights WHERE user_id = $1 \
             ORDER BY office_id, project_mask, application_mask"
        );
        sqlx::query_as::<_, RevokerRight>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// List grants whose owning office and stored masks match the filter.
    pub async fn list(
        pool: &PgPool,
        filter: &CatalogFilter,
    ) -> Result<Vec<RevokerRight>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lock_revoker_rights \
             WHERE office_id ILIKE $1 ESCAPE '\\' \
               AND project_mask ILIKE $2 ESCAPE '\\' \
               AND application_mask ILIKE $3 ESCAPE '\\' \
             ORDER BY office_id, user_id, project_mask, application_mask"
        );
        sqlx::query_as::<_, RevokerRight>(&query)
            .bind(filter.office.to_sql_like())
            .bind(filter.project.to_sql_like())
            .bind(filter.application.to_sql_like())
            .fetch_all(pool)
            .await
    }
}
