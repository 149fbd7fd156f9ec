use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;

/// Advisory locks keyed by landing-zone id.
///
/// A lock older than the stale threshold is assumed to belong to a crashed
/// holder and may be taken over.
#[derive(Clone)]
pub struct DeletionLockRepository {
    pool: SqlitePool,
    stale_after: Duration,
}

impl DeletionLockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            stale_after: Duration::from_secs(2 * 60 * 60),
        }
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Returns true when `holder` now owns the lock.
    pub async fn try_acquire(&self, landing_zone_id: Uuid, holder: &str) -> Result<bool> {
        let now = Utc::now().timestamp_millis();
        let stale_before = now - i64::try_from(self.stale_after.as_millis()).unwrap_or(i64::MAX);

        let expired = sqlx::query(
            "DELETE FROM deletion_locks WHERE landing_zone_id = ? AND acquired_at < ?",
        )
        .bind(landing_zone_id.to_string())
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        if expired.rows_affected() > 0 {
            warn!(landing_zone_id = %landing_zone_id, "Took over stale deletion lock");
        }

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO deletion_locks (landing_zone_id, holder, acquired_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(landing_zone_id.to_string())
        .bind(holder)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Releases the lock only if `holder` owns it.
    pub async fn release(&self, landing_zone_id: Uuid, holder: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM deletion_locks WHERE landing_zone_id = ? AND holder = ?")
                .bind(landing_zone_id.to_string())
                .bind(holder)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn holder(&self, landing_zone_id: Uuid) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT holder FROM deletion_locks WHERE landing_zone_id = ?")
                .bind(landing_zone_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(holder,)| holder))
    }
}
