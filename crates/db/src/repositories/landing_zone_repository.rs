use landing_zone_core::LandingZone;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::LandingZoneRow;

#[derive(Clone)]
pub struct LandingZoneRepository {
    pool: SqlitePool,
}

impl LandingZoneRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns false when a record with the same id already exists.
    pub async fn create(&self, zone: &LandingZone) -> Result<bool> {
        let row = LandingZoneRow::from(zone);

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO landing_zones
                (id, definition, version, tenant_id, subscription_id, resource_group, region, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.definition)
        .bind(&row.version)
        .bind(&row.tenant_id)
        .bind(&row.subscription_id)
        .bind(&row.resource_group)
        .bind(&row.region)
        .bind(row.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<LandingZone>> {
        let row: Option<LandingZoneRow> = sqlx::query_as(
            r#"
            SELECT id, definition, version, tenant_id, subscription_id, resource_group, region, created_at
            FROM landing_zones
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(LandingZoneRow::into_domain).transpose()
    }

    pub async fn find_all(&self) -> Result<Vec<LandingZone>> {
        let rows: Vec<LandingZoneRow> = sqlx::query_as(
            r#"
            SELECT id, definition, version, tenant_id, subscription_id, resource_group, region, created_at
            FROM landing_zones
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LandingZoneRow::into_domain).collect()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM landing_zones WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
