use landing_zone_core::FlightRecord;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::FlightRow;

const SELECT_FLIGHT: &str = r#"
    SELECT id, class, status, next_step, input, working, error, created_at, updated_at
    FROM flights
"#;

#[derive(Clone)]
pub struct FlightRepository {
    pool: SqlitePool,
}

impl FlightRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the record or overwrites its mutable columns.
    pub async fn save(&self, record: &FlightRecord) -> Result<()> {
        let row = FlightRow::from_domain(record)?;

        sqlx::query(
            r#"
            INSERT INTO flights (id, class, status, next_step, input, working, error, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                next_step = excluded.next_step,
                working = excluded.working,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.id)
        .bind(&row.class)
        .bind(&row.status)
        .bind(row.next_step)
        .bind(&row.input)
        .bind(&row.working)
        .bind(&row.error)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<FlightRecord>> {
        let row: Option<FlightRow> = sqlx::query_as(&format!("{SELECT_FLIGHT} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(FlightRow::into_domain).transpose()
    }

    /// Flights that were queued, running or rolling back when the process
    /// last stopped.
    pub async fn find_unfinished(&self) -> Result<Vec<FlightRecord>> {
        let rows: Vec<FlightRow> = sqlx::query_as(&format!(
            "{SELECT_FLIGHT} WHERE status IN ('queued', 'running', 'rolling_back') ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FlightRow::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use landing_zone_core::{FlightClass, FlightMap, FlightStatus};

    async fn setup_test_db() -> SqlitePool {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn record(status: FlightStatus) -> FlightRecord {
        let mut input = FlightMap::new();
        input.put("LANDING_ZONE_ID", &Uuid::new_v4()).unwrap();
        let mut record = FlightRecord::new(Uuid::new_v4(), FlightClass::LandingZoneResources, input);
        record.status = status;
        record
    }

    #[tokio::test]
    async fn test_save_and_find_flight() {
        let repo = FlightRepository::new(setup_test_db().await);
        let record = record(FlightStatus::Queued);

        repo.save(&record).await.unwrap();
        let found = repo.find_by_id(record.id).await.unwrap().unwrap();

        assert_eq!(found.id, record.id);
        assert_eq!(found.class, FlightClass::LandingZoneResources);
        assert_eq!(found.input, record.input);
    }

    #[tokio::test]
    async fn test_save_overwrites_progress() {
        let repo = FlightRepository::new(setup_test_db().await);
        let mut record = record(FlightStatus::Running);
        repo.save(&record).await.unwrap();

        record.next_step = 3;
        record.working.put("VNET_RESOURCES", &vec!["vnet-1"]).unwrap();
        record.status = FlightStatus::Error;
        record.error = Some("boom".to_string());
        repo.save(&record).await.unwrap();

        let found = repo.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(found.next_step, 3);
        assert_eq!(found.status, FlightStatus::Error);
        assert_eq!(found.error.as_deref(), Some("boom"));
        assert!(found.working.contains("VNET_RESOURCES"));
    }

    #[tokio::test]
    async fn test_find_unfinished_skips_terminal() {
        let repo = FlightRepository::new(setup_test_db().await);
        repo.save(&record(FlightStatus::Queued)).await.unwrap();
        repo.save(&record(FlightStatus::Running)).await.unwrap();
        repo.save(&record(FlightStatus::RollingBack)).await.unwrap();
        repo.save(&record(FlightStatus::Success)).await.unwrap();
        repo.save(&record(FlightStatus::Fatal)).await.unwrap();

        let unfinished = repo.find_unfinished().await.unwrap();
        assert_eq!(unfinished.len(), 3);
        assert!(unfinished.iter().all(|r| !r.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_find_missing_flight() {
        let repo = FlightRepository::new(setup_test_db().await);
        assert!(repo.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }
}
