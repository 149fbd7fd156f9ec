//! RAII guard for the per-landing-zone deletion lock.

use db::DeletionLockRepository;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};

/// Holds the advisory deletion lock of one landing zone.
///
/// Released explicitly with [`DeletionLockGuard::release`], or from `Drop`
/// on error paths.
///
/// # Example
///
/// ```ignore
/// let guard = DeletionLockGuard::acquire(locks.clone(), landing_zone_id).await?;
/// // ... plan and execute the deletion ...
/// guard.release().await?;
/// ```
pub struct DeletionLockGuard {
    repository: DeletionLockRepository,
    landing_zone_id: Uuid,
    holder: String,
    held: bool,
}

impl DeletionLockGuard {
    /// Takes the lock, failing with `DeletionInProgress` when another
    /// deletion of the same landing zone holds it.
    pub async fn acquire(repository: DeletionLockRepository, landing_zone_id: Uuid) -> Result<Self> {
        let holder = Uuid::new_v4().to_string();
        if !repository.try_acquire(landing_zone_id, &holder).await? {
            return Err(OrchestratorError::DeletionInProgress(landing_zone_id));
        }
        debug!(landing_zone_id = %landing_zone_id, holder = %holder, "Deletion lock acquired");

        Ok(Self {
            repository,
            landing_zone_id,
            holder,
            held: true,
        })
    }

    pub fn landing_zone_id(&self) -> Uuid {
        self.landing_zone_id
    }

    pub async fn release(mut self) -> Result<()> {
        self.held = false;
        self.repository
            .release(self.landing_zone_id, &self.holder)
            .await?;
        debug!(landing_zone_id = %self.landing_zone_id, "Deletion lock released");
        Ok(())
    }
}

impl Drop for DeletionLockGuard {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        // Cannot await in Drop
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                landing_zone_id = %self.landing_zone_id,
                "No runtime to release deletion lock; it expires when stale"
            );
            return;
        };
        let repository = self.repository.clone();
        let landing_zone_id = self.landing_zone_id;
        let holder = std::mem::take(&mut self.holder);

        handle.spawn(async move {
            if let Err(e) = repository.release(landing_zone_id, &holder).await {
                warn!(
                    landing_zone_id = %landing_zone_id,
                    error = %e,
                    "Deletion lock release failed in Drop"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn repository() -> DeletionLockRepository {
        let pool = db::create_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        DeletionLockRepository::new(pool)
    }

    #[tokio::test]
    async fn test_second_acquire_is_refused_until_release() {
        let repository = repository().await;
        let id = Uuid::new_v4();

        let guard = DeletionLockGuard::acquire(repository.clone(), id).await.unwrap();
        let second = DeletionLockGuard::acquire(repository.clone(), id).await;
        assert!(matches!(second, Err(OrchestratorError::DeletionInProgress(_))));

        guard.release().await.unwrap();
        assert!(DeletionLockGuard::acquire(repository, id).await.is_ok());
    }

    #[tokio::test]
    async fn test_drop_releases_lock() {
        let repository = repository().await;
        let id = Uuid::new_v4();

        drop(DeletionLockGuard::acquire(repository.clone(), id).await.unwrap());

        for _ in 0..50 {
            if repository.holder(id).await.unwrap().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("lock was not released on drop");
    }
}
