use sqlx::SqlitePool;
use std::path::Path;

use crate::locks::UserLocks;
use crate::store;
use crate::EngineError;

/// The bonus-program engine: one handle over the embedded store, shared by
/// the API layer, the notifier, and the hourly sweep.
///
/// Operation groups live in sibling modules, each an `impl Engine` block:
/// registry, ledger, cooldown, redemption, activity, stats, ads.
#[derive(Debug)]
pub struct Engine {
    pub(crate) pool: SqlitePool,
    pub(crate) locks: UserLocks,
}

impl Engine {
    /// Open (creating if missing) the database at `path`.
    pub async fn open(path: &Path) -> Result<Self, EngineError> {
        let pool = store::open_pool(path).await?;
        Ok(Self::from_pool(pool))
    }

    /// Engine over a fresh in-memory database. Used by tests.
    pub async fn open_in_memory() -> Result<Self, EngineError> {
        let pool = store::open_memory_pool().await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: UserLocks::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
