//! Insight persistence
//!
//! `InsightStore` is the seam between the refresh job and the database.
//! `PgInsightStore` is the production implementation, `MemoryInsightStore`
//! keeps the same semantics in process.

pub mod insight_repo;
pub mod memory;

pub use insight_repo::PgInsightStore;
pub use memory::MemoryInsightStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{DueInsight, InsightPayload, InsightRecord};
use crate::staleness::RefreshInterval;

#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Every record, oldest-due first
    async fn list_all(&self) -> Result<Vec<DueInsight>>;

    /// Records due at `now`, oldest-due first
    async fn select_due(&self, now: DateTime<Utc>, interval: RefreshInterval)
        -> Result<Vec<DueInsight>>;

    /// Replace the payload and both timestamps of an existing record.
    ///
    /// Never inserts. A missing key is `InsightError::RecordNotFound`.
    async fn apply_refresh(
        &self,
        key: &str,
        payload: &InsightPayload,
        refreshed_at: DateTime<Utc>,
        next_refresh_due: DateTime<Utc>,
    ) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<InsightRecord>>;
}

/// Create the PostgreSQL connection pool
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_secs = config.connect_timeout_secs,
        acquire_timeout_secs = config.acquire_timeout_secs,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .test_before_acquire(true)
        .connect_lazy(&config.database_url)?;

    // Verify connectivity within the connect timeout
    match tokio::time::timeout(
        Duration::from_secs(config.connect_timeout_secs),
        sqlx::query("SELECT 1").execute(&pool),
    )
    .await
    {
        Ok(Ok(_)) => {
            info!("Database pool created and verified");
            Ok(pool)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Database connection verification failed");
            Err(e.into())
        }
        Err(_) => {
            error!(
                timeout_secs = config.connect_timeout_secs,
                "Database connection verification timeout"
            );
            Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "database verification timeout",
            ))
            .into())
        }
    }
}
