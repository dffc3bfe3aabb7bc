//! In-process insight store
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::InsightStore;
use crate::error::{InsightError, Result};
use crate::models::{DueInsight, InsightPayload, InsightRecord};
use crate::staleness::{is_due, order_due, RefreshInterval};

/// Map-backed store with the same selection and update rules as
/// `PgInsightStore`
#[derive(Default)]
pub struct MemoryInsightStore {
    records: RwLock<HashMap<String, InsightRecord>>,
}

impl MemoryInsightStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = InsightRecord>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.key.clone(), r))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Seed or overwrite a record
    pub async fn insert(&self, record: InsightRecord) {
        self.records.write().await.insert(record.key.clone(), record);
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl InsightStore for MemoryInsightStore {
    async fn list_all(&self) -> Result<Vec<DueInsight>> {
        let records = self.records.read().await;
        Ok(order_due(records.values().map(DueInsight::from).collect()))
    }

    async fn select_due(
        &self,
        now: DateTime<Utc>,
        interval: RefreshInterval,
    ) -> Result<Vec<DueInsight>> {
        let records = self.records.read().await;
        let due = records
            .values()
            .filter(|r| is_due(r.last_refreshed_at, r.next_refresh_due, now, interval))
            .map(DueInsight::from)
            .collect();
        Ok(order_due(due))
    }

    async fn apply_refresh(
        &self,
        key: &str,
        payload: &InsightPayload,
        refreshed_at: DateTime<Utc>,
        next_refresh_due: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| InsightError::RecordNotFound(key.to_string()))?;

        record.payload = payload.clone();
        record.last_refreshed_at = refreshed_at;
        record.next_refresh_due = next_refresh_due;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<InsightRecord>> {
        Ok(self.records.read().await.get(key).cloned())
    }
}
