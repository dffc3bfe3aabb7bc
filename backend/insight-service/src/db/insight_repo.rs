/// Insight Repository
///
/// PostgreSQL operations for the `industry_insights` table
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{debug, error};

use super::InsightStore;
use crate::error::{InsightError, Result};
use crate::models::{
    DemandLevel, DueInsight, InsightPayload, InsightRecord, MarketOutlook, SalaryRange,
};
use crate::staleness::RefreshInterval;

#[derive(Clone)]
pub struct PgInsightStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct InsightRow {
    industry: String,
    salary_ranges: Json<Vec<SalaryRange>>,
    growth_rate: f64,
    demand_level: String,
    top_skills: Vec<String>,
    market_outlook: String,
    key_trends: Vec<String>,
    recommended_skills: Vec<String>,
    last_updated: DateTime<Utc>,
    next_update: DateTime<Utc>,
}

impl InsightRow {
    fn into_record(self) -> Result<InsightRecord> {
        let demand_level = DemandLevel::from_db_str(&self.demand_level).ok_or_else(|| {
            InsightError::PersistenceFailure {
                key: self.industry.clone(),
                reason: format!("unknown demand level {}", self.demand_level),
            }
        })?;
        let market_outlook = MarketOutlook::from_db_str(&self.market_outlook).ok_or_else(|| {
            InsightError::PersistenceFailure {
                key: self.industry.clone(),
                reason: format!("unknown market outlook {}", self.market_outlook),
            }
        })?;

        Ok(InsightRecord {
            key: self.industry,
            payload: InsightPayload {
                salary_ranges: self.salary_ranges.0,
                growth_rate: self.growth_rate,
                demand_level,
                top_skills: self.top_skills,
                market_outlook,
                key_trends: self.key_trends,
                recommended_skills: self.recommended_skills,
            },
            last_refreshed_at: self.last_updated,
            next_refresh_due: self.next_update,
        })
    }
}

impl PgInsightStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InsightStore for PgInsightStore {
    async fn list_all(&self) -> Result<Vec<DueInsight>> {
        let rows = sqlx::query_as::<_, DueInsight>(
            r#"
            SELECT industry, last_updated, next_update
            FROM industry_insights
            ORDER BY next_update ASC, industry COLLATE "C" ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn select_due(
        &self,
        now: DateTime<Utc>,
        interval: RefreshInterval,
    ) -> Result<Vec<DueInsight>> {
        let stale_before = now - interval.as_duration();

        let rows = sqlx::query_as::<_, DueInsight>(
            r#"
            SELECT industry, last_updated, next_update
            FROM industry_insights
            WHERE next_update <= $1
               OR last_updated <= $2
            ORDER BY next_update ASC, industry COLLATE "C" ASC
            "#,
        )
        .bind(now)
        .bind(stale_before)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), now = %now, "Selected due insights");

        Ok(rows)
    }

    async fn apply_refresh(
        &self,
        key: &str,
        payload: &InsightPayload,
        refreshed_at: DateTime<Utc>,
        next_refresh_due: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE industry_insights
            SET salary_ranges = $2,
                growth_rate = $3,
                demand_level = $4,
                top_skills = $5,
                market_outlook = $6,
                key_trends = $7,
                recommended_skills = $8,
                last_updated = $9,
                next_update = $10
            WHERE industry = $1
            "#,
        )
        .bind(key)
        .bind(Json(&payload.salary_ranges))
        .bind(payload.growth_rate)
        .bind(payload.demand_level.as_db_str())
        .bind(&payload.top_skills)
        .bind(payload.market_outlook.as_db_str())
        .bind(&payload.key_trends)
        .bind(&payload.recommended_skills)
        .bind(refreshed_at)
        .bind(next_refresh_due)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!(industry = %key, error = %e, "Failed to update insights");
            InsightError::PersistenceFailure {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(InsightError::RecordNotFound(key.to_string()));
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<InsightRecord>> {
        let row = sqlx::query_as::<_, InsightRow>(
            r#"
            SELECT industry, salary_ranges, growth_rate, demand_level, top_skills,
                   market_outlook, key_trends, recommended_skills, last_updated, next_update
            FROM industry_insights
            WHERE industry = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(InsightRow::into_record).transpose()
    }
}
