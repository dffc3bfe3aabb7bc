//! Industry insight refresh job
//!
//! One cycle selects every due industry, regenerates its insights through the
//! content generator and writes them back. Industries are processed strictly
//! in order, oldest-due first, one generation call at a time.
//!
//! # Failure policy
//! - `Continue` (default): a failing industry is recorded in the
//!   `CycleReport` and the cycle moves on
//! - `Abort`: the first failure ends the cycle and is returned as the error
//!
//! Either way a failed industry keeps its timestamps, so it is still due on
//! the next cycle.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::{Clock, FailurePolicy, SystemClock};
use crate::db::InsightStore;
use crate::error::{InsightError, Result};
use crate::lock::CycleLock;
use crate::metrics;
use crate::parser::parse_insight_payload;
use crate::prompt::build_insight_prompt;
use crate::providers::ContentGenerator;
use crate::staleness::{next_refresh_due, RefreshInterval};

/// Tunables for the refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: RefreshInterval,
    /// Upper bound on one generation call
    pub generation_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval: RefreshInterval::default(),
            generation_timeout: Duration::from_secs(120),
            failure_policy: FailurePolicy::Continue,
        }
    }
}

/// Result of one successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedInsight {
    pub key: String,
    pub refreshed_at: DateTime<Utc>,
    pub next_refresh_due: DateTime<Utc>,
}

/// An industry that failed during a cycle
#[derive(Debug)]
pub struct KeyFailure {
    pub key: String,
    pub error: InsightError,
}

/// Summary of a completed cycle
#[derive(Debug)]
pub struct CycleReport {
    /// Cycle clock at selection time
    pub started_at: DateTime<Utc>,
    /// Due industries, in processing order
    pub selected: Vec<String>,
    pub refreshed: Vec<RefreshedInsight>,
    pub failed: Vec<KeyFailure>,
    pub elapsed: Duration,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>, selected: Vec<String>) -> Self {
        Self {
            started_at,
            selected,
            refreshed: Vec::new(),
            failed: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.key.as_str()).collect()
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle holds the lock
    Skipped,
}

/// Refresh cycle controller
///
/// Collaborators are injected so that the process entry point owns their
/// lifecycle.
pub struct InsightRefreshJob {
    store: Arc<dyn InsightStore>,
    generator: Arc<dyn ContentGenerator>,
    lock: Arc<dyn CycleLock>,
    clock: Arc<dyn Clock>,
    settings: RefreshSettings,
}

impl InsightRefreshJob {
    pub fn new(
        store: Arc<dyn InsightStore>,
        generator: Arc<dyn ContentGenerator>,
        lock: Arc<dyn CycleLock>,
        settings: RefreshSettings,
    ) -> Self {
        Self {
            store,
            generator,
            lock,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Keys of every due record, oldest-due first
    pub async fn select_due_keys(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let due = self.store.select_due(now, self.settings.interval).await?;

        for record in &due {
            debug!(
                industry = %record.key,
                last_updated = %record.last_refreshed_at,
                next_update = %record.next_refresh_due,
                "Industry due for refresh"
            );
        }

        Ok(due.into_iter().map(|r| r.key).collect())
    }

    /// Regenerate and persist the insights of one industry
    pub async fn refresh_one(&self, key: &str) -> Result<RefreshedInsight> {
        match self.store.get(key).await {
            Ok(Some(previous)) => debug!(
                industry = %key,
                last_updated = %previous.last_refreshed_at,
                next_update = %previous.next_refresh_due,
                "Current insight state"
            ),
            Ok(None) => return Err(InsightError::RecordNotFound(key.to_string())),
            // An unreadable row is still refreshed; the update overwrites it
            Err(e) => warn!(industry = %key, error = %e, "Failed to read current insight state"),
        }

        let prompt = build_insight_prompt(key);
        let raw = self.generate(key, &prompt).await?;
        let payload = parse_insight_payload(key, &raw)?;

        let refreshed_at = self.clock.now();
        let next_due = next_refresh_due(refreshed_at, self.settings.interval);

        self.store
            .apply_refresh(key, &payload, refreshed_at, next_due)
            .await?;

        info!(
            industry = %key,
            growth_rate = payload.growth_rate,
            demand_level = ?payload.demand_level,
            market_outlook = ?payload.market_outlook,
            last_updated = %refreshed_at,
            next_update = %next_due,
            "Industry insights updated"
        );

        Ok(RefreshedInsight {
            key: key.to_string(),
            refreshed_at,
            next_refresh_due: next_due,
        })
    }

    async fn generate(&self, key: &str, prompt: &str) -> Result<String> {
        let timeout = self.settings.generation_timeout;
        let start = Instant::now();

        let result = tokio::time::timeout(timeout, self.generator.generate(prompt)).await;
        metrics::record_generation_duration(start.elapsed());

        match result {
            Ok(Ok(text)) => {
                debug!(
                    industry = %key,
                    provider = self.generator.name(),
                    elapsed_ms = start.elapsed().as_millis(),
                    response_len = text.len(),
                    "Insights generated"
                );
                Ok(text)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(InsightError::GenerationTimeout(timeout)),
        }
    }

    /// Run one cycle under the cycle lock
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Some(lease) = self.lock.try_acquire().await? else {
            warn!("Insight refresh cycle already running, skipping");
            metrics::record_skipped_cycle();
            return Ok(CycleOutcome::Skipped);
        };

        let start = Instant::now();
        let result = self.run_locked(start).await;

        if let Err(e) = self.lock.release(lease).await {
            error!(error = %e, "Failed to release cycle lock");
        }

        let outcome = match &result {
            Ok(_) => "completed",
            Err(e) if e.is_key_failure() => "aborted",
            Err(_) => "error",
        };
        metrics::record_cycle(outcome, start.elapsed());

        result.map(CycleOutcome::Completed)
    }

    async fn run_locked(&self, start: Instant) -> Result<CycleReport> {
        let now = self.clock.now();

        match self.store.list_all().await {
            Ok(all) => debug!(count = all.len(), records = ?all, "All industries in database"),
            Err(e) => warn!(error = %e, "Failed to list industries"),
        }

        let keys = self.select_due_keys(now).await?;
        metrics::set_due_records(keys.len());

        let mut report = CycleReport::new(now, keys.clone());

        if keys.is_empty() {
            info!(now = %now, "No industries need updating");
            report.elapsed = start.elapsed();
            return Ok(report);
        }

        info!(count = keys.len(), "Found industries to update");

        for key in keys {
            info!(industry = %key, "Processing industry");

            match self.refresh_one(&key).await {
                Ok(refreshed) => {
                    metrics::record_key("refreshed");
                    report.refreshed.push(refreshed);
                }
                Err(e) => {
                    metrics::record_key(e.kind());
                    error!(
                        industry = %key,
                        kind = e.kind(),
                        error = %e,
                        "Failed to update industry insights"
                    );

                    match self.settings.failure_policy {
                        FailurePolicy::Continue => report.failed.push(KeyFailure { key, error: e }),
                        FailurePolicy::Abort => {
                            warn!(
                                refreshed = report.refreshed.len(),
                                remaining = report.selected.len() - report.refreshed.len() - 1,
                                "Aborting insight refresh cycle"
                            );
                            return Err(e);
                        }
                    }
                }
            }
        }

        report.elapsed = start.elapsed();
        Ok(report)
    }
}
