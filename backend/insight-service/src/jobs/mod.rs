//! Background jobs
//!
//! The insight refresh cycle and the cron loop that triggers it.
//!
//! - **Sequential**: due industries are refreshed one at a time, oldest-due first
//! - **Idempotent**: a failed industry keeps its timestamps and is picked up
//!   again by the next cycle
//! - **Non-overlapping**: every cycle runs under a `CycleLock`
//! - **Graceful shutdown**: the loop stops between cycles on the shutdown signal

pub mod insight_refresh;
pub mod schedule;

pub use insight_refresh::{
    CycleOutcome, CycleReport, InsightRefreshJob, KeyFailure, RefreshSettings, RefreshedInsight,
};
pub use schedule::RefreshSchedule;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// What a cycle does after one industry fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next industry
    #[default]
    Continue,
    /// Stop the cycle and return the failure
    Abort,
}

/// Time source for refresh timestamps
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run refresh cycles on `schedule` until shutdown
///
/// Cycle errors are logged and never stop the loop; the failed industries
/// stay due and are retried on the next trigger. A running cycle is allowed
/// to finish before shutdown is observed.
pub async fn run_schedule_loop(
    job: Arc<InsightRefreshJob>,
    schedule: RefreshSchedule,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(schedule = %schedule.expression(), "Starting insight refresh loop");

    loop {
        let now = Utc::now();
        let Some(next_run) = schedule.next_after(now) else {
            error!(schedule = %schedule.expression(), "Schedule has no upcoming runs, stopping");
            break;
        };
        let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);

        info!(
            next_run = %next_run,
            wait_sec = wait.as_secs(),
            "Next insight refresh scheduled"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                match job.run_cycle().await {
                    Ok(CycleOutcome::Completed(report)) => {
                        if report.failed.is_empty() {
                            info!(
                                refreshed = report.refreshed.len(),
                                elapsed_ms = report.elapsed.as_millis(),
                                "Insight refresh cycle completed"
                            );
                        } else {
                            warn!(
                                refreshed = report.refreshed.len(),
                                failed = report.failed.len(),
                                failed_industries = ?report.failed_keys(),
                                "Insight refresh cycle completed with failures"
                            );
                        }
                    }
                    Ok(CycleOutcome::Skipped) => {
                        warn!("Insight refresh cycle skipped, another cycle holds the lock");
                    }
                    Err(e) => {
                        error!(
                            error = %e,
                            kind = e.kind(),
                            "Insight refresh cycle failed, will retry on next schedule"
                        );
                    }
                }
            }
            _ = shutdown.recv() => {
                info!("Received shutdown signal, stopping insight refresh loop");
                break;
            }
        }
    }

    info!("Insight refresh loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryInsightStore;
    use crate::error::{InsightError, Result};
    use crate::lock::LocalCycleLock;
    use crate::models::fixtures::sample_payload;
    use crate::models::InsightRecord;
    use crate::providers::ContentGenerator;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Generator that always fails and counts its calls
    #[derive(Default)]
    struct FailingGenerator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InsightError::generation("upstream unavailable"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_schedule_loop_survives_errors_and_stops_on_shutdown() {
        let now = Utc::now();
        let store = Arc::new(MemoryInsightStore::with_records(vec![InsightRecord {
            key: "tech".to_string(),
            payload: sample_payload(),
            last_refreshed_at: now - chrono::Duration::days(30),
            next_refresh_due: now - chrono::Duration::days(23),
        }]));
        let generator = Arc::new(FailingGenerator::default());
        // Abort makes every cycle return an error
        let settings = RefreshSettings {
            failure_policy: FailurePolicy::Abort,
            ..Default::default()
        };
        let job = Arc::new(InsightRefreshJob::new(
            store,
            generator.clone(),
            Arc::new(LocalCycleLock::new("insight-refresh")),
            settings,
        ));

        let schedule = RefreshSchedule::parse("* * * * * *").unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_schedule_loop(job, schedule, shutdown_rx));

        let ran_twice = tokio::time::timeout(Duration::from_secs(10), async {
            while generator.calls.load(Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        assert!(ran_twice.is_ok(), "loop stopped after a failed cycle");
        assert!(!handle.is_finished());

        shutdown_tx.send(()).unwrap();
        let stopped = tokio::time::timeout(Duration::from_secs(3), handle).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[test]
    fn test_failure_policy_default() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Continue);
    }

    #[test]
    fn test_fixed_clock() {
        let t = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(t);
        assert_eq!(clock.now(), t);

        clock.advance(chrono::Duration::days(1));
        assert_eq!(clock.now(), t + chrono::Duration::days(1));

        clock.set(t);
        assert_eq!(clock.now(), t);
    }
}
