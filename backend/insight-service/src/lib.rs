//! Insight Service - scheduled refresh of industry insights
//!
//! This service provides:
//! - Staleness detection over the `industry_insights` table
//! - Insight regeneration through the Gemini generative language API
//! - Sanitation and validation of generated JSON before it is persisted
//! - A cron-driven refresh loop guarded against overlapping cycles

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod lock;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod providers;
pub mod staleness;

pub use config::{Config, DatabaseConfig};
pub use db::{InsightStore, MemoryInsightStore, PgInsightStore};
pub use error::{InsightError, Result};
pub use jobs::{
    run_schedule_loop, Clock, CycleOutcome, CycleReport, FailurePolicy, FixedClock,
    InsightRefreshJob, KeyFailure, RefreshSchedule, RefreshSettings, RefreshedInsight,
    SystemClock,
};
pub use lock::{CycleLock, LocalCycleLock, LockLease, RedisCycleLock};
pub use models::{DemandLevel, DueInsight, InsightPayload, InsightRecord, MarketOutlook, SalaryRange};
pub use parser::{parse_insight_payload, strip_code_fences};
pub use prompt::build_insight_prompt;
pub use providers::{ContentGenerator, GeminiClient};
pub use staleness::{is_due, next_refresh_due, RefreshInterval};
