//! Insight Service - Main entry point
//!
//! Keeps the `industry_insights` table fresh by regenerating stale rows with
//! Gemini.
//!
//! # Modes
//! - `scheduled` (default): run refresh cycles on `REFRESH_SCHEDULE` until ctrl-c
//! - `once`: run a single cycle and exit (for Kubernetes CronJob deployments)

use anyhow::Result;
use insight_service::{
    db, run_schedule_loop, Config, CycleLock, CycleOutcome, GeminiClient, InsightRefreshJob,
    LocalCycleLock, PgInsightStore, RedisCycleLock, RefreshSettings,
};
use std::env;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Service run mode
#[derive(Debug, Clone, PartialEq)]
enum RunMode {
    /// Default: cron-driven refresh loop
    Scheduled,
    /// Single cycle, then exit
    Once,
}

impl RunMode {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();

        for i in 0..args.len() {
            if args[i] == "--mode" && i + 1 < args.len() {
                return match args[i + 1].as_str() {
                    "once" => RunMode::Once,
                    "scheduled" => RunMode::Scheduled,
                    _ => {
                        warn!("Unknown mode '{}', using default 'scheduled'", args[i + 1]);
                        RunMode::Scheduled
                    }
                };
            }
        }

        RunMode::Scheduled
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "insight_service=debug,sqlx=warn,info".into());
    let json = env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mode = RunMode::from_args();
    info!("Starting Insight Service in {:?} mode", mode);

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    config.validate()?;

    info!(
        model = %config.gemini_model,
        interval_days = config.refresh_interval_days,
        schedule = %config.refresh_schedule,
        failure_policy = ?config.refresh_failure_policy,
        "Configuration loaded"
    );

    let pool = db::connect_pool(&config.database()).await.map_err(|e| {
        error!("Failed to connect to database: {}", e);
        anyhow::anyhow!("Database connection error: {}", e)
    })?;

    let generator = GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
        config.generation_timeout(),
    )?;
    info!(model = %generator.model(), "Gemini client initialized");

    let lock: Arc<dyn CycleLock> = match &config.redis_url {
        Some(url) => {
            let lock =
                RedisCycleLock::connect(url, config.refresh_lock_key.clone(), config.lock_ttl())
                    .await?;
            info!(lock_key = %config.refresh_lock_key, "Using Redis cycle lock");
            Arc::new(lock)
        }
        None => {
            warn!("REDIS_URL not set, cycles are only guarded within this process");
            Arc::new(LocalCycleLock::new(config.refresh_lock_key.clone()))
        }
    };

    let settings = RefreshSettings {
        interval: config.refresh_interval()?,
        generation_timeout: config.generation_timeout(),
        failure_policy: config.refresh_failure_policy,
    };

    let job = Arc::new(InsightRefreshJob::new(
        Arc::new(PgInsightStore::new(pool)),
        Arc::new(generator),
        lock,
        settings,
    ));

    match mode {
        RunMode::Once => run_once_mode(job).await,
        RunMode::Scheduled => run_scheduled_mode(job, &config).await,
    }
}

/// Run a single cycle - exits non-zero when any industry failed
async fn run_once_mode(job: Arc<InsightRefreshJob>) -> Result<()> {
    match job.run_cycle().await {
        Ok(CycleOutcome::Completed(report)) => {
            info!(
                selected = report.selected.len(),
                refreshed = report.refreshed.len(),
                failed = report.failed.len(),
                elapsed_ms = report.elapsed.as_millis(),
                "Insight refresh completed"
            );

            for failure in &report.failed {
                error!(
                    industry = %failure.key,
                    kind = failure.error.kind(),
                    error = %failure.error,
                    "Industry refresh failed"
                );
            }

            if !report.is_clean() {
                anyhow::bail!(
                    "{} of {} industries failed to refresh",
                    report.failed.len(),
                    report.selected.len()
                );
            }
            Ok(())
        }
        Ok(CycleOutcome::Skipped) => {
            warn!("Another refresh cycle is running, nothing to do");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Insight refresh aborted");
            Err(e.into())
        }
    }
}

/// Run the cron loop until ctrl-c
async fn run_scheduled_mode(job: Arc<InsightRefreshJob>, config: &Config) -> Result<()> {
    let schedule = config.schedule()?;
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let loop_handle = tokio::spawn(run_schedule_loop(job, schedule, shutdown_rx));

    info!("Insight Service ready");

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");

    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        error!(error = %e, "Refresh loop task panicked");
    }

    info!("Shutting down Insight Service");

    Ok(())
}
