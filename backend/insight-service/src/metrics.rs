//! Insight Refresh Metrics
//!
//! Prometheus metrics for the insight refresh cycle

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};
use std::time::Duration;

static CYCLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insight_refresh_cycles_total",
        "Refresh cycles by outcome (completed/aborted/skipped/error)",
        &["outcome"]
    )
    .expect("Failed to register insight refresh cycles metric")
});

static KEYS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "insight_refresh_keys_total",
        "Per-industry refresh results",
        &["result"]
    )
    .expect("Failed to register insight refresh keys metric")
});

static GENERATION_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "insight_generation_duration_seconds",
        "Latency of insight generation calls",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    )
    .expect("Failed to register insight generation duration metric")
});

static CYCLE_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "insight_refresh_cycle_duration_seconds",
        "Duration of a full refresh cycle",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 1800.0, 3600.0]
    )
    .expect("Failed to register insight refresh cycle duration metric")
});

static DUE_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "insight_refresh_due_records",
        "Number of due records selected by the last cycle"
    )
    .expect("Failed to register insight due records metric")
});

pub fn record_cycle(outcome: &str, duration: Duration) {
    CYCLES_TOTAL.with_label_values(&[outcome]).inc();
    CYCLE_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_skipped_cycle() {
    CYCLES_TOTAL.with_label_values(&["skipped"]).inc();
}

/// `result` is "refreshed" or an error kind
pub fn record_key(result: &str) {
    KEYS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_generation_duration(duration: Duration) {
    GENERATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn set_due_records(count: usize) {
    DUE_RECORDS.set(count as i64);
}

/// Counter value, for tests and diagnostics
pub fn key_count(result: &str) -> u64 {
    KEYS_TOTAL.with_label_values(&[result]).get()
}
