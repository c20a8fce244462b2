// Prometheus metrics for quota synchronization
//
// Exposed on /metrics when the daemon runs with metrics enabled:
// - Runs by outcome (counter)
// - Events published (counter)
// - Skipped workspace/cluster pairs by reason (counter)
// - Bus write retries (counter)
// - Run duration (histogram)
// - Last successful run (gauge)

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref SYNC_RUNS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_sync_runs_total", "Synchronization runs by outcome"),
        &["outcome"]
    ).expect("Failed to create sync runs metric");

    pub static ref EVENTS_PUBLISHED_TOTAL: IntCounter = IntCounter::new(
        "quota_sync_events_published_total",
        "Quota events written to the bus"
    ).expect("Failed to create events published metric");

    pub static ref PAIRS_SKIPPED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("quota_sync_pairs_skipped_total", "Workspace/cluster pairs skipped by reason"),
        &["reason"]
    ).expect("Failed to create pairs skipped metric");

    pub static ref PUBLISH_RETRIES_TOTAL: IntCounter = IntCounter::new(
        "quota_sync_publish_retries_total",
        "Bus writes retried after a failure"
    ).expect("Failed to create publish retries metric");

    pub static ref RUN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new("quota_sync_run_duration_seconds", "Duration of a synchronization run"),
    ).expect("Failed to create run duration metric");

    pub static ref LAST_SUCCESS_TIMESTAMP_SECONDS: Gauge = Gauge::new(
        "quota_sync_last_success_timestamp_seconds",
        "Unix time of the last successful run"
    ).expect("Failed to create last success metric");
}

/// Register all metrics - call once at startup
pub fn init() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SYNC_RUNS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EVENTS_PUBLISHED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PAIRS_SKIPPED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PUBLISH_RETRIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RUN_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(LAST_SUCCESS_TIMESTAMP_SECONDS.clone()))?;
    Ok(())
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_are_gathered() {
        // May fail if another test registered first, which is fine
        let _ = init();

        SYNC_RUNS_TOTAL.with_label_values(&["success"]).inc();
        PAIRS_SKIPPED_TOTAL.with_label_values(&["status"]).inc();

        let text = gather_metrics().unwrap();
        assert!(text.contains("quota_sync_runs_total"));
        assert!(text.contains("quota_sync_pairs_skipped_total"));
    }

    #[test]
    fn test_counters_increase() {
        let before = EVENTS_PUBLISHED_TOTAL.get();
        EVENTS_PUBLISHED_TOTAL.inc();
        assert!(EVENTS_PUBLISHED_TOTAL.get() > before);
    }
}
