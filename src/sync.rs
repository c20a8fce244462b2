//! Synchronizer
//!
//! Drives one run of the pipeline:
//!
//! ```text
//! Unauthenticated --authenticate--> Authenticated --list workspaces--> Draining --> Finished
//! ```
//!
//! Each (workspace, cluster) pair is fetched and then published before the
//! next pair is touched. A pair whose quota cannot be fetched is logged and
//! skipped; any other failure ends the run. Nothing survives between runs:
//! every call to [`Synchronizer::run`] authenticates again.

use std::fmt;
use std::time::{Duration, Instant};

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{FetchError, SyncError};
use crate::http::HttpClient;
use crate::kubesphere::{fetch_quota, list_workspaces, Credentials, Session};
use crate::metrics;
use crate::normalize::FallbackUsage;
use crate::publisher::{EventSink, Publisher};

/// Where a run is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Unauthenticated,
    Authenticated,
    Draining,
    Finished,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Unauthenticated => "unauthenticated",
            RunPhase::Authenticated => "authenticated",
            RunPhase::Draining => "draining",
            RunPhase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// A pair whose quota could not be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPair {
    pub workspace: String,
    pub cluster: String,
    /// Failure class: `transport`, `status` or `decode`
    pub kind: &'static str,
    pub reason: String,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub workspaces: usize,
    pub unplaced_workspaces: usize,
    pub published: usize,
    pub skipped: Vec<SkippedPair>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Run options beyond the control-plane target
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub fallback: FallbackUsage,
    /// Turn skipped pairs into a run failure after the drain
    pub fail_on_skipped: bool,
}

/// Pipeline orchestrator
///
/// Holds what lives across runs (HTTP client, credentials, bus publisher);
/// the session only exists inside [`Synchronizer::run`].
pub struct Synchronizer<S> {
    http: HttpClient,
    base_url: String,
    credentials: Credentials,
    publisher: Publisher<S>,
    options: SyncOptions,
}

impl<S: EventSink> Synchronizer<S> {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        credentials: Credentials,
        publisher: Publisher<S>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            credentials,
            publisher,
            options: SyncOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn publisher(&self) -> &Publisher<S> {
        &self.publisher
    }

    /// Run the pipeline once
    ///
    /// # Errors
    ///
    /// Fails on authentication, enumeration or publication errors, and on
    /// skipped pairs when `fail_on_skipped` is set.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync_run", %run_id);
        let started = Instant::now();

        let result = self.drive(started).instrument(span).await;

        metrics::RUN_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(_) => {
                metrics::SYNC_RUNS_TOTAL.with_label_values(&["success"]).inc();
                metrics::LAST_SUCCESS_TIMESTAMP_SECONDS.set(chrono::Utc::now().timestamp() as f64);
            }
            Err(e) => {
                metrics::SYNC_RUNS_TOTAL.with_label_values(&["failure"]).inc();
                warn!(%run_id, phase = %e.phase(), error = %e, "run failed");
            }
        }
        result
    }

    async fn drive(&self, started: Instant) -> Result<RunReport, SyncError> {
        let mut phase = RunPhase::Unauthenticated;
        info!(%phase, host = %self.base_url, "starting run");

        let session = Session::establish(&self.http, &self.base_url, &self.credentials).await?;
        phase = RunPhase::Authenticated;
        info!(%phase, "session established");

        let placements = list_workspaces(&self.http, &session).await?;
        phase = RunPhase::Draining;
        info!(%phase, workspaces = placements.len(), "draining workspaces");

        let mut report = RunReport {
            workspaces: placements.len(),
            ..Default::default()
        };

        for placement in &placements {
            if !placement.is_placed() {
                info!(workspace = %placement.workspace, "workspace has no cluster placement, skipping");
                report.unplaced_workspaces += 1;
                continue;
            }

            for cluster in &placement.clusters {
                let snapshot = match fetch_quota(
                    &self.http,
                    &session,
                    &placement.workspace,
                    cluster,
                    &self.options.fallback,
                )
                .await
                {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        self.record_skip(&mut report, &placement.workspace, cluster, &e);
                        continue;
                    }
                };

                self.publisher
                    .publish(snapshot)
                    .await
                    .map_err(|source| SyncError::Publish {
                        workspace: placement.workspace.clone(),
                        cluster: cluster.clone(),
                        source,
                    })?;
                report.published += 1;
            }
        }

        phase = RunPhase::Finished;
        report.elapsed = started.elapsed();
        info!(
            %phase,
            published = report.published,
            skipped = report.skipped.len(),
            unplaced = report.unplaced_workspaces,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run finished"
        );

        if self.options.fail_on_skipped && !report.is_complete() {
            return Err(SyncError::PairsSkipped(report.skipped.len()));
        }
        Ok(report)
    }

    fn record_skip(&self, report: &mut RunReport, workspace: &str, cluster: &str, error: &FetchError) {
        metrics::PAIRS_SKIPPED_TOTAL
            .with_label_values(&[error.reason()])
            .inc();
        warn!(%workspace, %cluster, reason = error.reason(), error = %error, "skipping pair");
        report.skipped.push(SkippedPair {
            workspace: workspace.to_string(),
            cluster: cluster.to_string(),
            kind: error.reason(),
            reason: error.to_string(),
        });
    }
}

/// Run `synchronizer` every `interval` until the process is stopped
///
/// A failed run is logged and the schedule continues.
pub async fn run_periodically<S: EventSink>(synchronizer: &Synchronizer<S>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Ok(report) = synchronizer.run().await {
            info!(
                published = report.published,
                skipped = report.skipped.len(),
                next_in_secs = interval.as_secs(),
                "scheduled run complete"
            );
        }
    }
}
