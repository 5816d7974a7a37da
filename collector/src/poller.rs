//! # Poller
//!
//! Fetches the status document on a fixed cadence, resolves it into a
//! [`Sample`] and appends that to the [`WindowStore`].
//!
//! A failed cycle (transport error, timeout, bad status, malformed JSON)
//! appends nothing; it only replaces the failure recorded in [`PollStatus`].
//! The loop keeps its interval regardless of failures. Cycles never overlap:
//! when a fetch overruns the interval the next cycle starts right after it.

use crate::{
    fetcher::{
        FailureKind,
        Fetcher,
        PollError,
    },
    handle::MetricsHandle,
    metrics::{
        MetricTable,
        Sample,
    },
    resolver::resolve,
    window::WindowStore,
};
use chrono::{
    DateTime,
    TimeDelta,
    Utc,
};
use serde::Serialize;
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollFailure {
    pub kind: FailureKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl PollFailure {
    pub fn new(error: &PollError, at: DateTime<Utc>) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            at,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Sample(Arc<Sample>),
    Failure(PollFailure),
}

/// What readers can observe about the poll loop besides the window itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollStatus {
    pub cycles: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<PollFailure>,
    pub consecutive_failures: u64,
}

impl PollStatus {
    fn record(&mut self, outcome: &PollOutcome) {
        self.cycles += 1;
        match outcome {
            PollOutcome::Sample(sample) => {
                self.last_success = Some(sample.fetched_at);
                self.consecutive_failures = 0;
            }
            PollOutcome::Failure(failure) => {
                self.last_failure = Some(failure.clone());
                self.consecutive_failures += 1;
            }
        }
    }

    /// True when the most recent cycle produced no sample.
    pub fn latest_cycle_failed(&self) -> bool {
        self.consecutive_failures > 0
    }
}

pub struct Poller<F> {
    fetcher: F,
    table: Arc<MetricTable>,
    window: Arc<WindowStore>,
    interval: Duration,
    fetch_timeout: Duration,
    status: watch::Sender<PollStatus>,
}

impl<F: Fetcher + 'static> Poller<F> {
    pub fn new(
        fetcher: F,
        table: Arc<MetricTable>,
        window: Arc<WindowStore>,
        interval: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        let (status, _) = watch::channel(PollStatus::default());
        Self {
            fetcher,
            table,
            window,
            interval,
            fetch_timeout,
            status,
        }
    }

    /// Read-only view for the serving side.
    pub fn handle(&self) -> MetricsHandle {
        MetricsHandle::new(self.window.clone(), self.status.subscribe())
    }

    /// Runs a single fetch-parse-resolve-store cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        let previous = self.window.latest().map(|sample| sample.fetched_at);
        let fetched_at = fetch_time(Utc::now(), previous);
        let outcome = match self.fetch_document().await {
            Ok(raw) => {
                let values = resolve(&raw, fetched_at, &self.table);
                PollOutcome::Sample(Arc::new(Sample::new(fetched_at, raw, values)))
            }
            Err(error) => PollOutcome::Failure(PollFailure::new(&error, fetched_at)),
        };
        // Readers hold the status while reading the window, so the append and
        // the status change become visible together.
        self.status.send_modify(|status| {
            if let PollOutcome::Sample(sample) = &outcome {
                self.window.append(sample.clone());
            }
            status.record(&outcome);
        });
        outcome
    }

    async fn fetch_document(&self) -> Result<serde_json::Value, PollError> {
        let body = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch())
            .await
            .map_err(|_| PollError::Timeout(self.fetch_timeout))??;
        serde_json::from_str(&body).map_err(|e| PollError::Parse(e.to_string()))
    }

    /// Polls until `cancel` fires. An in-flight fetch is dropped on
    /// cancellation; it has not touched the window at that point.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval = ?self.interval,
            fetch_timeout = ?self.fetch_timeout,
            metrics = self.table.len(),
            capacity = self.window.capacity(),
            "Poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.poll_once() => log_outcome(&outcome),
            }
        }

        info!("Poller stopped");
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}

/// Keeps fetch times strictly increasing at millisecond resolution when the
/// wall clock steps backwards.
fn fetch_time(now: DateTime<Utc>, previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match previous {
        Some(previous) if now <= previous => previous + TimeDelta::milliseconds(1),
        _ => now,
    }
}

fn log_outcome(outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Sample(sample) => {
            let unresolved = sample.unresolved().collect::<Vec<_>>();
            debug!(
                fetched_at = %sample.fetched_at,
                metrics = sample.values.len(),
                unresolved = unresolved.len(),
                "Poll succeeded"
            );
            for (metric, reason) in unresolved {
                trace!(metric, %reason, "Metric unresolved");
            }
        }
        PollOutcome::Failure(failure) => {
            warn!(kind = %failure.kind, error = %failure.message, "Poll failed");
        }
    }
}
