use crate::{
    metrics::Sample,
    poller::PollStatus,
    window::WindowStore,
};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    sync::Arc,
};
use tokio::sync::watch;

/// Everything a reader needs to tell "no sample yet" (`sample` is `None`),
/// "latest cycle failed" (`stale`, with the previous sample still present)
/// and "metric unresolved" (`null` in `sample.values`) apart.
#[derive(Debug, Clone, Serialize)]
pub struct LatestView {
    pub sample: Option<Arc<Sample>>,
    pub raw: Option<Arc<serde_json::Value>>,
    pub status: PollStatus,
    pub stale: bool,
}

/// Cloneable read side of the poller.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    window: Arc<WindowStore>,
    status: watch::Receiver<PollStatus>,
}

impl MetricsHandle {
    pub(crate) fn new(window: Arc<WindowStore>, status: watch::Receiver<PollStatus>) -> Self {
        Self { window, status }
    }

    pub fn latest(&self) -> LatestView {
        // The poller appends while holding the status, so reading both under
        // the same borrow never pairs a new sample with an old status.
        let (status, sample) = {
            let status = self.status.borrow();
            (status.clone(), self.window.latest())
        };
        LatestView {
            raw: sample.as_ref().map(|sample| sample.raw.clone()),
            sample,
            stale: status.latest_cycle_failed(),
            status,
        }
    }

    pub fn all(&self) -> Vec<Arc<Sample>> {
        self.window.all()
    }

    pub fn series(&self) -> BTreeMap<String, Vec<(i64, f64)>> {
        self.window.series()
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }
}
