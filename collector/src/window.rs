//! Bounded, time-ordered history of samples.
//!
//! The poller is the only writer. Readers get owned snapshots, so a later
//! append or eviction never changes what a reader already holds.

use crate::metrics::Sample;
use chrono::Duration as ChronoDuration;
use std::{
    collections::{
        BTreeMap,
        VecDeque,
    },
    sync::{
        Arc,
        PoisonError,
        RwLock,
    },
    time::Duration,
};

#[derive(Debug)]
pub struct WindowStore {
    samples: RwLock<VecDeque<Arc<Sample>>>,
    capacity: usize,
    retention: Option<ChronoDuration>,
}

impl WindowStore {
    /// Creates an empty window holding at most `capacity` samples.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be at least 1");
        Self {
            samples: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            retention: None,
        }
    }

    /// Additionally evicts samples fetched more than `retention` before the
    /// newest one.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = ChronoDuration::from_std(retention).ok();
        self
    }

    /// Appends `sample`, evicting from the front to stay within capacity.
    ///
    /// Samples are expected in increasing `fetched_at` order; the poller
    /// guarantees this even if the wall clock steps back.
    pub fn append(&self, sample: impl Into<Arc<Sample>>) {
        let sample = sample.into();
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);

        while samples.len() >= self.capacity {
            samples.pop_front();
        }
        if let Some(retention) = self.retention {
            let cutoff = sample.fetched_at - retention;
            while samples.front().is_some_and(|oldest| oldest.fetched_at < cutoff) {
                samples.pop_front();
            }
        }
        samples.push_back(sample);
    }

    /// The most recently appended sample, `None` before the first append.
    pub fn latest(&self) -> Option<Arc<Sample>> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .back()
            .cloned()
    }

    /// Snapshot of the whole window, oldest first.
    pub fn all(&self) -> Vec<Arc<Sample>> {
        self.samples
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Per-metric `(timestamp in ms, value)` points, skipping unresolved values.
    pub fn series(&self) -> BTreeMap<String, Vec<(i64, f64)>> {
        let mut series = BTreeMap::<String, Vec<(i64, f64)>>::new();
        for sample in self.all() {
            let ts = sample.timestamp_ms();
            for (name, value) in &sample.values {
                let points = series.entry(name.clone()).or_default();
                if let Some(value) = value.value() {
                    points.push((ts, value));
                }
            }
        }
        series
    }

    pub fn len(&self) -> usize {
        self.samples.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        MetricValue,
        UnresolvedReason,
    };
    use chrono::{
        DateTime,
        Utc,
    };
    use pretty_assertions::assert_eq;

    fn sample(secs: i64) -> Arc<Sample> {
        let values = BTreeMap::from([
            ("Workers".to_string(), MetricValue::Resolved(secs as f64)),
            (
                "Age".to_string(),
                MetricValue::Unresolved(UnresolvedReason::FutureTimestamp),
            ),
        ]);
        Arc::new(Sample::new(
            DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
            serde_json::json!({ "workers": secs }),
            values,
        ))
    }

    #[test]
    fn empty_window() {
        let window = WindowStore::new(3);
        assert!(window.latest().is_none());
        assert!(window.all().is_empty());
        assert!(window.is_empty());
    }

    #[test]
    fn evicts_oldest_when_full() {
        let window = WindowStore::new(3);
        let samples = (1..=4).map(sample).collect::<Vec<_>>();
        for s in &samples {
            window.append(s.clone());
        }

        assert_eq!(window.all(), samples[1..].to_vec());
        assert_eq!(window.latest(), Some(samples[3].clone()));
        assert_eq!(window.len(), 3);
    }

    #[test]
    fn snapshots_do_not_follow_later_appends() {
        let window = WindowStore::new(2);
        window.append(sample(1));
        window.append(sample(2));
        let snapshot = window.all();

        window.append(sample(3));

        assert_eq!(snapshot, vec![sample(1), sample(2)]);
        assert_eq!(window.all(), vec![sample(2), sample(3)]);
    }

    #[test]
    fn capacity_of_one_keeps_latest() {
        let window = WindowStore::new(1);
        for secs in 0..10 {
            window.append(sample(secs));
            assert_eq!(window.len(), 1);
        }
        assert_eq!(window.latest(), Some(sample(9)));
    }

    #[test]
    fn retention_drops_old_samples() {
        let window = WindowStore::new(100).with_retention(Duration::from_secs(60));
        for secs in [0, 30, 61, 90, 125] {
            window.append(sample(secs));
        }
        let kept = window.all().iter().map(|s| s.fetched_at.timestamp()).collect::<Vec<_>>();
        assert_eq!(kept, vec![90, 125]);
    }

    #[test]
    fn series_skips_unresolved_points() {
        let window = WindowStore::new(5);
        window.append(sample(1));
        window.append(sample(2));

        let series = window.series();
        assert_eq!(series["Workers"], vec![(1000, 1.0), (2000, 2.0)]);
        assert_eq!(series["Age"], Vec::<(i64, f64)>::new());
    }

    #[test]
    fn concurrent_readers_see_whole_windows() {
        let window = Arc::new(WindowStore::new(4));
        let readers = (0..4)
            .map(|_| {
                let window = window.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let snapshot = window.all();
                        assert!(snapshot.len() <= 4);
                        assert!(snapshot.windows(2).all(|w| w[0].fetched_at < w[1].fetched_at));
                    }
                })
            })
            .collect::<Vec<_>>();

        for secs in 0..1000 {
            window.append(sample(secs));
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(window.latest(), Some(sample(999)));
    }
}
