//! Sliding window of recent transaction timestamps.
//!
//! The window is append-at-tail, trim-at-head. It is only ever trimmed
//! against the long spike horizon; shorter horizons are answered with
//! [`SlidingWindow::count_within`], which reads without mutating.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Ordered sequence of event timestamps, oldest first
#[derive(Debug, Clone, Default)]
pub struct SlidingWindow {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    /// Create a new empty window
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a timestamp at the tail.
    ///
    /// A timestamp older than the current tail is stored as the tail value
    /// so the sequence stays non-decreasing.
    pub fn record(&mut self, timestamp: DateTime<Utc>) {
        let timestamp = match self.timestamps.back() {
            Some(&newest) if timestamp < newest => newest,
            _ => timestamp,
        };
        self.timestamps.push_back(timestamp);
    }

    /// Remove every timestamp with `now - t > horizon` from the head.
    ///
    /// Stops at the first in-horizon entry. Returns the number removed.
    pub fn trim(&mut self, horizon: Duration, now: DateTime<Utc>) -> usize {
        let limit = to_time_delta(horizon);
        let mut removed = 0;

        while let Some(&oldest) = self.timestamps.front() {
            if now - oldest > limit {
                self.timestamps.pop_front();
                removed += 1;
            } else {
                break;
            }
        }

        removed
    }

    /// Current number of timestamps
    pub fn size(&self) -> usize {
        self.timestamps.len()
    }

    /// True when no timestamps are held
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Number of timestamps with `now - t <= horizon`, without trimming
    pub fn count_within(&self, horizon: Duration, now: DateTime<Utc>) -> usize {
        let limit = to_time_delta(horizon);
        let first_in_horizon = self.timestamps.partition_point(|&t| now - t > limit);
        self.timestamps.len() - first_in_horizon
    }

    /// Timestamp at the head, if any
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.front().copied()
    }

    /// Timestamp at the tail, if any
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.back().copied()
    }
}

fn to_time_delta(horizon: Duration) -> TimeDelta {
    TimeDelta::from_std(horizon).unwrap_or(TimeDelta::MAX)
}

/// Mutex-guarded owner of the shared [`SlidingWindow`].
///
/// The ingestion consumer is its only writer and the spike detector its only
/// reader. Both go through a single lock, so a detector read never observes
/// a half-applied append and trim.
#[derive(Debug)]
pub struct WindowStore {
    window: Mutex<SlidingWindow>,
    retention: Duration,
}

impl WindowStore {
    /// Create an empty store that retains timestamps for `retention`
    pub fn new(retention: Duration) -> Self {
        Self {
            window: Mutex::new(SlidingWindow::new()),
            retention,
        }
    }

    /// Horizon the store trims to on every record
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append `timestamp` and trim against the retention horizon in one step.
    ///
    /// A timestamp ahead of `now` is stored as `now`, so a future tail can
    /// never hold later entries above it or stall trimming. Returns the
    /// number of stale timestamps removed.
    pub fn record(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> usize {
        let mut window = self.lock();
        window.record(timestamp.min(now));
        window.trim(self.retention, now)
    }

    /// Run `f` against a consistent view of the window
    pub fn read<R>(&self, f: impl FnOnce(&SlidingWindow) -> R) -> R {
        f(&self.lock())
    }

    /// Current number of stored timestamps
    pub fn size(&self) -> usize {
        self.lock().size()
    }

    // A panic while holding the lock cannot leave the deque half-written in
    // a way that breaks ordering, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SlidingWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: i64) -> TimeDelta {
        TimeDelta::seconds(s)
    }

    fn window_from_ages(now: DateTime<Utc>, ages_secs: &[i64]) -> SlidingWindow {
        let mut window = SlidingWindow::new();
        for &age in ages_secs {
            window.record(now - secs(age));
        }
        window
    }

    #[test]
    fn test_trim_removes_only_stale_prefix() {
        let now = Utc::now();
        let mut window = window_from_ages(now, &[120, 90, 61, 60, 30, 0]);

        let removed = window.trim(Duration::from_secs(60), now);

        assert_eq!(removed, 3);
        assert_eq!(window.size(), 3);
        // An entry exactly at the horizon is kept
        assert_eq!(window.oldest(), Some(now - secs(60)));
    }

    #[test]
    fn test_trim_postcondition_holds() {
        let now = Utc::now();
        let ages: Vec<i64> = (0..200).rev().map(|i| i * 7).collect();
        let original = window_from_ages(now, &ages);
        let horizon = Duration::from_secs(300);

        let mut window = original.clone();
        let removed = window.trim(horizon, now);

        let limit = to_time_delta(horizon);
        assert!(window.timestamps.iter().all(|&t| now - t <= limit));
        assert!(original
            .timestamps
            .iter()
            .take(removed)
            .all(|&t| now - t > limit));
        assert_eq!(removed + window.size(), original.size());
    }

    #[test]
    fn test_trim_is_idempotent() {
        let now = Utc::now();
        let mut window = window_from_ages(now, &[500, 400, 100, 10]);
        let horizon = Duration::from_secs(200);

        window.trim(horizon, now);
        let once: Vec<_> = window.timestamps.iter().copied().collect();
        let removed_again = window.trim(horizon, now);

        assert_eq!(removed_again, 0);
        assert_eq!(window.timestamps.iter().copied().collect::<Vec<_>>(), once);
    }

    #[test]
    fn test_trim_with_larger_horizon_is_noop() {
        let now = Utc::now();
        let mut window = window_from_ages(now, &[500, 400, 100, 10]);
        window.trim(Duration::from_secs(450), now);
        assert_eq!(window.size(), 3);

        assert_eq!(window.trim(Duration::from_secs(3600), now), 0);
        assert_eq!(window.size(), 3);
    }

    #[test]
    fn test_trim_empty_window() {
        let mut window = SlidingWindow::new();
        assert_eq!(window.trim(Duration::from_secs(1), Utc::now()), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn test_count_within_does_not_mutate() {
        let now = Utc::now();
        let window = window_from_ages(now, &[3000, 1200, 600, 599, 300, 0]);

        assert_eq!(window.count_within(Duration::from_secs(600), now), 4);
        assert_eq!(window.count_within(Duration::from_secs(3600), now), 6);
        assert_eq!(window.count_within(Duration::from_secs(0), now), 1);
        assert_eq!(window.size(), 6);
    }

    #[test]
    fn test_record_keeps_order_on_clock_regression() {
        let now = Utc::now();
        let mut window = SlidingWindow::new();
        window.record(now);
        window.record(now - secs(5));

        assert_eq!(window.size(), 2);
        assert_eq!(window.oldest(), Some(now));
        assert_eq!(window.newest(), Some(now));
    }

    #[test]
    fn test_store_record_trims_to_retention() {
        let store = WindowStore::new(Duration::from_secs(60));
        let now = Utc::now();

        store.record(now - secs(100), now - secs(100));
        store.record(now - secs(50), now - secs(50));
        assert_eq!(store.size(), 2);

        let removed = store.record(now, now);
        assert_eq!(removed, 1);
        assert_eq!(store.size(), 2);
        assert_eq!(store.read(|w| w.oldest()), Some(now - secs(50)));
    }

    #[test]
    fn test_store_clamps_future_timestamps() {
        let store = WindowStore::new(Duration::from_secs(3600));
        let start = Utc::now();
        let far_future = DateTime::parse_from_rfc3339("2999-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        store.record(far_future, start);
        assert_eq!(store.read(|w| w.newest()), Some(start));

        // Two hours of steady 1/s traffic afterwards
        for i in 1..=7200 {
            let now = start + secs(i);
            store.record(now, now);
        }
        let end = start + secs(7200);

        // The future-dated entry aged out like any other
        assert_eq!(store.size(), 3601);
        assert_eq!(store.read(|w| w.oldest()), Some(end - secs(3600)));
        assert_eq!(
            store.read(|w| w.count_within(Duration::from_secs(1), end)),
            2
        );
    }
}
