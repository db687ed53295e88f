//! Event rate calculation

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Events per second for `count` events observed over `duration`.
///
/// `duration` comes from validated configuration and is never zero.
pub fn rate(count: usize, duration: Duration) -> f64 {
    debug_assert!(!duration.is_zero(), "rate duration must be positive");
    count as f64 / duration.as_secs_f64()
}

/// Which horizon a rate was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowName {
    /// Long spike window
    Baseline,
    /// Short compare window
    Compare,
}

impl WindowName {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowName::Baseline => "baseline",
            WindowName::Compare => "compare",
        }
    }
}

impl fmt::Display for WindowName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate computed during a single detection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSample {
    pub window: WindowName,
    /// Events per second
    pub rate: f64,
    pub computed_at: DateTime<Utc>,
}

impl RateSample {
    /// Compute the rate of `count` events over `duration`
    pub fn compute(
        window: WindowName,
        count: usize,
        duration: Duration,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            window,
            rate: rate(count, duration),
            computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate() {
        assert_eq!(rate(3600, Duration::from_secs(3600)), 1.0);
        assert_eq!(rate(900, Duration::from_secs(600)), 1.5);
        assert_eq!(rate(5, Duration::from_millis(500)), 10.0);
    }

    #[test]
    fn test_zero_count_is_zero_rate() {
        assert_eq!(rate(0, Duration::from_secs(600)), 0.0);
    }

    #[test]
    fn test_rate_is_monotonic_in_count() {
        let duration = Duration::from_secs(600);
        let rates: Vec<f64> = (0..1000).map(|count| rate(count, duration)).collect();
        assert!(rates.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_rate_sample() {
        let now = Utc::now();
        let sample = RateSample::compute(WindowName::Compare, 720, Duration::from_secs(600), now);

        assert_eq!(sample.window.as_str(), "compare");
        assert_eq!(sample.rate, 1.2);
        assert_eq!(sample.computed_at, now);
    }
}
