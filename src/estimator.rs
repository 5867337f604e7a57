//! Remaining-time estimate from the average time per completed item.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Estimate {
    /// Nothing completed yet.
    Calculating,
    Remaining(Duration),
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calculating => write!(f, "calculating..."),
            Self::Remaining(d) => write!(f, "{}", format_remaining(*d)),
        }
    }
}

/// Coarse rendering: only the highest non-zero unit pair is shown.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// `(total - completed) * (elapsed / completed)`.
pub fn estimate(total: usize, completed: usize, elapsed: Duration) -> Estimate {
    if completed == 0 {
        return Estimate::Calculating;
    }
    let per_item = elapsed.as_secs_f64() / completed as f64;
    let remaining = total.saturating_sub(completed) as f64 * per_item;
    Estimate::Remaining(Duration::from_secs_f64(remaining))
}

#[derive(Debug, Default)]
pub struct ProgressEstimator {
    started: Option<Instant>,
    total: usize,
    completed: usize,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, total: usize) {
        self.started = Some(Instant::now());
        self.total = total;
        self.completed = 0;
    }

    /// Record the worker's completed count and return a fresh estimate.
    pub fn record(&mut self, completed: usize) -> Estimate {
        self.completed = completed;
        match self.started {
            Some(started) => estimate(self.total, self.completed, started.elapsed()),
            None => Estimate::Calculating,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_ten_after_ten_seconds_leaves_forty() {
        let est = estimate(10, 2, Duration::from_secs(10));
        assert_eq!(est, Estimate::Remaining(Duration::from_secs(40)));
        assert_eq!(est.to_string(), "40s");
    }

    #[test]
    fn nothing_completed_is_indeterminate() {
        assert_eq!(estimate(10, 0, Duration::from_secs(30)), Estimate::Calculating);
        assert_eq!(Estimate::Calculating.to_string(), "calculating...");

        let mut estimator = ProgressEstimator::new();
        assert_eq!(estimator.record(3), Estimate::Calculating);
    }

    #[test]
    fn rendering_keeps_highest_unit_pair() {
        assert_eq!(format_remaining(Duration::from_secs(59)), "59s");
        assert_eq!(format_remaining(Duration::from_secs(192)), "3m 12s");
        assert_eq!(format_remaining(Duration::from_secs(2 * 3600 + 5 * 60 + 9)), "2h 5m");
        assert_eq!(format_remaining(Duration::from_secs(3600)), "1h 0m");
        assert_eq!(format_remaining(Duration::ZERO), "0s");
    }

    #[test]
    fn finished_batch_has_nothing_remaining() {
        assert_eq!(
            estimate(4, 4, Duration::from_secs(20)),
            Estimate::Remaining(Duration::ZERO)
        );
    }

    #[test]
    fn started_estimator_produces_an_estimate() {
        let mut estimator = ProgressEstimator::new();
        estimator.start(5);
        assert!(matches!(estimator.record(1), Estimate::Remaining(_)));
    }
}
