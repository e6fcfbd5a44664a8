//! Tap-tempo estimation from manual taps.
//!
//! Deliberately uses wall-clock `Instant` values passed directly by the
//! caller rather than [`crate::clock::TimeSource`] — taps are a human
//! input signal, not something the scheduler needs to rebase or mock
//! independently of real time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::timing::{MAX_BPM, MIN_BPM};

const TAP_HISTORY_WINDOW: Duration = Duration::from_secs(2);
const MAX_TAP_HISTORY: usize = 4;

/// Ring buffer of recent tap timestamps, each no older than 2 seconds.
pub struct TapHistory {
    taps: VecDeque<Instant>,
}

impl TapHistory {
    pub fn new() -> Self {
        Self { taps: VecDeque::with_capacity(MAX_TAP_HISTORY) }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.taps.front() {
            if now.duration_since(front) > TAP_HISTORY_WINDOW {
                self.taps.pop_front();
            } else {
                break;
            }
        }
    }

    fn push(&mut self, now: Instant) {
        if self.taps.len() == MAX_TAP_HISTORY {
            self.taps.pop_front();
        }
        self.taps.push_back(now);
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}

impl Default for TapHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a sequence of manual taps into a BPM estimate.
pub struct TapTempoEstimator {
    history: TapHistory,
}

impl TapTempoEstimator {
    pub fn new() -> Self {
        Self { history: TapHistory::new() }
    }

    /// Register a tap at `now`, dropping entries older than 2 seconds
    /// first. Returns a new BPM estimate once at least two taps remain in
    /// the window, clamped to `[MIN_BPM, MAX_BPM]`.
    pub fn tap(&mut self, now: Instant) -> Option<u32> {
        self.history.prune(now);
        self.history.push(now);

        if self.history.taps.len() < 2 {
            return None;
        }

        let intervals: Vec<Duration> = self
            .history
            .taps
            .iter()
            .zip(self.history.taps.iter().skip(1))
            .map(|(a, b)| *b - *a)
            .collect();

        let total: Duration = intervals.iter().sum();
        let mean_interval_ms = total.as_secs_f64() * 1000.0 / intervals.len() as f64;
        if mean_interval_ms <= 0.0 {
            return None;
        }

        let bpm = (60_000.0 / mean_interval_ms).round() as i64;
        Some(bpm.clamp(MIN_BPM as i64, MAX_BPM as i64) as u32)
    }

    pub fn reset(&mut self) {
        self.history = TapHistory::new();
    }

    pub fn tap_count(&self) -> usize {
        self.history.len()
    }
}

impl Default for TapTempoEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tap_yields_no_estimate() {
        let mut estimator = TapTempoEstimator::new();
        assert_eq!(estimator.tap(Instant::now()), None);
    }

    #[test]
    fn test_two_taps_120bpm() {
        let mut estimator = TapTempoEstimator::new();
        let t0 = Instant::now();
        estimator.tap(t0);
        let bpm = estimator.tap(t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(bpm, 120);
    }

    #[test]
    fn test_stale_taps_pruned_after_2s() {
        let mut estimator = TapTempoEstimator::new();
        let t0 = Instant::now();
        estimator.tap(t0);
        // This tap is more than 2s after t0, so t0 should be pruned,
        // leaving only one tap in the window (no estimate yet).
        let result = estimator.tap(t0 + Duration::from_millis(2500));
        assert_eq!(result, None);
        assert_eq!(estimator.tap_count(), 1);
    }

    #[test]
    fn test_bpm_clamped_to_bounds() {
        let mut estimator = TapTempoEstimator::new();
        let t0 = Instant::now();
        estimator.tap(t0);
        // 50ms apart implies 1200 BPM, clamped down to MAX_BPM.
        let bpm = estimator.tap(t0 + Duration::from_millis(50)).unwrap();
        assert_eq!(bpm, MAX_BPM);
    }

    #[test]
    fn test_history_capped_at_four() {
        let mut estimator = TapTempoEstimator::new();
        let t0 = Instant::now();
        for i in 0..6 {
            estimator.tap(t0 + Duration::from_millis(i * 500));
        }
        assert_eq!(estimator.tap_count(), 4);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut estimator = TapTempoEstimator::new();
        estimator.tap(Instant::now());
        estimator.reset();
        assert_eq!(estimator.tap_count(), 0);
    }
}
