//! YIN pitch detection.
//!
//! Implements the classic YIN algorithm (de Cheveigné & Kawahara, 2002):
//! difference function, cumulative mean normalized difference, absolute
//! threshold with local-minimum walk, then parabolic interpolation for
//! sub-sample precision.

use std::collections::VecDeque;
use std::time::Instant;

const MIN_FREQUENCY_HZ: f64 = 27.5; // A0
const MAX_FREQUENCY_HZ: f64 = 4186.0; // C8
const YIN_THRESHOLD: f64 = 0.15;
const AMPLITUDE_GATE: f64 = 0.01;
const MEDIAN_WINDOW: usize = 5;

/// A single pitch estimate, timestamped on the scheduler's clock.
///
/// Valid (tuner-actionable) iff `confidence > 0.85 && amplitude_rms > 0.01`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchReading {
    pub frequency_hz: f64,
    pub confidence: f64,
    pub amplitude_rms: f64,
    pub timestamp: Instant,
}

impl PitchReading {
    pub fn is_valid(&self) -> bool {
        self.confidence > 0.85 && self.amplitude_rms > AMPLITUDE_GATE
    }
}

/// Stateful YIN detector: holds a small history for median-of-5 smoothing
/// of the reported frequency, reducing octave-jump flicker between frames.
pub struct PitchDetector {
    sample_rate: u32,
    recent_frequencies: VecDeque<f64>,
}

impl PitchDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate, recent_frequencies: VecDeque::with_capacity(MEDIAN_WINDOW) }
    }

    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.recent_frequencies.clear();
    }

    /// Run one detection pass over a mono frame. Returns `None` only when
    /// the buffer is too short to search any candidate lag.
    pub fn process(&mut self, samples: &[f32], timestamp: Instant) -> Option<PitchReading> {
        let amplitude_rms = rms(samples);

        let tau_min = (self.sample_rate as f64 / MAX_FREQUENCY_HZ).floor() as usize;
        let tau_max = (self.sample_rate as f64 / MIN_FREQUENCY_HZ).ceil() as usize;
        if samples.len() <= tau_max + 1 || tau_min == 0 {
            return None;
        }

        if amplitude_rms < AMPLITUDE_GATE {
            return Some(PitchReading { frequency_hz: 0.0, confidence: 0.0, amplitude_rms, timestamp });
        }

        let diff = difference_function(samples, tau_max);
        let cmnd = cumulative_mean_normalized_difference(&diff);

        let tau = match absolute_threshold_tau(&cmnd, tau_min, tau_max) {
            Some(tau) => tau,
            None => return Some(PitchReading { frequency_hz: 0.0, confidence: 0.0, amplitude_rms, timestamp }),
        };

        let refined_tau = parabolic_interpolation(&cmnd, tau);
        let frequency_hz = self.sample_rate as f64 / refined_tau;
        let confidence = (1.0 - cmnd[tau]).clamp(0.0, 1.0);

        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
            return Some(PitchReading { frequency_hz: 0.0, confidence: 0.0, amplitude_rms, timestamp });
        }

        let smoothed = self.smooth(frequency_hz);
        Some(PitchReading { frequency_hz: smoothed, confidence, amplitude_rms, timestamp })
    }

    fn smooth(&mut self, frequency_hz: f64) -> f64 {
        if self.recent_frequencies.len() == MEDIAN_WINDOW {
            self.recent_frequencies.pop_front();
        }
        self.recent_frequencies.push_back(frequency_hz);

        let mut sorted: Vec<f64> = self.recent_frequencies.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        }
    }
}

fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

fn difference_function(samples: &[f32], tau_max: usize) -> Vec<f64> {
    let window = samples.len() - tau_max;
    let mut diff = vec![0.0_f64; tau_max + 1];
    for tau in 1..=tau_max {
        let mut sum = 0.0_f64;
        for i in 0..window {
            let delta = samples[i] as f64 - samples[i + tau] as f64;
            sum += delta * delta;
        }
        diff[tau] = sum;
    }
    diff
}

fn cumulative_mean_normalized_difference(diff: &[f64]) -> Vec<f64> {
    let mut cmnd = vec![0.0_f64; diff.len()];
    cmnd[0] = 1.0;
    let mut running_sum = 0.0_f64;
    for tau in 1..diff.len() {
        running_sum += diff[tau];
        cmnd[tau] = if running_sum == 0.0 { 1.0 } else { diff[tau] * tau as f64 / running_sum };
    }
    cmnd
}

fn absolute_threshold_tau(cmnd: &[f64], tau_min: usize, tau_max: usize) -> Option<usize> {
    let mut tau = tau_min.max(1);
    while tau <= tau_max {
        if cmnd[tau] < YIN_THRESHOLD {
            // Walk to the local minimum.
            while tau + 1 <= tau_max && cmnd[tau + 1] < cmnd[tau] {
                tau += 1;
            }
            return Some(tau);
        }
        tau += 1;
    }
    None
}

fn parabolic_interpolation(cmnd: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmnd.len() {
        return tau as f64;
    }
    let s0 = cmnd[tau - 1];
    let s1 = cmnd[tau];
    let s2 = cmnd[tau + 1];
    let denom = 2.0 * s1 - s2 - s0;
    if denom.abs() < f64::EPSILON {
        tau as f64
    } else {
        tau as f64 + (s2 - s0) / (2.0 * denom)
    }
}
