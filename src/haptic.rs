//! Haptic feedback: a beat pulse on the metronome side, a rate-limited
//! in-tune pulse on the tuner side.
//!
//! Desktop has no vibration motor, so the only backend here is a no-op
//! that still enforces rate limiting and logs what it would have done —
//! useful for tests that assert on trigger counts without a real device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::audio::click_synth::ClickKind;
use crate::error::HapticError;

const IN_TUNE_MIN_INTERVAL: Duration = Duration::from_millis(500);
const PULSE_DURATION: Duration = Duration::from_millis(50);
const ACCENT_REINFORCEMENT_DELAY: Duration = Duration::from_millis(25);

/// The full haptic pattern vocabulary (spec §4.4): `Accent`/`Normal`/
/// `Subdivision` mirror the three click kinds, `Ghost` is a very soft pulse
/// available to callers for sub-threshold beats (e.g. a quiet reinforcement
/// the metronome pipeline itself never triggers automatically), and
/// `InTune` is the tuner's rate-limited pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HapticKind {
    Accent,
    Normal,
    Subdivision,
    Ghost,
    InTune,
}

impl From<ClickKind> for HapticKind {
    fn from(kind: ClickKind) -> Self {
        match kind {
            ClickKind::Accent => HapticKind::Accent,
            ClickKind::Normal => HapticKind::Normal,
            ClickKind::Subdivision => HapticKind::Subdivision,
        }
    }
}

/// Fixed (intensity, sharpness) pair for a haptic kind, each in `[0.0, 1.0]`.
pub fn intensity_sharpness(kind: HapticKind) -> (f32, f32) {
    match kind {
        HapticKind::Accent => (1.0, 0.9),
        HapticKind::Normal => (0.6, 0.6),
        HapticKind::Subdivision => (0.35, 0.5),
        HapticKind::Ghost => (0.15, 0.3),
        HapticKind::InTune => (0.5, 0.2),
    }
}

/// What triggered a haptic pulse, handed to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapticEvent {
    pub kind: HapticKind,
    pub intensity: OrderedF32,
    pub sharpness: OrderedF32,
}

/// `f32` wrapper with a total order, so [`HapticEvent`] can derive `Eq` —
/// intensity/sharpness only ever take the fixed table values above, never
/// NaN, so bitwise comparison is sound here.
#[derive(Debug, Clone, Copy)]
pub struct OrderedF32(pub f32);

impl PartialEq for OrderedF32 {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for OrderedF32 {}

pub trait HapticBackend: Send + Sync {
    /// Fire a single pulse of fixed internal duration (50ms). Returns an
    /// error only if the platform channel itself is unavailable; it never
    /// encodes rate limiting, which is enforced by [`HapticEngine`].
    fn pulse(&self, event: HapticEvent) -> Result<(), HapticError>;
}

/// No-op backend for desktop builds and tests: records what would have
/// fired without touching any hardware.
pub struct NullHapticBackend;

impl HapticBackend for NullHapticBackend {
    fn pulse(&self, event: HapticEvent) -> Result<(), HapticError> {
        log::debug!("[Haptic] pulse {:?} ({:?})", event, PULSE_DURATION);
        Ok(())
    }
}

/// Rate-limits and dispatches haptic pulses.
///
/// `InTune` pulses are throttled to at most one per 500ms so a held,
/// perfectly-tuned note doesn't buzz continuously. Beat pulses are never
/// throttled — the timing engine already guarantees they can't overlap in
/// time closer than one subdivision tick. An `Accent` beat additionally
/// schedules a second, lighter pulse 25ms later as reinforcement; the
/// caller (orchestrator) is responsible for actually waiting and firing
/// it, since this engine performs no timers of its own.
pub struct HapticEngine<B: HapticBackend> {
    backend: B,
    last_in_tune_pulse_ms: AtomicU64,
    start: Instant,
}

impl<B: HapticBackend> HapticEngine<B> {
    pub fn new(backend: B) -> Self {
        Self { backend, last_in_tune_pulse_ms: AtomicU64::new(0), start: Instant::now() }
    }

    fn event_for(kind: HapticKind) -> HapticEvent {
        let (intensity, sharpness) = intensity_sharpness(kind);
        HapticEvent { kind, intensity: OrderedF32(intensity), sharpness: OrderedF32(sharpness) }
    }

    /// Fire any kind directly, bypassing rate limiting. Used for `Ghost`
    /// and other caller-scheduled pulses that don't go through
    /// `trigger_beat`/`trigger_in_tune`.
    pub fn play(&self, kind: HapticKind) -> Result<(), HapticError> {
        self.backend.pulse(Self::event_for(kind))
    }

    /// Trigger a beat pulse. Returns whether a reinforcement pulse should
    /// be scheduled `ACCENT_REINFORCEMENT_DELAY` later.
    pub fn trigger_beat(&self, kind: ClickKind) -> Result<bool, HapticError> {
        self.backend.pulse(Self::event_for(kind.into()))?;
        Ok(kind == ClickKind::Accent)
    }

    pub fn reinforcement_delay(&self) -> Duration {
        ACCENT_REINFORCEMENT_DELAY
    }

    /// Trigger an in-tune pulse if at least 500ms elapsed since the last
    /// one. Returns `false` (not an error) when suppressed by rate limiting.
    pub fn trigger_in_tune(&self, now: Instant) -> Result<bool, HapticError> {
        let now_ms = now.duration_since(self.start).as_millis() as u64;
        let last = self.last_in_tune_pulse_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < IN_TUNE_MIN_INTERVAL.as_millis() as u64 {
            return Ok(false);
        }
        self.backend.pulse(Self::event_for(HapticKind::InTune))?;
        self.last_in_tune_pulse_ms.store(now_ms, Ordering::SeqCst);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beat_pulse_always_fires() {
        let engine = HapticEngine::new(NullHapticBackend);
        assert!(!engine.trigger_beat(ClickKind::Normal).unwrap());
        assert!(engine.trigger_beat(ClickKind::Accent).unwrap());
    }

    #[test]
    fn test_in_tune_rate_limited() {
        let engine = HapticEngine::new(NullHapticBackend);
        let t0 = Instant::now();
        assert!(engine.trigger_in_tune(t0).unwrap());
        assert!(!engine.trigger_in_tune(t0 + Duration::from_millis(100)).unwrap());
        assert!(engine.trigger_in_tune(t0 + Duration::from_millis(600)).unwrap());
    }

    #[test]
    fn test_reinforcement_delay_constant() {
        let engine = HapticEngine::new(NullHapticBackend);
        assert_eq!(engine.reinforcement_delay(), Duration::from_millis(25));
    }

    #[test]
    fn test_ghost_pulse_bypasses_rate_limit() {
        let engine = HapticEngine::new(NullHapticBackend);
        assert!(engine.play(HapticKind::Ghost).is_ok());
        assert!(engine.play(HapticKind::Ghost).is_ok());
    }

    #[test]
    fn test_intensity_sharpness_table_is_distinct_per_kind() {
        let kinds = [
            HapticKind::Accent,
            HapticKind::Normal,
            HapticKind::Subdivision,
            HapticKind::Ghost,
            HapticKind::InTune,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(intensity_sharpness(*a), intensity_sharpness(*b));
            }
        }
    }
}
