//! Metronome data model and the drift-free timing engine.
//!
//! Types here are pure value types owned by the Orchestrator; the engine
//! itself ([`engine::TimingEngine`]) is pure computation with no I/O,
//! generalizing the frame-counter arithmetic of a fixed-BPM click
//! generator into an absolute anchor + tick-index scheduling grid that
//! tolerates reconfiguration and jitter in the caller's `tick()` cadence.

pub mod engine;

pub use engine::{DueEvent, TimingEngine};

use std::time::Instant;

/// Number of beats per bar and the note value that represents one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeSignature {
    beats_per_bar: u32,
    beat_unit: u32,
}

impl TimeSignature {
    /// Construct a signature, clamping `beats_per_bar` to 1..=32 and
    /// `beat_unit` to the nearest supported note value.
    pub fn new(beats_per_bar: u32, beat_unit: u32) -> Self {
        let beats_per_bar = beats_per_bar.clamp(1, 32);
        let beat_unit = match beat_unit {
            2 | 4 | 8 | 16 => beat_unit,
            _ => 4,
        };
        Self { beats_per_bar, beat_unit }
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    pub fn beat_unit(&self) -> u32 {
        self.beat_unit
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

/// A beat subdivision. The divisor is the number of ticks per beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Subdivision {
    None,
    Eighth,
    Triplet,
    Sixteenth,
}

impl Subdivision {
    pub fn divisor(&self) -> u32 {
        match self {
            Subdivision::None => 1,
            Subdivision::Eighth => 2,
            Subdivision::Triplet => 3,
            Subdivision::Sixteenth => 4,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Subdivision::None)
    }
}

/// Which beats in a bar receive a stronger click/haptic event.
///
/// Invariant: at least one entry is always `true`. An operation that would
/// leave the pattern empty of accents instead re-asserts the first beat.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AccentPattern(Vec<bool>);

impl AccentPattern {
    pub fn new(beats_per_bar: u32) -> Self {
        let mut pattern = vec![false; beats_per_bar as usize];
        if let Some(first) = pattern.first_mut() {
            *first = true;
        }
        Self(pattern)
    }

    pub fn from_vec(mut pattern: Vec<bool>) -> Self {
        if !pattern.iter().any(|&a| a) {
            if let Some(first) = pattern.first_mut() {
                *first = true;
            }
        }
        Self(pattern)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    pub fn is_accent(&self, beat_in_bar: u32) -> bool {
        self.0.get(beat_in_bar as usize).copied().unwrap_or(false)
    }

    /// Toggle a single beat's accent flag, re-asserting the first beat if
    /// the toggle would otherwise empty the pattern.
    pub fn toggle(&mut self, index: u32) {
        if let Some(slot) = self.0.get_mut(index as usize) {
            *slot = !*slot;
        }
        if !self.0.iter().any(|&a| a) {
            if let Some(first) = self.0.first_mut() {
                *first = true;
            }
        }
    }

    /// Resize to match a new beat count, truncating or padding with false,
    /// then re-asserting the first beat if the result is empty of accents.
    pub fn resize(&mut self, beats_per_bar: u32) {
        self.0.resize(beats_per_bar as usize, false);
        if !self.0.iter().any(|&a| a) {
            if let Some(first) = self.0.first_mut() {
                *first = true;
            }
        }
    }

    /// Resolve a named accent preset for the given beat count (spec §4.9).
    pub fn from_preset(preset: AccentPreset, beats_per_bar: u32) -> Self {
        let b = beats_per_bar;
        let pattern = match preset {
            AccentPreset::Standard => {
                let mut p = vec![false; b as usize];
                if let Some(first) = p.first_mut() {
                    *first = true;
                }
                p
            }
            AccentPreset::Backbeat => (0..b).map(|i| (i + 1) % 2 == 0).collect(),
            AccentPreset::AllAccent => vec![true; b as usize],
            AccentPreset::Djent => match b {
                4 => vec![true, false, false, true],
                7 => vec![true, false, false, true, false, true, false],
                8 => vec![true, false, false, true, false, false, true, false],
                _ => {
                    let mut p = vec![false; b as usize];
                    if let Some(first) = p.first_mut() {
                        *first = true;
                    }
                    if b > 3 {
                        p[(b / 2) as usize] = true;
                    }
                    p
                }
            },
        };
        Self::from_vec(pattern)
    }
}

/// Named accent-pattern presets resolvable against any beat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AccentPreset {
    Standard,
    Backbeat,
    AllAccent,
    Djent,
}

/// Authoritative metronome configuration, owned by the Orchestrator.
///
/// Every mutation stamps a monotonically increasing `revision`, consumed by
/// [`crate::sync::PeerSync`]'s latest-writer-wins replication.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MetronomeConfig {
    bpm: u32,
    time_signature: TimeSignature,
    accent_pattern: AccentPattern,
    subdivision: Subdivision,
    revision: u64,
}

pub const MIN_BPM: u32 = 20;
pub const MAX_BPM: u32 = 300;

impl MetronomeConfig {
    pub fn new(bpm: u32, time_signature: TimeSignature) -> Self {
        let accent_pattern = AccentPattern::new(time_signature.beats_per_bar());
        Self {
            bpm: bpm.clamp(MIN_BPM, MAX_BPM),
            time_signature,
            accent_pattern,
            subdivision: Subdivision::None,
            revision: 0,
        }
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn accent_pattern(&self) -> &AccentPattern {
        &self.accent_pattern
    }

    pub fn subdivision(&self) -> Subdivision {
        self.subdivision
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set bpm, clamping to [MIN_BPM, MAX_BPM] (the clamp invariant) and
    /// bumping the revision.
    pub fn set_bpm(&mut self, bpm: u32) {
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        self.revision += 1;
    }

    /// Replace the time signature, resizing the accent pattern to match.
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        self.accent_pattern.resize(time_signature.beats_per_bar());
        self.revision += 1;
    }

    pub fn set_accent(&mut self, index: u32, value: bool) {
        let current = self.accent_pattern.is_accent(index);
        if current != value {
            self.accent_pattern.toggle(index);
        }
        self.revision += 1;
    }

    pub fn toggle_accent(&mut self, index: u32) {
        self.accent_pattern.toggle(index);
        self.revision += 1;
    }

    pub fn apply_preset(&mut self, preset: AccentPreset) {
        self.accent_pattern = AccentPattern::from_preset(preset, self.time_signature.beats_per_bar());
        self.revision += 1;
    }

    pub fn set_subdivision(&mut self, subdivision: Subdivision) {
        self.subdivision = subdivision;
        self.revision += 1;
    }

    pub fn set_revision(&mut self, revision: u64) {
        self.revision = revision;
    }
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self::new(120, TimeSignature::default())
    }
}

/// Mutable playback position, created on `start()` and cleared on `stop()`.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackState {
    pub playing: bool,
    pub current_bar: u64,
    pub current_beat_in_bar: u32,
    pub current_subdiv_index: u32,
    pub anchor: Instant,
    pub next_tick_index: u64,
}

impl PlaybackState {
    pub fn idle(anchor: Instant) -> Self {
        Self {
            playing: false,
            current_bar: 0,
            current_beat_in_bar: 0,
            current_subdiv_index: 0,
            anchor,
            next_tick_index: 0,
        }
    }

    /// Apply a DueEvent's position fields, matching `currentBeatInBar <
    /// beatsPerBar` per the invariant in spec §3.
    pub fn apply_due_event(&mut self, event: &DueEvent) {
        self.current_bar = event.bar_index;
        self.current_beat_in_bar = event.beat_in_bar;
        self.current_subdiv_index = event.subdiv_index_in_beat;
        self.next_tick_index = event.tick_index + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accent_pattern_never_empties() {
        let mut pattern = AccentPattern::new(4);
        pattern.toggle(0);
        assert!(pattern.as_slice().iter().any(|&a| a));
    }

    #[test]
    fn test_accent_pattern_resize_pads_and_truncates() {
        let mut pattern = AccentPattern::new(4);
        pattern.resize(6);
        assert_eq!(pattern.as_slice().len(), 6);
        pattern.resize(2);
        assert_eq!(pattern.as_slice().len(), 2);
        assert!(pattern.as_slice().iter().any(|&a| a));
    }

    #[test]
    fn test_bpm_clamp_invariant() {
        let mut config = MetronomeConfig::default();
        config.set_bpm(5);
        assert_eq!(config.bpm(), MIN_BPM);
        config.set_bpm(500);
        assert_eq!(config.bpm(), MAX_BPM);
        config.set_bpm(140);
        assert_eq!(config.bpm(), 140);
    }

    #[test]
    fn test_djent_preset_b4() {
        let pattern = AccentPattern::from_preset(AccentPreset::Djent, 4);
        assert_eq!(pattern.as_slice(), &[true, false, false, true]);
    }

    #[test]
    fn test_djent_preset_b7() {
        let pattern = AccentPattern::from_preset(AccentPreset::Djent, 7);
        assert_eq!(
            pattern.as_slice(),
            &[true, false, false, true, false, true, false]
        );
    }

    #[test]
    fn test_djent_preset_other_beat_count() {
        let pattern = AccentPattern::from_preset(AccentPreset::Djent, 5);
        assert_eq!(pattern.as_slice(), &[true, false, true, false, false]);
    }

    #[test]
    fn test_backbeat_preset() {
        let pattern = AccentPattern::from_preset(AccentPreset::Backbeat, 4);
        assert_eq!(pattern.as_slice(), &[false, true, false, true]);
    }

    #[test]
    fn test_revision_increments_on_mutation() {
        let mut config = MetronomeConfig::default();
        let start = config.revision();
        config.set_bpm(100);
        assert_eq!(config.revision(), start + 1);
        config.toggle_accent(1);
        assert_eq!(config.revision(), start + 2);
    }
}
