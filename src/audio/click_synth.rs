//! Click PCM synthesis.
//!
//! Replaces the fixed-seed white-noise burst (`generate_click_sample`) with
//! a deterministic additive-plus-noise transient whose timbre depends on
//! click kind (accent / normal / subdivision), so the three click kinds are
//! audibly distinguishable without needing sample assets.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which role a scheduled click plays in the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickKind {
    Accent,
    Normal,
    Subdivision,
}

struct ClickSpec {
    duration_ms: f32,
    f0: f32,
    f1: f32,
    f2: f32,
    gain: f32,
}

fn spec_for(kind: ClickKind) -> ClickSpec {
    match kind {
        ClickKind::Accent => ClickSpec { duration_ms: 30.0, f0: 1200.0, f1: 2400.0, f2: 3600.0, gain: 0.40 },
        ClickKind::Normal => ClickSpec { duration_ms: 25.0, f0: 900.0, f1: 1800.0, f2: 2700.0, gain: 0.25 },
        ClickKind::Subdivision => ClickSpec { duration_ms: 15.0, f0: 800.0, f1: 1600.0, f2: 2400.0, gain: 0.10 },
    }
}

/// Synthesize one click's PCM buffer at `sample_rate`.
///
/// `envelope(t) = exp(-80t)`; the body is three harmonically related sines
/// plus a decaying noise transient:
/// `envelope(t) * (f0 + 0.5*f1 + 0.25*f2 + 0.3*noise*exp(-200t))`.
/// Noise uses a fixed seed so two calls with the same kind and sample rate
/// are bit-identical, matching the deterministic-click property carried
/// over from the original frame-counter click generator.
pub fn synthesize_click(kind: ClickKind, sample_rate: u32) -> Vec<f32> {
    let spec = spec_for(kind);
    let num_samples = ((sample_rate as f32) * spec.duration_ms / 1000.0) as usize;
    let mut rng = StdRng::seed_from_u64(seed_for(kind));

    let mut samples = Vec::with_capacity(num_samples);
    for n in 0..num_samples {
        let t = n as f32 / sample_rate as f32;
        let envelope = (-80.0 * t).exp();
        let noise: f32 = rng.gen_range(-1.0..1.0);
        let body = (2.0 * std::f32::consts::PI * spec.f0 * t).sin()
            + 0.5 * (2.0 * std::f32::consts::PI * spec.f1 * t).sin()
            + 0.25 * (2.0 * std::f32::consts::PI * spec.f2 * t).sin()
            + 0.3 * noise * (-200.0 * t).exp();
        samples.push(spec.gain * envelope * body);
    }

    let peak = samples.iter().fold(0.0_f32, |m, &s| m.max(s.abs()));
    if peak > 1.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
    samples
}

fn seed_for(kind: ClickKind) -> u64 {
    match kind {
        ClickKind::Accent => 101,
        ClickKind::Normal => 102,
        ClickKind::Subdivision => 103,
    }
}

/// Pre-rendered PCM for all three click kinds at a given sample rate.
///
/// Re-synthesized whenever the audio device's sample rate changes; never
/// re-rendered on the audio callback thread.
pub struct ClickBufferSet {
    sample_rate: u32,
    accent: Vec<f32>,
    normal: Vec<f32>,
    subdivision: Vec<f32>,
}

impl ClickBufferSet {
    pub fn for_sample_rate(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            accent: synthesize_click(ClickKind::Accent, sample_rate),
            normal: synthesize_click(ClickKind::Normal, sample_rate),
            subdivision: synthesize_click(ClickKind::Subdivision, sample_rate),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_for(&self, kind: ClickKind) -> &[f32] {
        match kind {
            ClickKind::Accent => &self.accent,
            ClickKind::Normal => &self.normal,
            ClickKind::Subdivision => &self.subdivision,
        }
    }
}
