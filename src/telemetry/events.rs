//! Core telemetry event types describing diagnostics data exposed to the
//! CLI and any future remote-monitoring surface.

use serde::{Deserialize, Serialize};

/// Diagnostic error codes surfaced via telemetry metrics, mirroring the
/// failure domains in `crate::error` without forcing subscribers to depend
/// on the error enums themselves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticError {
    AudioUnavailable,
    HapticUnavailable,
    PeerUnreachable,
    MicPermissionDenied,
    InvalidConfig,
    PersistenceError,
}

/// Rich metric events covering scheduler jitter, buffer occupancy, beat
/// dispatch, and non-fatal errors recovered internally (spec §7: transient
/// device errors are recovered internally and reported out-of-band rather
/// than propagated to the caller).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MetricEvent {
    /// Observed drift between a tick's scheduled and delivered time.
    SchedulerJitter {
        avg_ms: f32,
        max_ms: f32,
        sample_count: usize,
    },
    BufferOccupancy {
        channel: String,
        percent: f32,
    },
    BeatDispatched {
        bar: u64,
        beat: u32,
        accent: bool,
    },
    PitchSample {
        frequency_hz: f64,
        confidence: f64,
        cents: f64,
    },
    Error {
        code: DiagnosticError,
        context: String,
    },
}
