//! Wire format for peer messages. Field names match the documented peer
//! protocol exactly so both ends of a pairing (primary + wearable) agree
//! on wire bytes regardless of implementation language.

use serde::{Deserialize, Serialize};

use crate::timing::{MetronomeConfig, Subdivision, TimeSignature};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshotPayload {
    pub bpm: u32,
    #[serde(rename = "isPlaying")]
    pub is_playing: bool,
    #[serde(rename = "timeSignatureBeats")]
    pub time_signature_beats: u32,
    #[serde(rename = "timeSignatureUnit")]
    pub time_signature_unit: u32,
    #[serde(rename = "accentPattern")]
    pub accent_pattern: Vec<bool>,
    #[serde(rename = "subdivisionEnabled")]
    pub subdivision_enabled: bool,
    #[serde(rename = "subdivisionType")]
    pub subdivision_type: u32,
}

impl StateSnapshotPayload {
    pub fn from_config(config: &MetronomeConfig, is_playing: bool) -> Self {
        let subdivision_type = match config.subdivision() {
            Subdivision::None => 2,
            Subdivision::Eighth => 2,
            Subdivision::Triplet => 3,
            Subdivision::Sixteenth => 4,
        };
        Self {
            bpm: config.bpm(),
            is_playing,
            time_signature_beats: config.time_signature().beats_per_bar(),
            time_signature_unit: config.time_signature().beat_unit(),
            accent_pattern: config.accent_pattern().as_slice().to_vec(),
            subdivision_enabled: config.subdivision().is_enabled(),
            subdivision_type,
        }
    }

    pub fn to_config(&self) -> (MetronomeConfig, bool) {
        let mut config = MetronomeConfig::new(
            self.bpm,
            TimeSignature::new(self.time_signature_beats, self.time_signature_unit),
        );
        let subdivision = if !self.subdivision_enabled {
            Subdivision::None
        } else {
            match self.subdivision_type {
                3 => Subdivision::Triplet,
                4 => Subdivision::Sixteenth,
                _ => Subdivision::Eighth,
            }
        };
        config.set_subdivision(subdivision);
        config.set_accent(0, self.accent_pattern.first().copied().unwrap_or(true));
        for (i, &accent) in self.accent_pattern.iter().enumerate() {
            config.set_accent(i as u32, accent);
        }
        (config, self.is_playing)
    }
}

/// Remote commands, semantically equivalent to a local user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    #[serde(rename = "play")]
    Play,
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "toggle")]
    Toggle,
    #[serde(rename = "incrementBPM")]
    IncrementBpm,
    #[serde(rename = "decrementBPM")]
    DecrementBpm,
    #[serde(rename = "resetToDefaults")]
    ResetToDefaults,
}

/// A peer-protocol message. `timestamp` is seconds since the Unix epoch as
/// observed by the sender; `revision` mirrors the sender's MetronomeConfig
/// revision at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncEnvelope {
    #[serde(rename = "stateSync")]
    StateSnapshot {
        timestamp: f64,
        revision: u64,
        #[serde(flatten)]
        payload: StateSnapshotPayload,
    },
    #[serde(rename = "command")]
    CommandMessage { timestamp: f64, revision: u64, command: Command },
    #[serde(rename = "ping")]
    Ping { timestamp: f64, revision: u64 },
    #[serde(rename = "pong")]
    Pong {
        timestamp: f64,
        revision: u64,
        #[serde(flatten)]
        payload: StateSnapshotPayload,
    },
}

impl SyncEnvelope {
    pub fn timestamp(&self) -> f64 {
        match self {
            SyncEnvelope::StateSnapshot { timestamp, .. }
            | SyncEnvelope::CommandMessage { timestamp, .. }
            | SyncEnvelope::Ping { timestamp, .. }
            | SyncEnvelope::Pong { timestamp, .. } => *timestamp,
        }
    }

    pub fn revision(&self) -> u64 {
        match self {
            SyncEnvelope::StateSnapshot { revision, .. }
            | SyncEnvelope::CommandMessage { revision, .. }
            | SyncEnvelope::Ping { revision, .. }
            | SyncEnvelope::Pong { revision, .. } => *revision,
        }
    }
}
