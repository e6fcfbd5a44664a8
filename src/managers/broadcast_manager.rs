// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::time::Instant;

use tokio::sync::broadcast;

use crate::pitch::{NoteClassification, NoteHypothesis, PitchReading};
use crate::timing::MetronomeConfig;

/// Emitted once per on-beat tick (spec §6 `onBeat`).
#[derive(Debug, Clone)]
pub struct BeatEvent {
    pub bar: u64,
    pub beat_in_bar: u32,
    pub accent: bool,
    pub audio_time: Instant,
}

/// Emitted for each enabled-subdivision tick that isn't itself a beat
/// (spec §6 `onSubdivision`).
#[derive(Debug, Clone, Copy)]
pub struct SubdivisionEvent {
    pub subdiv_index_in_beat: u32,
}

/// Emitted whenever the authoritative `MetronomeConfig` or playback flag
/// changes, locally or via an applied peer snapshot (spec §6 `onStateChange`).
#[derive(Debug, Clone)]
pub struct StateChangeEvent {
    pub config: MetronomeConfig,
    pub playing: bool,
}

/// Emitted for each valid pitch reading (spec §6 `onPitch`).
#[derive(Debug, Clone)]
pub struct PitchEvent {
    pub reading: PitchReading,
    pub hypothesis: NoteHypothesis,
    pub cents: f64,
    pub classification: NoteClassification,
}

/// Manages all tokio broadcast channels feeding the observer interface
///
/// Single Responsibility: Broadcast channel lifecycle and subscription
///
/// This manager centralizes all broadcast channel creation, storage, and
/// subscription handling. It provides a clean interface for:
/// - Initializing broadcast channels with appropriate buffer sizes
/// - Subscribing to broadcast channels for multiple consumers
///
/// # Channel Types
/// - Beat: fired on every beat/accent tick
/// - Subdivision: fired on every enabled-subdivision tick that isn't a beat
/// - State: fired on every authoritative config/playback mutation
/// - Pitch: fired on every valid pitch reading from the tuner pipeline
///
/// All four channels are initialized eagerly at construction, unlike the
/// teacher's debug-only channels which lazily `init_*` on first use: a UI
/// layer needs to bind its observers before `start()` is ever called, so
/// there is no meaningful "uninitialized" state to model here.
pub struct BroadcastChannelManager {
    beat: broadcast::Sender<BeatEvent>,
    subdivision: broadcast::Sender<SubdivisionEvent>,
    state: broadcast::Sender<StateChangeEvent>,
    pitch: broadcast::Sender<PitchEvent>,
}

impl BroadcastChannelManager {
    pub fn new() -> Self {
        let (beat, _) = broadcast::channel(128);
        let (subdivision, _) = broadcast::channel(128);
        let (state, _) = broadcast::channel(32);
        let (pitch, _) = broadcast::channel(64);
        Self {
            beat,
            subdivision,
            state,
            pitch,
        }
    }

    // ========================================================================
    // BEAT CHANNEL
    // ========================================================================

    pub fn publish_beat(&self, event: BeatEvent) {
        let _ = self.beat.send(event);
    }

    pub fn subscribe_beat(&self) -> broadcast::Receiver<BeatEvent> {
        self.beat.subscribe()
    }

    // ========================================================================
    // SUBDIVISION CHANNEL
    // ========================================================================

    pub fn publish_subdivision(&self, event: SubdivisionEvent) {
        let _ = self.subdivision.send(event);
    }

    pub fn subscribe_subdivision(&self) -> broadcast::Receiver<SubdivisionEvent> {
        self.subdivision.subscribe()
    }

    // ========================================================================
    // STATE CHANGE CHANNEL
    // ========================================================================

    pub fn publish_state_change(&self, event: StateChangeEvent) {
        let _ = self.state.send(event);
    }

    pub fn subscribe_state_change(&self) -> broadcast::Receiver<StateChangeEvent> {
        self.state.subscribe()
    }

    // ========================================================================
    // PITCH CHANNEL
    // ========================================================================

    pub fn publish_pitch(&self, event: PitchEvent) {
        let _ = self.pitch.send(event);
    }

    pub fn subscribe_pitch(&self) -> broadcast::Receiver<PitchEvent> {
        self.pitch.subscribe()
    }

    /// Clone of the pitch channel's sending half, handed to
    /// [`crate::pitch::PitchWorker`] so it can publish readings without the
    /// worker thread needing a reference to the whole manager.
    pub fn pitch_sender(&self) -> broadcast::Sender<PitchEvent> {
        self.pitch.clone()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::NoteClassifier;
    use crate::timing::MetronomeConfig;

    #[test]
    fn beat_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_beat();

        manager.publish_beat(BeatEvent {
            bar: 0,
            beat_in_bar: 0,
            accent: true,
            audio_time: Instant::now(),
        });

        let event = rx.try_recv().expect("beat event delivered");
        assert_eq!(event.bar, 0);
        assert!(event.accent);
    }

    #[test]
    fn beat_channel_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        let mut rx1 = manager.subscribe_beat();
        let mut rx2 = manager.subscribe_beat();

        manager.publish_beat(BeatEvent {
            bar: 2,
            beat_in_bar: 1,
            accent: false,
            audio_time: Instant::now(),
        });

        assert_eq!(rx1.try_recv().unwrap().bar, 2);
        assert_eq!(rx2.try_recv().unwrap().bar, 2);
    }

    #[test]
    fn subdivision_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_subdivision();

        manager.publish_subdivision(SubdivisionEvent {
            subdiv_index_in_beat: 2,
        });

        assert_eq!(rx.try_recv().unwrap().subdiv_index_in_beat, 2);
    }

    #[test]
    fn state_change_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_state_change();

        manager.publish_state_change(StateChangeEvent {
            config: MetronomeConfig::default(),
            playing: true,
        });

        let event = rx.try_recv().expect("state event delivered");
        assert!(event.playing);
    }

    #[test]
    fn pitch_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();
        let mut rx = manager.subscribe_pitch();

        let classifier = NoteClassifier::default();
        let (hypothesis, cents, classification) = classifier.classify(440.0);
        manager.publish_pitch(PitchEvent {
            reading: PitchReading {
                frequency_hz: 440.0,
                confidence: 0.95,
                amplitude_rms: 0.2,
                timestamp: Instant::now(),
            },
            hypothesis,
            cents,
            classification,
        });

        let event = rx.try_recv().expect("pitch event delivered");
        assert_eq!(event.hypothesis.name, "A");
    }

    #[test]
    fn channels_are_eagerly_available() {
        let manager = BroadcastChannelManager::default();
        assert!(manager.subscribe_beat().try_recv().is_err());
        assert!(manager.subscribe_subdivision().try_recv().is_err());
        assert!(manager.subscribe_state_change().try_recv().is_err());
        assert!(manager.subscribe_pitch().try_recv().is_err());
    }
}
