// Managers Module
//
// Focused manager classes extracted from the orchestrator to apply Single
// Responsibility Principle.
//
// - BroadcastChannelManager: observer-facing tokio broadcast channel
//   management (beat, subdivision, state-change, pitch events).

pub mod broadcast_manager;

pub use broadcast_manager::{
    BeatEvent, BroadcastChannelManager, PitchEvent, StateChangeEvent, SubdivisionEvent,
};
