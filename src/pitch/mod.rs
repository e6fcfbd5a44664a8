//! Pitch detection and note classification for the chromatic tuner.

pub mod classifier;
pub mod detector;
pub mod worker;

pub use classifier::{cents_for, NoteClassification, NoteClassifier, NoteHypothesis};
pub use detector::{PitchDetector, PitchReading};
pub use worker::PitchWorker;
