//! Maps a detected frequency onto the nearest chromatic note and reports
//! how far off in cents it is.

const NOTE_NAMES: [&str; 12] =
    ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// The nearest chromatic note to a detected frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteHypothesis {
    pub midi_number: i32,
    pub name: String,
    pub octave: i32,
    pub reference_pitch: f64,
}

/// How close a detected frequency is to its nearest note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteClassification {
    InTune,
    Close,
    Far,
}

/// Pure function: cents offset of `freq` from `reference_hz`-tuned A4,
/// relative to the nearest chromatic note. Exposed standalone so callers
/// (e.g. a reference-pitch drift guard) don't need a full NoteClassifier.
pub fn cents_for(freq: f64, reference_hz: f64) -> f64 {
    let m = 69.0 + 12.0 * (freq / reference_hz).log2();
    let rounded = m.round();
    let expected = reference_hz * 2f64.powf((rounded - 69.0) / 12.0);
    1200.0 * (freq / expected).log2()
}

#[derive(Debug, Clone, Copy)]
pub struct NoteClassifier {
    reference_pitch_hz: f64,
    in_tune_cents: f64,
    close_cents: f64,
}

impl NoteClassifier {
    pub fn new(reference_pitch_hz: f64, in_tune_cents: f64, close_cents: f64) -> Self {
        Self { reference_pitch_hz, in_tune_cents, close_cents }
    }

    pub fn set_reference_pitch(&mut self, reference_pitch_hz: f64) {
        self.reference_pitch_hz = reference_pitch_hz;
    }

    pub fn reference_pitch(&self) -> f64 {
        self.reference_pitch_hz
    }

    /// Classify a detected frequency: nearest note, cents offset, bucket.
    pub fn classify(&self, freq_hz: f64) -> (NoteHypothesis, f64, NoteClassification) {
        let m = 69.0 + 12.0 * (freq_hz / self.reference_pitch_hz).log2();
        let midi_number = m.round() as i32;
        let expected = self.reference_pitch_hz * 2f64.powf((midi_number as f64 - 69.0) / 12.0);
        let cent_offset = 1200.0 * (freq_hz / expected).log2();

        let name_index = midi_number.rem_euclid(12) as usize;
        let octave = midi_number / 12 - 1;

        let hypothesis = NoteHypothesis {
            midi_number,
            name: NOTE_NAMES[name_index].to_string(),
            octave,
            reference_pitch: self.reference_pitch_hz,
        };

        let bucket = if cent_offset.abs() < self.in_tune_cents {
            NoteClassification::InTune
        } else if cent_offset.abs() < self.close_cents {
            NoteClassification::Close
        } else {
            NoteClassification::Far
        };

        (hypothesis, cent_offset, bucket)
    }
}

impl Default for NoteClassifier {
    fn default() -> Self {
        Self::new(440.0, 5.0, 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4_exact() {
        let classifier = NoteClassifier::default();
        let (note, cents, bucket) = classifier.classify(440.0);
        assert_eq!(note.name, "A");
        assert_eq!(note.octave, 4);
        assert!(cents.abs() < 0.01);
        assert_eq!(bucket, NoteClassification::InTune);
    }

    #[test]
    fn test_slightly_sharp_classified_close() {
        let classifier = NoteClassifier::default();
        // ~10 cents sharp of A4.
        let freq = 440.0 * 2f64.powf(10.0 / 1200.0);
        let (_, cents, bucket) = classifier.classify(freq);
        assert!((cents - 10.0).abs() < 0.5);
        assert_eq!(bucket, NoteClassification::Close);
    }

    #[test]
    fn test_far_out_of_tune() {
        let classifier = NoteClassifier::default();
        let freq = 440.0 * 2f64.powf(40.0 / 1200.0);
        let (_, _, bucket) = classifier.classify(freq);
        assert_eq!(bucket, NoteClassification::Far);
    }

    #[test]
    fn test_reference_pitch_drift_guard() {
        assert!((cents_for(440.0, 440.0)).abs() < 0.01);
        assert!((cents_for(442.0, 442.0)).abs() < 0.01);
    }

    #[test]
    fn test_c0_and_middle_c_names() {
        let classifier = NoteClassifier::default();
        let (note, _, _) = classifier.classify(261.63);
        assert_eq!(note.name, "C");
        assert_eq!(note.octave, 4);
    }

    #[test]
    fn test_alternate_reference_pitch() {
        let mut classifier = NoteClassifier::default();
        classifier.set_reference_pitch(442.0);
        let (note, cents, bucket) = classifier.classify(442.0);
        assert_eq!(note.name, "A");
        assert!(cents.abs() < 0.01);
        assert_eq!(bucket, NoteClassification::InTune);
    }
}
