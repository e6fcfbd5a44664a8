//! Drives the capture → YIN → classifier → observer pipeline on a dedicated
//! thread, off the audio callback thread (spec §5: "the YIN computation
//! runs off the callback thread"). Grounded on the same
//! dedicated-thread-owns-the-loop shape as
//! `audio::backend::desktop_stub::StubOutputBackend`'s drain thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

use crate::capture::CaptureConsumerChannels;
use crate::haptic::{HapticBackend, HapticEngine};
use crate::managers::PitchEvent;
use crate::pitch::classifier::NoteClassification;
use crate::pitch::{NoteClassifier, PitchDetector};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Owns the pitch-analysis thread for the lifetime of a tuner session.
/// `stop` joins the thread; dropping without stopping leaves it running
/// until the capture side is torn down and the data queue starves.
pub struct PitchWorker {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PitchWorker {
    /// Spawn the worker. `haptic` is optional because the tuner can run
    /// with haptic feedback disabled (spec §6 `tunerConfiguration.hapticFeedbackEnabled`);
    /// when `None`, or when `haptic_feedback_enabled` is false, in-tune
    /// readings are still published but never trigger a pulse.
    pub fn spawn<HB: HapticBackend + 'static>(
        mut channels: CaptureConsumerChannels,
        sample_rate: u32,
        classifier: NoteClassifier,
        pitch_tx: broadcast::Sender<PitchEvent>,
        haptic: Option<Arc<HapticEngine<HB>>>,
        haptic_feedback_enabled: bool,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            let mut detector = PitchDetector::new(sample_rate);

            while !shutdown_thread.load(Ordering::Relaxed) {
                let buffer = match channels.data_consumer.pop() {
                    Ok(buffer) => buffer,
                    Err(_) => {
                        thread::sleep(IDLE_POLL_INTERVAL);
                        continue;
                    }
                };

                let timestamp = Instant::now();
                if let Some(reading) = detector.process(&buffer, timestamp) {
                    if reading.is_valid() {
                        let (hypothesis, cents, classification) = classifier.classify(reading.frequency_hz);

                        let _ = pitch_tx.send(PitchEvent { reading, hypothesis, cents, classification });

                        if haptic_feedback_enabled && classification == NoteClassification::InTune {
                            if let Some(haptic) = haptic.as_ref() {
                                let _ = haptic.trigger_in_tune(timestamp);
                            }
                        }
                    }
                }

                let _ = channels.pool_producer.push(buffer);
            }
        });

        Self { shutdown, handle: Some(handle) }
    }

    /// Signal the thread to stop and join it. Blocks until the in-flight
    /// buffer (if any) finishes processing.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PitchWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer_pool::BufferPool;
    use crate::haptic::NullHapticBackend;
    use std::f64::consts::PI;
    use std::time::Duration as StdDuration;

    fn sine_wave(frequency_hz: f64, sample_rate: u32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * PI * frequency_hz * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn test_worker_publishes_pitch_event_for_valid_tone() {
        let pool = BufferPool::new(2, 4096);
        let mut data_producer = pool.data_producer;
        let channels = CaptureConsumerChannels {
            data_consumer: pool.data_consumer,
            pool_producer: pool.pool_producer,
        };
        let mut pool_consumer = pool.pool_consumer;

        let (pitch_tx, mut pitch_rx) = broadcast::channel(8);
        let worker = PitchWorker::spawn(
            channels,
            48000,
            NoteClassifier::default(),
            pitch_tx,
            Some(Arc::new(HapticEngine::new(NullHapticBackend))),
            true,
        );

        let mut buffer = pool_consumer.pop().expect("buffer available");
        buffer.clear();
        buffer.extend_from_slice(&sine_wave(440.0, 48000, 4096));
        data_producer.push(buffer).expect("push sine buffer");

        let mut event = None;
        for _ in 0..200 {
            match pitch_rx.try_recv() {
                Ok(e) => {
                    event = Some(e);
                    break;
                }
                Err(_) => thread::sleep(StdDuration::from_millis(10)),
            }
        }
        let event = event.expect("pitch event published within timeout");
        assert_eq!(event.hypothesis.name, "A");

        worker.stop();
    }
}
