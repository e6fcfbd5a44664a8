//! Audio output device wiring: owns the platform backend and the producer
//! half of the scheduled-click queue. The lookahead scheduler itself lives
//! in [`crate::orchestrator`], which ticks the timing engine and pushes
//! clicks here; this module only owns the device and the queue plumbing.

use crate::audio::backend::{AudioOutputBackend, OutputStartContext};
use crate::audio::queue::{click_queue, ClickQueueProducer, ScheduledClick};
use crate::error::AudioError;

pub struct AudioOutput<B: AudioOutputBackend> {
    backend: B,
    producer: Option<ClickQueueProducer>,
    queue_depth: usize,
}

impl<B: AudioOutputBackend> AudioOutput<B> {
    pub fn new(backend: B, queue_depth: usize) -> Self {
        Self { backend, producer: None, queue_depth }
    }

    pub fn start(&mut self) -> Result<(), AudioError> {
        let (producer, consumer) = click_queue(self.queue_depth);
        self.backend.start(OutputStartContext { clicks: consumer })?;
        self.producer = Some(producer);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), AudioError> {
        self.backend.stop()?;
        self.producer = None;
        Ok(())
    }

    /// Enqueue a click for playback. A no-op if the output isn't running.
    pub fn enqueue(&mut self, click: ScheduledClick) {
        if let Some(producer) = self.producer.as_mut() {
            producer.push(click);
        }
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.backend.sample_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::StubOutputBackend;
    use crate::audio::click_synth::ClickKind;
    use std::time::Instant;

    #[test]
    fn test_enqueue_without_start_is_noop() {
        let mut output = AudioOutput::new(StubOutputBackend::new(), 8);
        output.enqueue(ScheduledClick { audio_time: Instant::now(), kind: ClickKind::Normal });
    }

    #[test]
    fn test_start_then_enqueue_then_stop() {
        let mut output = AudioOutput::new(StubOutputBackend::new(), 8);
        output.start().unwrap();
        output.enqueue(ScheduledClick { audio_time: Instant::now(), kind: ClickKind::Accent });
        output.stop().unwrap();
    }
}
