//! Lock-free queue carrying scheduled clicks from the lookahead scheduler
//! thread to the real-time audio output callback.
//!
//! Single producer (scheduler), single consumer (audio callback) — same
//! `rtrb` SPSC ring used by [`crate::audio::buffer_pool`], sized for clicks
//! rather than raw sample buffers.

use std::time::Instant;

use rtrb::{Consumer, Producer, RingBuffer};

use crate::audio::click_synth::ClickKind;

/// One click committed to play at a specific absolute time.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledClick {
    pub audio_time: Instant,
    pub kind: ClickKind,
}

pub struct ClickQueueProducer(Producer<ScheduledClick>);
pub struct ClickQueueConsumer(Consumer<ScheduledClick>);

impl ClickQueueProducer {
    /// Enqueue a click. Drops it (logging at debug level) if the queue is
    /// full rather than blocking the scheduler thread.
    pub fn push(&mut self, click: ScheduledClick) {
        if self.0.push(click).is_err() {
            log::debug!("[ClickQueue] queue full, dropping scheduled click");
        }
    }
}

impl ClickQueueConsumer {
    pub fn pop(&mut self) -> Option<ScheduledClick> {
        self.0.pop().ok()
    }
}

/// Create a producer/consumer pair with room for `depth` pending clicks.
pub fn click_queue(depth: usize) -> (ClickQueueProducer, ClickQueueConsumer) {
    let (producer, consumer) = RingBuffer::new(depth);
    (ClickQueueProducer(producer), ClickQueueConsumer(consumer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_push_pop_roundtrip() {
        let (mut tx, mut rx) = click_queue(4);
        let now = Instant::now();
        tx.push(ScheduledClick { audio_time: now, kind: ClickKind::Accent });
        let got = rx.pop().expect("should have a click");
        assert_eq!(got.kind, ClickKind::Accent);
        assert_eq!(got.audio_time, now);
    }

    #[test]
    fn test_drop_on_overflow_does_not_panic() {
        let (mut tx, mut rx) = click_queue(2);
        let now = Instant::now();
        for _ in 0..5 {
            tx.push(ScheduledClick { audio_time: now, kind: ClickKind::Normal });
        }
        let mut drained = 0;
        while rx.pop().is_some() {
            drained += 1;
        }
        assert!(drained <= 2);
    }
}
