//! Deterministic output backend for tests and headless CLI runs: drains the
//! click queue on a fixed cadence instead of driving a real sound device.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::AudioError;

use super::{AudioOutputBackend, OutputStartContext};

const STUB_SAMPLE_RATE: u32 = 48000;

pub struct StubOutputBackend {
    running: AtomicBool,
    shutdown_flag: std::sync::Arc<AtomicBool>,
    drain_thread: Mutex<Option<JoinHandle<()>>>,
    sample_rate: AtomicU32,
}

impl StubOutputBackend {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            shutdown_flag: std::sync::Arc::new(AtomicBool::new(false)),
            drain_thread: Mutex::new(None),
            sample_rate: AtomicU32::new(0),
        }
    }
}

impl Default for StubOutputBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutputBackend for StubOutputBackend {
    fn start(&self, ctx: OutputStartContext) -> Result<(), AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        self.shutdown_flag.store(false, Ordering::SeqCst);
        self.sample_rate.store(STUB_SAMPLE_RATE, Ordering::SeqCst);

        let shutdown_flag = std::sync::Arc::clone(&self.shutdown_flag);
        let mut clicks = ctx.clicks;
        let handle = thread::spawn(move || {
            while !shutdown_flag.load(Ordering::Relaxed) {
                while clicks.pop().is_some() {}
                thread::sleep(Duration::from_millis(10));
            }
        });

        let mut guard = self
            .drain_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned { component: "drain_thread".into() })?;
        *guard = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let mut guard = self
            .drain_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned { component: "drain_thread".into() })?;
        if let Some(handle) = guard.take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn sample_rate(&self) -> Option<u32> {
        let sr = self.sample_rate.load(Ordering::SeqCst);
        if sr == 0 {
            None
        } else {
            Some(sr)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::queue::click_queue;

    #[test]
    fn test_start_stop_lifecycle() {
        let backend = StubOutputBackend::new();
        let (_tx, rx) = click_queue(8);
        backend.start(OutputStartContext { clicks: rx }).unwrap();
        assert_eq!(backend.sample_rate(), Some(STUB_SAMPLE_RATE));
        backend.stop().unwrap();
    }

    #[test]
    fn test_double_start_errors() {
        let backend = StubOutputBackend::new();
        let (_tx, rx) = click_queue(8);
        backend.start(OutputStartContext { clicks: rx }).unwrap();
        let (_tx2, rx2) = click_queue(8);
        assert!(backend.start(OutputStartContext { clicks: rx2 }).is_err());
        backend.stop().unwrap();
    }
}
