//! CPAL-based audio output backend for desktop platforms.
//!
//! CPAL's `Stream` is not `Send`, so — mirroring the input side — a
//! dedicated thread owns it for the backend's lifetime and is torn down on
//! `stop()`.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;

use crate::audio::click_synth::ClickBufferSet;
use crate::audio::queue::ClickQueueConsumer;
use crate::error::AudioError;

use super::{AudioOutputBackend, OutputStartContext};

/// A click in flight in the render callback. Indexes into the shared
/// `ClickBufferSet` by kind rather than owning a copy, so voicing a click
/// never allocates on the audio thread.
struct Voice {
    kind: crate::audio::click_synth::ClickKind,
    remaining_delay: usize,
    pos: usize,
}

pub struct CpalOutputBackend {
    shutdown_flag: Arc<AtomicBool>,
    sample_rate: Arc<AtomicU32>,
    stream_thread: std::sync::Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl CpalOutputBackend {
    pub fn new() -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            sample_rate: Arc::new(AtomicU32::new(0)),
            stream_thread: std::sync::Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }
}

impl Default for CpalOutputBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioOutputBackend for CpalOutputBackend {
    fn start(&self, ctx: OutputStartContext) -> Result<(), AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        self.shutdown_flag.store(false, Ordering::SeqCst);

        let shutdown_flag = Arc::clone(&self.shutdown_flag);
        let sample_rate_store = Arc::clone(&self.sample_rate);
        let (sample_rate_tx, sample_rate_rx) = std::sync::mpsc::channel::<Result<u32, AudioError>>();
        let mut clicks = ctx.clicks;

        let stream_handle = thread::spawn(move || {
            let host = cpal::default_host();
            let device = match host.default_output_device() {
                Some(d) => d,
                None => {
                    let _ = sample_rate_tx.send(Err(AudioError::AudioUnavailable {
                        details: "no output device available".into(),
                    }));
                    return;
                }
            };

            let supported_config = match device.default_output_config() {
                Ok(c) => c,
                Err(e) => {
                    let _ = sample_rate_tx.send(Err(AudioError::AudioUnavailable {
                        details: format!("failed to get default output config: {}", e),
                    }));
                    return;
                }
            };

            let sample_rate = supported_config.sample_rate().0;
            sample_rate_store.store(sample_rate, Ordering::SeqCst);
            let mut click_buffers = ClickBufferSet::for_sample_rate(sample_rate);

            let config = StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };
            let channels = supported_config.channels() as usize;

            let shutdown_flag_cb = Arc::clone(&shutdown_flag);
            let mut voices: Vec<Voice> = Vec::new();
            let err_fn = |err| log::error!("[CpalOutputBackend] stream error: {}", err);

            let stream = device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for s in data.iter_mut() {
                        *s = 0.0;
                    }
                    if shutdown_flag_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    let frames = data.len() / channels.max(1);
                    let now = Instant::now();

                    while let Some(click) = clicks.pop() {
                        let delay_frames = if click.audio_time > now {
                            ((click.audio_time - now).as_secs_f64() * sample_rate as f64).round() as usize
                        } else {
                            0
                        };
                        voices.push(Voice { kind: click.kind, remaining_delay: delay_frames, pos: 0 });
                    }

                    for voice in voices.iter_mut() {
                        let buffer = click_buffers.buffer_for(voice.kind);
                        let mut frame_idx = 0usize;
                        if voice.remaining_delay > 0 {
                            let skip = voice.remaining_delay.min(frames);
                            voice.remaining_delay -= skip;
                            frame_idx = skip;
                        }
                        while frame_idx < frames && voice.pos < buffer.len() {
                            let sample = buffer[voice.pos];
                            for ch in 0..channels {
                                data[frame_idx * channels + ch] += sample;
                            }
                            voice.pos += 1;
                            frame_idx += 1;
                        }
                    }
                    voices.retain(|v| v.pos < click_buffers.buffer_for(v.kind).len());

                    for s in data.iter_mut() {
                        *s = s.clamp(-1.0, 1.0);
                    }
                },
                err_fn,
                None,
            );

            let stream = match stream {
                Ok(s) => s,
                Err(e) => {
                    let _ = sample_rate_tx.send(Err(AudioError::AudioUnavailable {
                        details: format!("failed to build output stream: {}", e),
                    }));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = sample_rate_tx.send(Err(AudioError::HardwareError {
                    details: format!("failed to start output stream: {}", e),
                }));
                return;
            }

            let _ = sample_rate_tx.send(Ok(sample_rate));
            while !shutdown_flag.load(Ordering::Relaxed) {
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
            let _ = click_buffers.sample_rate();
        });

        match sample_rate_rx.recv_timeout(std::time::Duration::from_secs(5)) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(AudioError::AudioUnavailable {
                    details: "timed out waiting for output stream to start".into(),
                });
            }
        }

        let mut guard = self
            .stream_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned { component: "stream_thread".into() })?;
        *guard = Some(stream_handle);
        Ok(())
    }

    fn stop(&self) -> Result<(), AudioError> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.shutdown_flag.store(true, Ordering::SeqCst);
        let mut guard = self
            .stream_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned { component: "stream_thread".into() })?;
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
