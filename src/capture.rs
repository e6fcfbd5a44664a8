//! Microphone capture: feeds raw PCM to the pitch-detection worker via the
//! lock-free buffer pool, using the same dedicated-thread-owns-the-stream
//! pattern as the audio output backend (CPAL's `Stream` is not `Send`).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use crate::audio::buffer_pool::{AudioBuffer, BufferPool};
use crate::error::AudioError;

/// The producer/consumer halves handed to the input stream thread: pull an
/// empty buffer from the pool, fill it, push it to the data queue.
struct CaptureThreadChannels {
    pool_consumer: rtrb::Consumer<AudioBuffer>,
    data_producer: rtrb::Producer<AudioBuffer>,
}

/// The halves handed to the pitch-detection worker: pop a filled buffer,
/// process it, return it to the pool.
pub struct CaptureConsumerChannels {
    pub data_consumer: rtrb::Consumer<AudioBuffer>,
    pub pool_producer: rtrb::Producer<AudioBuffer>,
}

pub struct AudioCapture {
    shutdown_flag: Arc<AtomicBool>,
    sample_rate: Arc<AtomicU32>,
    stream_thread: std::sync::Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    buffer_pool_size: usize,
    buffer_size: usize,
}

impl AudioCapture {
    pub fn new(buffer_pool_size: usize, buffer_size: usize) -> Self {
        Self {
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            sample_rate: Arc::new(AtomicU32::new(0)),
            stream_thread: std::sync::Mutex::new(None),
            running: AtomicBool::new(false),
            buffer_pool_size,
            buffer_size,
        }
    }

    /// Start capturing from the default input device. Returns the consumer
    /// channels the pitch worker reads from.
    pub fn start(&self) -> Result<CaptureConsumerChannels, AudioError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AudioError::AlreadyRunning);
        }
        self.shutdown_flag.store(false, Ordering::SeqCst);

        let channels = BufferPool::new(self.buffer_pool_size, self.buffer_size);
        let thread_channels = CaptureThreadChannels {
            pool_consumer: channels.pool_consumer,
            data_producer: channels.data_producer,
        };
        let consumer_channels = CaptureConsumerChannels {
            data_consumer: channels.data_consumer,
            pool_producer: channels.pool_producer,
        };

        let shutdown_flag = Arc::clone(&self.shutdown_flag);
        let sample_rate_store = Arc::clone(&self.sample_rate);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<u32, AudioError>>();

        let stream_handle = thread::spawn(move || {
            run_capture_stream(thread_channels, shutdown_flag, sample_rate_store, ready_tx);
        });

        match ready_rx.recv_timeout(std::time::Duration::from_secs(5)) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(AudioError::MicPermissionDenied);
            }
        }

        let mut guard = self
            .stream_thread
            .lock()
            .map_err(|_| AudioError::LockPoisoned { component: "stream_thread".into() })?;
        *guard = Some(stream_handle);
        Ok(consumer_channels)
    }

    pub fn stop(&self) -> Result<(), AudioError> {
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

    pub fn sample_rate(&self) -> Option<u32> {
        let sr = self.sample_rate.load(Ordering::SeqCst);
        if sr == 0 {
            None
        } else {
            Some(sr)
        }
    }
}

fn run_capture_stream(
    mut channels: CaptureThreadChannels,
    shutdown_flag: Arc<AtomicBool>,
    sample_rate_store: Arc<AtomicU32>,
    ready_tx: std::sync::mpsc::Sender<Result<u32, AudioError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            let _ = ready_tx.send(Err(AudioError::MicPermissionDenied));
            return;
        }
    };

    let supported_config = match device.default_input_config() {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::AudioUnavailable { details: e.to_string() }));
            return;
        }
    };

    let sample_rate = supported_config.sample_rate().0;
    sample_rate_store.store(sample_rate, Ordering::SeqCst);

    let config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    let num_channels = supported_config.channels() as usize;

    let shutdown_flag_cb = Arc::clone(&shutdown_flag);
    let mut push_mono = move |mono: &[f32], channels: &mut CaptureThreadChannels| {
        if let Ok(mut buffer) = channels.pool_consumer.pop() {
            buffer.clear();
            buffer.extend_from_slice(mono);
            let _ = channels.data_producer.push(buffer);
        }
    };

    let err_fn = |err| log::error!("[AudioCapture] stream error: {}", err);

    macro_rules! build_stream {
        ($sample_ty:ty, $convert:expr) => {
            device.build_input_stream(
                &config,
                move |data: &[$sample_ty], _: &cpal::InputCallbackInfo| {
                    if shutdown_flag_cb.load(Ordering::Relaxed) {
                        return;
                    }
                    let convert: fn(&$sample_ty) -> f32 = $convert;
                    let mono: Vec<f32> = if num_channels == 1 {
                        data.iter().map(convert).collect()
                    } else {
                        data.chunks(num_channels)
                            .map(|chunk| chunk.iter().map(convert).sum::<f32>() / num_channels as f32)
                            .collect()
                    };
                    push_mono(&mono, &mut channels);
                },
                err_fn,
                None,
            )
        };
    }

    let stream = match supported_config.sample_format() {
        SampleFormat::F32 => build_stream!(f32, |s| *s),
        SampleFormat::I16 => build_stream!(i16, |s| *s as f32 / 32768.0),
        SampleFormat::U16 => build_stream!(u16, |s| (*s as f32 - 32768.0) / 32768.0),
        other => {
            let _ = ready_tx.send(Err(AudioError::AudioUnavailable {
                details: format!("unsupported sample format: {:?}", other),
            }));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready_tx.send(Err(AudioError::AudioUnavailable { details: e.to_string() }));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::HardwareError { details: e.to_string() }));
        return;
    }

    let _ = ready_tx.send(Ok(sample_rate));
    while !shutdown_flag.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
}
