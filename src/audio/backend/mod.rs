//! Platform audio-output backend abstraction.
//!
//! Mirrors the input-side `AudioBackend` split: a trait with one real
//! implementation (desktop CPAL) and one deterministic stub used in tests
//! and headless CLI runs.

use crate::audio::queue::ClickQueueConsumer;
use crate::error::AudioError;

/// Context handed to a backend when the output stream is started.
pub struct OutputStartContext {
    /// Consumer side of the lookahead scheduler's click queue.
    pub clicks: ClickQueueConsumer,
}

/// Platform-specific audio output. Implementations own whatever
/// non-`Send` stream handle the platform API returns, typically by
/// running it on a dedicated thread.
pub trait AudioOutputBackend: Send + Sync {
    fn start(&self, ctx: OutputStartContext) -> Result<(), AudioError>;
    fn stop(&self) -> Result<(), AudioError>;
    /// Sample rate negotiated with the device, available after `start`.
    fn sample_rate(&self) -> Option<u32>;
}

mod cpal_backend;
pub use cpal_backend::CpalOutputBackend;

mod desktop_stub;
pub use desktop_stub::StubOutputBackend;
