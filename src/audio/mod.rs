//! Audio engine: click synthesis, scheduled-click queue, buffer pool, and
//! the platform output backend.

pub mod backend;
pub mod buffer_pool;
pub mod click_synth;
pub mod output;
pub mod queue;

pub use buffer_pool::{
    AudioBuffer, BufferPool, BufferPoolChannels, DEFAULT_BUFFER_COUNT, DEFAULT_BUFFER_SIZE,
};
pub use click_synth::{synthesize_click, ClickBufferSet, ClickKind};
pub use output::AudioOutput;
pub use queue::{click_queue, ScheduledClick};
