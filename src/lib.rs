// Metronome/Tuner Core - Rust real-time audio and timing engine
// Drift-free scheduling, lookahead click synthesis, YIN pitch detection,
// peer state sync, and haptic feedback for a professional metronome/tuner.

pub mod audio;
pub mod capture;
pub mod clock;
pub mod config;
pub mod error;
pub mod haptic;
pub mod managers;
pub mod orchestrator;
pub mod pitch;
pub mod sync;
pub mod tap_tempo;
pub mod telemetry;
pub mod timing;

/// Initialize logging for desktop builds. Library code never calls this
/// itself; only binaries (e.g. `bin/metronome_cli.rs`) do, at process start.
pub fn init_logging() {
    env_logger::init();
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_module_structure() {
        // Verifies all modules declared above are reachable and compile
        // together; the real coverage lives in each module's own tests.
    }
}
