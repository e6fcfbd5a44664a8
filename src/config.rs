//! Configuration management for the metronome/tuner core.
//!
//! Runtime configuration loads from a JSON file, enabling field tuning
//! without recompilation. Falls back to documented defaults if the file is
//! missing or fails to parse.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub timing: TimingRuntimeConfig,
    pub tuner: TunerConfig,
    pub sync: SyncConfig,
}

/// Audio engine buffer configuration, shared by playback and capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Number of pre-allocated buffers in the capture buffer pool.
    pub buffer_pool_size: usize,
    /// Size of each capture buffer in samples.
    pub buffer_size: usize,
    /// Depth of the ScheduledClick lock-free ring.
    pub click_queue_depth: usize,
    /// Lookahead scheduler loop cadence, in milliseconds.
    pub lookahead_interval_ms: u64,
    /// Lookahead window width, in milliseconds.
    pub lookahead_window_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_pool_size: 16,
            buffer_size: 4096,
            click_queue_depth: 64,
            lookahead_interval_ms: 25,
            lookahead_window_ms: 100,
        }
    }
}

/// Timing engine defaults applied to a fresh MetronomeConfig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingRuntimeConfig {
    pub default_bpm: u32,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl Default for TimingRuntimeConfig {
    fn default() -> Self {
        Self { default_bpm: 120, min_bpm: 20, max_bpm: 300 }
    }
}

/// Chromatic tuner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    pub reference_pitch_hz: f64,
    pub in_tune_cents: f64,
    pub close_cents: f64,
    pub haptic_feedback_enabled: bool,
    pub auto_detect_enabled: bool,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            reference_pitch_hz: 440.0,
            in_tune_cents: 5.0,
            close_cents: 20.0,
            haptic_feedback_enabled: true,
            auto_detect_enabled: true,
        }
    }
}

/// Peer-sync transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub send_timeout_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { send_timeout_ms: 2000 }
    }
}

impl Default for AppConfig {
    /// Default configuration values (fallback if config file not found).
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            timing: TimingRuntimeConfig::default(),
            tuner: TunerConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    ///
    /// Returns defaults (with a logged warning) if the file doesn't exist
    /// or its contents fail to parse.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the standard desktop config path.
    pub fn load() -> Self {
        Self::load_from_file("assets/metronome_config.json")
    }
}
