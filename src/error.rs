//! Structured error types for the metronome/tuner core.
//!
//! Each failure domain gets its own enum implementing [`ErrorCode`] so
//! callers across CLI and library boundaries get a stable numeric code
//! alongside a human-readable message.

use log::error;
use std::fmt;

/// Standard way to get an error code and message from a domain error type.
pub trait ErrorCode {
    /// The numeric error code.
    fn code(&self) -> i32;

    /// The human-readable error message.
    fn message(&self) -> String;
}

/// Audio error code constants.
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    pub const AUDIO_UNAVAILABLE: i32 = 1001;
    pub const ALREADY_RUNNING: i32 = 1002;
    pub const NOT_RUNNING: i32 = 1003;
    pub const HARDWARE_ERROR: i32 = 1004;
    pub const MIC_PERMISSION_DENIED: i32 = 1005;
    pub const LOCK_POISONED: i32 = 1006;
}

/// Haptic error code constants.
///
/// Error code range: 2001-2001
pub struct HapticErrorCodes;

impl HapticErrorCodes {
    pub const HAPTIC_UNAVAILABLE: i32 = 2001;
}

/// Peer-sync error code constants.
///
/// Error code range: 3001-3002
pub struct PeerErrorCodes;

impl PeerErrorCodes {
    pub const PEER_UNREACHABLE: i32 = 3001;
    pub const SEND_TIMEOUT: i32 = 3002;
}

/// Configuration error code constants.
///
/// Error code range: 4001-4002
pub struct ConfigErrorCodes;

impl ConfigErrorCodes {
    pub const INVALID_CONFIG: i32 = 4001;
    pub const PERSISTENCE_ERROR: i32 = 4002;
}

/// Log an audio error with structured context.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Log a peer-sync error with structured context.
pub fn log_peer_error(err: &PeerError, context: &str) {
    error!(
        "Peer error in {}: code={}, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio engine / click scheduler errors.
///
/// Error code range: 1001-1006
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// The output or input device could not be opened.
    AudioUnavailable { details: String },
    /// Engine already running; call `stop()` first.
    AlreadyRunning,
    /// Engine not running; call `start()` first.
    NotRunning,
    /// A hardware-level error occurred mid-stream.
    HardwareError { details: String },
    /// Microphone permission was denied by the host platform.
    MicPermissionDenied,
    /// A mutex/RwLock guarding shared audio state was poisoned.
    LockPoisoned { component: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AudioUnavailable { .. } => AudioErrorCodes::AUDIO_UNAVAILABLE,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::MicPermissionDenied => AudioErrorCodes::MIC_PERMISSION_DENIED,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AudioUnavailable { details } => {
                format!("Audio device unavailable: {}", details)
            }
            AudioError::AlreadyRunning => "Audio already running. Call stop() first.".to_string(),
            AudioError::NotRunning => "Audio not running. Call start() first.".to_string(),
            AudioError::HardwareError { details } => format!("Hardware error: {}", details),
            AudioError::MicPermissionDenied => "Microphone permission denied".to_string(),
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError { details: err.to_string() }
    }
}

/// Haptic engine errors. Always non-fatal: callers degrade to no-op.
///
/// Error code range: 2001-2001
#[derive(Debug, Clone, PartialEq)]
pub enum HapticError {
    HapticUnavailable,
}

impl ErrorCode for HapticError {
    fn code(&self) -> i32 {
        match self {
            HapticError::HapticUnavailable => HapticErrorCodes::HAPTIC_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            HapticError::HapticUnavailable => "Haptic hardware unavailable".to_string(),
        }
    }
}

impl fmt::Display for HapticError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HapticError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for HapticError {}

/// Peer state-sync errors. Observational: never interrupt metronome operation.
///
/// Error code range: 3001-3002
#[derive(Debug, Clone, PartialEq)]
pub enum PeerError {
    PeerUnreachable,
    SendTimeout,
}

impl ErrorCode for PeerError {
    fn code(&self) -> i32 {
        match self {
            PeerError::PeerUnreachable => PeerErrorCodes::PEER_UNREACHABLE,
            PeerError::SendTimeout => PeerErrorCodes::SEND_TIMEOUT,
        }
    }

    fn message(&self) -> String {
        match self {
            PeerError::PeerUnreachable => "Peer channel unreachable".to_string(),
            PeerError::SendTimeout => "Peer send timed out after 2s".to_string(),
        }
    }
}

impl fmt::Display for PeerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for PeerError {}

/// Configuration and persistence errors.
///
/// Error code range: 4001-4002
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidConfig { reason: String },
    PersistenceError { details: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidConfig { .. } => ConfigErrorCodes::INVALID_CONFIG,
            ConfigError::PersistenceError { .. } => ConfigErrorCodes::PERSISTENCE_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidConfig { reason } => format!("Invalid config: {}", reason),
            ConfigError::PersistenceError { details } => {
                format!("Persistence error: {}", details)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError::{:?} (code {}): {}", self, self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}
